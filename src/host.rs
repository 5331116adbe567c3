//! Narrow interfaces to everything the dispatcher does not own: the text editor,
//! the pixel editor, the view layer, the visual engine and the export channels.

use anyhow::Result;
use serde::Serialize;
use std::fmt;

use crate::config::AppConfig;
use crate::headless;
use crate::lifecycle::{AnimationFrameId, DebugOverlay};
use crate::sprites::{Rgba, Sprite};
use crate::state::AppState;

pub trait Editor {
    fn text(&self) -> String;
    /// Replaces the byte range `from..to` with `insert`.
    fn replace(&mut self, from: usize, to: usize, insert: &str);

    fn replace_all(&mut self, insert: &str) {
        let len = self.text().len();
        self.replace(0, len, insert);
    }
}

pub trait PixelEditor {
    fn create_empty_grid(&mut self) -> Vec<Rgba>;
    fn load_grid(&mut self, name: &str, sprite: &Sprite);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkupKind {
    Html,
    Svg,
}

/// A fragment produced by the `html`/`svg` bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Markup {
    pub kind: MarkupKind,
    pub source: String,
}

impl Markup {
    pub fn html(source: impl Into<String>) -> Self {
        Self { kind: MarkupKind::Html, source: source.into() }
    }

    pub fn svg(source: impl Into<String>) -> Self {
        Self { kind: MarkupKind::Svg, source: source.into() }
    }
}

impl fmt::Display for Markup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            MarkupKind::Html => write!(f, "html`{}`", self.source),
            MarkupKind::Svg => write!(f, "svg`{}`", self.source),
        }
    }
}

pub trait View {
    fn render(&mut self, state: &AppState);
    /// Applies a fragment a program rendered into `target`.
    fn mount(&mut self, target: &str, markup: &Markup);

    fn show_shared_notice(&mut self) {}
}

pub trait VisualEngine {
    fn animation_frame(&self) -> Option<AnimationFrameId>;
    fn set_show(&mut self, show: DebugOverlay);
}

pub trait EngineFactory {
    fn construct(&mut self, args: Vec<serde_json::Value>) -> Result<Box<dyn VisualEngine>>;
}

pub trait FrameScheduler {
    fn cancel_animation_frame(&mut self, frame: AnimationFrameId);
}

pub trait ShareBackend {
    /// Stores a serialized save state and returns a shareable link.
    fn upload(&mut self, body: &str) -> Result<String>;
}

pub trait Clipboard {
    fn copy(&mut self, text: &str);
}

pub trait FileExporter {
    fn download(&mut self, filename: &str, text: &str) -> Result<()>;
}

/// Every collaborator the dispatcher talks to.
pub struct Host {
    pub editor: Box<dyn Editor>,
    pub pixel_editor: Box<dyn PixelEditor>,
    pub view: Box<dyn View>,
    pub engines: Box<dyn EngineFactory>,
    pub frames: Box<dyn FrameScheduler>,
    pub share: Box<dyn ShareBackend>,
    pub clipboard: Box<dyn Clipboard>,
    pub files: Box<dyn FileExporter>,
}

impl Host {
    pub fn headless(config: &AppConfig) -> Self {
        let export_dir = config.project.export_dir.clone();
        Self {
            editor: Box::new(headless::TextBuffer::default()),
            pixel_editor: Box::new(headless::BlankPixelEditor::new(config.sprite.canvas())),
            view: Box::new(headless::SummaryView::default()),
            engines: Box::new(headless::TickingEngineFactory::default()),
            frames: Box::new(headless::RecordingScheduler::default()),
            share: Box::new(headless::ContentAddressedShare::new(export_dir.clone())),
            clipboard: Box::new(headless::MemoryClipboard::default()),
            files: Box::new(headless::DirectoryExporter::new(export_dir)),
        }
    }
}
