//! Collaborators for running without a browser: the CLI and the test suite use
//! these. Each one is a cheap handle, so a clone kept by the caller observes
//! what the dispatcher did with the boxed original.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::cell::{Cell, RefCell};
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use crate::host::{
    Clipboard, Editor, EngineFactory, FileExporter, FrameScheduler, Markup, PixelEditor, ShareBackend,
    View, VisualEngine,
};
use crate::lifecycle::{AnimationFrameId, DebugOverlay};
use crate::sprites::{Rgba, Sprite, SpriteCanvas};
use crate::state::AppState;

#[derive(Clone, Default)]
pub struct TextBuffer(Rc<RefCell<String>>);

impl TextBuffer {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self(Rc::new(RefCell::new(text.into())))
    }

    pub fn contents(&self) -> String {
        self.0.borrow().clone()
    }
}

impl Editor for TextBuffer {
    fn text(&self) -> String {
        self.contents()
    }

    fn replace(&mut self, from: usize, to: usize, insert: &str) {
        let mut text = self.0.borrow_mut();
        let to = to.min(text.len());
        let from = from.min(to);
        if !text.is_char_boundary(from) || !text.is_char_boundary(to) {
            warn!("[editor] ignoring replace {from}..{to}: not on a character boundary");
            return;
        }
        text.replace_range(from..to, insert);
    }
}

#[derive(Clone)]
pub struct BlankPixelEditor {
    canvas: SpriteCanvas,
    loaded: Rc<RefCell<Option<String>>>,
}

impl BlankPixelEditor {
    pub fn new(canvas: SpriteCanvas) -> Self {
        Self { canvas, loaded: Rc::default() }
    }

    pub fn loaded_name(&self) -> Option<String> {
        self.loaded.borrow().clone()
    }
}

impl PixelEditor for BlankPixelEditor {
    fn create_empty_grid(&mut self) -> Vec<Rgba> {
        self.canvas.empty_grid()
    }

    fn load_grid(&mut self, name: &str, _sprite: &Sprite) {
        *self.loaded.borrow_mut() = Some(name.to_string());
    }
}

#[derive(Clone, Default)]
pub struct SummaryView {
    renders: Rc<Cell<usize>>,
    notices: Rc<Cell<usize>>,
    mounts: Rc<RefCell<Vec<(String, Markup)>>>,
}

impl SummaryView {
    pub fn render_count(&self) -> usize {
        self.renders.get()
    }

    pub fn notice_count(&self) -> usize {
        self.notices.get()
    }

    pub fn mounts(&self) -> Vec<(String, Markup)> {
        self.mounts.borrow().clone()
    }
}

impl View for SummaryView {
    fn render(&mut self, state: &AppState) {
        self.renders.set(self.renders.get() + 1);
        debug!(
            "[view] sprites={} selected={} logs={} error={}",
            state.sprites().len(),
            state.selected_sprite(),
            state.logs().len(),
            state.error()
        );
    }

    fn mount(&mut self, target: &str, markup: &Markup) {
        debug!("[view] mount {target}: {markup}");
        self.mounts.borrow_mut().push((target.to_string(), markup.clone()));
    }

    fn show_shared_notice(&mut self) {
        self.notices.set(self.notices.get() + 1);
        info!("[view] share link copied to clipboard");
    }
}

/// Engine stand-in that always has one animation frame pending.
pub struct TickingEngine {
    frame: AnimationFrameId,
    show: DebugOverlay,
}

impl TickingEngine {
    pub fn show(&self) -> DebugOverlay {
        self.show
    }
}

impl VisualEngine for TickingEngine {
    fn animation_frame(&self) -> Option<AnimationFrameId> {
        Some(self.frame)
    }

    fn set_show(&mut self, show: DebugOverlay) {
        self.show = show;
    }
}

#[derive(Clone, Default)]
pub struct TickingEngineFactory {
    next_frame: Rc<Cell<u64>>,
    constructed: Rc<RefCell<Vec<Vec<serde_json::Value>>>>,
}

impl TickingEngineFactory {
    pub fn constructed(&self) -> Vec<Vec<serde_json::Value>> {
        self.constructed.borrow().clone()
    }
}

impl EngineFactory for TickingEngineFactory {
    fn construct(&mut self, args: Vec<serde_json::Value>) -> Result<Box<dyn VisualEngine>> {
        let frame = AnimationFrameId(self.next_frame.get() + 1);
        self.next_frame.set(frame.0);
        self.constructed.borrow_mut().push(args);
        Ok(Box::new(TickingEngine { frame, show: DebugOverlay::default() }))
    }
}

#[derive(Clone, Default)]
pub struct RecordingScheduler {
    cancelled: Rc<RefCell<Vec<AnimationFrameId>>>,
}

impl RecordingScheduler {
    pub fn cancelled(&self) -> Vec<AnimationFrameId> {
        self.cancelled.borrow().clone()
    }
}

impl FrameScheduler for RecordingScheduler {
    fn cancel_animation_frame(&mut self, frame: AnimationFrameId) {
        self.cancelled.borrow_mut().push(frame);
    }
}

/// Writes each upload under its content hash and links to it as `share://<hash>`.
#[derive(Clone)]
pub struct ContentAddressedShare {
    dir: PathBuf,
    uploads: Rc<Cell<usize>>,
}

impl ContentAddressedShare {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), uploads: Rc::default() }
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.get()
    }
}

impl ShareBackend for ContentAddressedShare {
    fn upload(&mut self, body: &str) -> Result<String> {
        let hash = blake3::hash(body.as_bytes()).to_hex();
        let key = &hash.as_str()[..16];
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating share directory '{}'", self.dir.display()))?;
        let path = self.dir.join(format!("{key}.json"));
        fs::write(&path, body).with_context(|| format!("writing share '{}'", path.display()))?;
        self.uploads.set(self.uploads.get() + 1);
        Ok(format!("share://{key}"))
    }
}

#[derive(Clone, Default)]
pub struct MemoryClipboard(Rc<RefCell<Vec<String>>>);

impl MemoryClipboard {
    pub fn contents(&self) -> Option<String> {
        self.0.borrow().last().cloned()
    }

    pub fn copies(&self) -> usize {
        self.0.borrow().len()
    }
}

impl Clipboard for MemoryClipboard {
    fn copy(&mut self, text: &str) {
        self.0.borrow_mut().push(text.to_string());
    }
}

#[derive(Clone)]
pub struct DirectoryExporter {
    dir: PathBuf,
}

impl DirectoryExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl FileExporter for DirectoryExporter {
    fn download(&mut self, filename: &str, text: &str) -> Result<()> {
        let safe: String =
            filename.chars().map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c }).collect();
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating export directory '{}'", self.dir.display()))?;
        let path = self.dir.join(safe);
        fs::write(&path, text).with_context(|| format!("writing export '{}'", path.display()))?;
        info!("[export] wrote {}", path.display());
        Ok(())
    }
}
