use crate::config::AppConfig;
use crate::console::Console;
use crate::lifecycle::{DebugOverlay, EngineLifecycleHandle};
use crate::save::{LastSaved, ShareKind};
use crate::sprites::{SpriteCanvas, SpriteRegistry};

/// The single mutable record behind the editor. Readers get `&AppState`; only
/// action handlers in the dispatcher write to it.
pub struct AppState {
    pub(crate) sprites: SpriteRegistry,
    pub(crate) selected_sprite: String,
    pub(crate) logs: Console,
    pub(crate) error: bool,
    pub(crate) last_saved: LastSaved,
    pub(crate) mouse_x: f64,
    pub(crate) mouse_y: f64,
    pub(crate) show: DebugOverlay,
    pub(crate) share_type: ShareKind,
    pub(crate) name: String,
    pub(crate) engine: EngineLifecycleHandle,
    pub(crate) canvas: SpriteCanvas,
    pub(crate) initialized: bool,
}

impl AppState {
    pub(crate) fn new(config: &AppConfig, engine: EngineLifecycleHandle) -> Self {
        Self {
            sprites: SpriteRegistry::new(),
            selected_sprite: String::new(),
            logs: Console::new(config.console.capacity),
            error: false,
            last_saved: LastSaved::default(),
            mouse_x: 0.0,
            mouse_y: 0.0,
            show: DebugOverlay::default(),
            share_type: ShareKind::default(),
            name: config.project.default_name.clone(),
            engine,
            canvas: config.sprite.canvas(),
            initialized: false,
        }
    }

    pub fn sprites(&self) -> &SpriteRegistry {
        &self.sprites
    }

    pub fn selected_sprite(&self) -> &str {
        &self.selected_sprite
    }

    pub fn logs(&self) -> &Console {
        &self.logs
    }

    pub fn error(&self) -> bool {
        self.error
    }

    pub fn last_saved(&self) -> &LastSaved {
        &self.last_saved
    }

    pub fn mouse(&self) -> (f64, f64) {
        (self.mouse_x, self.mouse_y)
    }

    pub fn show(&self) -> DebugOverlay {
        self.show
    }

    pub fn share_type(&self) -> ShareKind {
        self.share_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn engine(&self) -> &EngineLifecycleHandle {
        &self.engine
    }

    pub fn canvas(&self) -> SpriteCanvas {
        self.canvas
    }

    pub fn initialized(&self) -> bool {
        self.initialized
    }
}
