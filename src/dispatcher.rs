//! Routes actions to their handlers. Handlers run synchronously, may dispatch
//! further actions, and are the only code that writes to `AppState`.

use log::{debug, error, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use std::collections::VecDeque;

use crate::actions::{Action, Reply};
use crate::audio::AudioHandle;
use crate::config::AppConfig;
use crate::console::ConsoleKind;
use crate::events::{EventBus, StoreEvent};
use crate::host::{Clipboard, Editor, FileExporter, Host, PixelEditor, ShareBackend, View};
use crate::lifecycle::{DebugOverlay, EngineLifecycle, EngineLifecycleHandle};
use crate::sandbox::{Bindings, Sandbox, StateView};
use crate::save::{LastSaved, SaveState, ShareKind};
use crate::sprites::{Rgba, Sprite};
use crate::state::AppState;

const NAME_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const NAME_ATTEMPTS_PER_LENGTH: usize = 64;
const MUSE_CUE_CAPACITY: usize = 64;

struct HostIo {
    editor: Box<dyn Editor>,
    pixel_editor: Box<dyn PixelEditor>,
    view: Box<dyn View>,
    share: Box<dyn ShareBackend>,
    clipboard: Box<dyn Clipboard>,
    files: Box<dyn FileExporter>,
}

pub struct Dispatcher {
    state: AppState,
    io: HostIo,
    sandbox: Sandbox,
    rng: StdRng,
    name_prefix: String,
    suffix_len: usize,
    pending_shares: VecDeque<SaveState>,
    events: EventBus,
    depth: usize,
}

impl Dispatcher {
    pub fn new(config: &AppConfig, host: Host) -> Self {
        let Host { editor, pixel_editor, view, engines, frames, share, clipboard, files } = host;
        let engine = EngineLifecycleHandle::new(EngineLifecycle::new(engines, frames));
        let rng = match config.sandbox.deterministic_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            state: AppState::new(config, engine),
            io: HostIo { editor, pixel_editor, view, share, clipboard, files },
            sandbox: Sandbox::new(&config.sandbox, AudioHandle::new(MUSE_CUE_CAPACITY)),
            rng,
            name_prefix: config.sprite.name_prefix.clone(),
            suffix_len: config.sprite.suffix_len.max(1),
            pending_shares: VecDeque::new(),
            events: EventBus::default(),
            depth: 0,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    pub fn pending_shares(&self) -> usize {
        self.pending_shares.len()
    }

    pub fn drain_events(&mut self) -> Vec<StoreEvent> {
        self.events.drain()
    }

    /// Looks `name` up in the action registry. Unknown names and malformed
    /// arguments are logged and answered with `None`; nothing is mutated.
    pub fn dispatch_named(&mut self, name: &str, args: Value) -> Option<Reply> {
        match Action::from_named(name, args) {
            Ok(Some(action)) => Some(self.dispatch(action)),
            Ok(None) => {
                warn!("Action not recognized: {name}");
                self.events.push(StoreEvent::UnknownAction { name: name.to_string() });
                None
            }
            Err(err) => {
                error!("{err:#}");
                None
            }
        }
    }

    pub fn dispatch(&mut self, action: Action) -> Reply {
        self.depth += 1;
        self.events.push(StoreEvent::Dispatched { action: action.name(), depth: self.depth });
        let reply = match action {
            Action::Init => self.init(),
            Action::Run => self.run(),
            Action::ShareType { kind } => self.share_type(kind),
            Action::GetSaveState => self.get_save_state(),
            Action::Save { kind } => self.save(kind),
            Action::CanvasMouseMove { mouse_x, mouse_y } => self.canvas_mouse_move(mouse_x, mouse_y),
            Action::SizeUpSprites => self.size_up_sprites(),
            Action::Upload { saved } => self.upload(saved),
            Action::LoadExample { content } => self.load_example(&content),
            Action::CreateSprite => self.create_sprite(),
            Action::ChangeSpriteName { old_name, new_name } => self.change_sprite_name(&old_name, new_name),
            Action::SelectSprite { name } => self.select_sprite(name),
            Action::DeleteSprite { name } => self.delete_sprite(&name),
            Action::UpdateSpriteColors { name, colors } => self.update_sprite_colors(&name, colors),
            Action::SetShow { show } => self.set_show(show),
            Action::ShareLinkReady { saved } => self.share_link_ready(saved),
            Action::Render => self.render(),
        };
        self.depth -= 1;
        reply
    }

    /// One host event-loop turn: finishes deferred module loads and share
    /// uploads requested by earlier dispatches.
    pub fn pump(&mut self) {
        for load in self.sandbox.load_pending_modules() {
            self.events.push(StoreEvent::ModuleLoaded { blob: load.blob, failed: load.result.is_err() });
        }
        while let Some(save) = self.pending_shares.pop_front() {
            let body = match save.to_json() {
                Ok(body) => body,
                Err(err) => {
                    error!("[share] {err:#}");
                    continue;
                }
            };
            match self.io.share.upload(&body) {
                Ok(link) => {
                    self.events.push(StoreEvent::ShareUploaded { link: link.clone() });
                    let saved = LastSaved { name: save.name, program_text: save.program_text, link };
                    self.dispatch(Action::ShareLinkReady { saved });
                }
                Err(err) => error!("[share] upload failed: {err:#}"),
            }
        }
    }

    fn init(&mut self) -> Reply {
        if self.state.initialized {
            warn!("INIT ignored: state already initialized");
            return Reply::Done;
        }
        self.state.initialized = true;
        if self.state.sprites.is_empty() {
            self.dispatch(Action::CreateSprite);
        } else if !self.state.sprites.contains(&self.state.selected_sprite) {
            if let Some(first) = self.state.sprites.first_name().map(str::to_string) {
                self.dispatch(Action::SelectSprite { name: first });
            }
        }
        self.dispatch(Action::Render);
        Reply::Done
    }

    fn run(&mut self) -> Reply {
        let program = self.io.editor.text();
        if Sandbox::is_module_program(&program) {
            let blob = self.sandbox.queue_module(&program);
            debug!("[run] module path via {blob}");
            self.events.push(StoreEvent::ModuleQueued { blob });
            return Reply::Done;
        }

        self.state.error = false;
        self.state.logs.clear();
        self.state.engine.borrow_mut().set_overlay(self.state.show);

        let bindings = Bindings {
            state: StateView::capture(&self.state),
            sprites: &self.state.sprites,
            engine: self.state.engine.clone(),
        };
        let report = self.sandbox.execute(&program, bindings);
        for line in report.logs {
            self.state.logs.push(ConsoleKind::Output, line);
        }
        for (target, markup) in &report.mounts {
            self.io.view.mount(target, markup);
        }
        let failed = report.result.is_err();
        if let Err(failure) = report.result {
            self.state.error = true;
            self.state.logs.push(ConsoleKind::Error, failure.to_log_text());
        }
        self.events.push(StoreEvent::RunFinished { failed });
        self.dispatch(Action::Render);
        Reply::Done
    }

    fn share_type(&mut self, kind: ShareKind) -> Reply {
        self.state.share_type = kind;
        self.dispatch(Action::Render);
        Reply::Done
    }

    fn snapshot(&self) -> SaveState {
        SaveState {
            program_text: self.io.editor.text(),
            sprites: self.state.sprites.clone(),
            name: self.state.name.clone(),
        }
    }

    fn get_save_state(&mut self) -> Reply {
        match self.snapshot().to_json() {
            Ok(json) => Reply::SaveState(json),
            Err(err) => {
                error!("{err:#}");
                Reply::Done
            }
        }
    }

    fn save(&mut self, kind: ShareKind) -> Reply {
        let Some(json) = self.dispatch(Action::GetSaveState).save_state().map(str::to_string) else {
            return Reply::Done;
        };
        match kind {
            ShareKind::Link => {
                let save = self.snapshot();
                if self.state.last_saved.matches(&save) {
                    debug!("[save] unchanged since last upload, reusing link");
                    self.io.clipboard.copy(&self.state.last_saved.link);
                    self.io.view.show_shared_notice();
                    return Reply::Done;
                }
                let queued = self
                    .pending_shares
                    .iter()
                    .any(|pending| pending.name == save.name && pending.program_text == save.program_text);
                if !queued {
                    self.pending_shares.push_back(save);
                }
            }
            ShareKind::File => {
                let filename = format!("{}.json", self.state.name);
                if let Err(err) = self.io.files.download(&filename, &json) {
                    error!("[save] {err:#}");
                }
            }
        }
        Reply::Done
    }

    fn share_link_ready(&mut self, saved: LastSaved) -> Reply {
        self.io.clipboard.copy(&saved.link);
        self.io.view.show_shared_notice();
        self.state.last_saved = saved;
        self.dispatch(Action::Render);
        Reply::Done
    }

    fn canvas_mouse_move(&mut self, mouse_x: f64, mouse_y: f64) -> Reply {
        self.state.mouse_x = mouse_x;
        self.state.mouse_y = mouse_y;
        self.dispatch(Action::Render);
        Reply::Done
    }

    fn size_up_sprites(&mut self) -> Reply {
        self.state.sprites.size_up(self.state.canvas);
        Reply::Done
    }

    fn upload(&mut self, saved: SaveState) -> Reply {
        let SaveState { program_text, mut sprites, name } = saved;
        self.io.editor.replace_all(&program_text);
        for fixed in sprites.normalize(self.state.canvas) {
            warn!("[upload] sprite '{fixed}' resized to the sprite canvas");
        }
        self.state.sprites = sprites;
        if !name.is_empty() {
            self.state.name = name;
        }

        match self.state.sprites.first_name().map(str::to_string) {
            None => self.dispatch(Action::CreateSprite),
            Some(first) => self.dispatch(Action::SelectSprite { name: first }),
        };
        self.dispatch(Action::Render);
        self.dispatch(Action::Run);
        Reply::Done
    }

    fn load_example(&mut self, content: &str) -> Reply {
        self.io.editor.replace_all(content);
        self.dispatch(Action::Run);
        Reply::Done
    }

    fn unique_sprite_name(&mut self) -> String {
        let mut len = self.suffix_len;
        let mut attempts = 0;
        loop {
            let suffix: String = (0..len)
                .map(|_| NAME_ALPHABET[self.rng.gen_range(0..NAME_ALPHABET.len())] as char)
                .collect();
            let name = format!("{}{}", self.name_prefix, suffix);
            if !self.state.sprites.contains(&name) {
                return name;
            }
            attempts += 1;
            if attempts % NAME_ATTEMPTS_PER_LENGTH == 0 {
                len += 1;
            }
        }
    }

    fn create_sprite(&mut self) -> Reply {
        let mut sprite = Sprite::new(self.io.pixel_editor.create_empty_grid());
        if sprite.normalize(self.state.canvas) {
            warn!("[sprites] pixel editor grid did not match the sprite canvas");
        }
        let name = self.unique_sprite_name();
        self.io.pixel_editor.load_grid(&name, &sprite);
        self.state.sprites.insert(name.clone(), sprite);
        self.state.selected_sprite = name;
        self.dispatch(Action::Render);
        Reply::Done
    }

    fn change_sprite_name(&mut self, old_name: &str, new_name: String) -> Reply {
        if new_name.trim().is_empty() || !self.state.sprites.rename(old_name, &new_name) {
            debug!("[sprites] rename '{old_name}' -> '{new_name}' ignored");
            return Reply::Done;
        }
        self.state.selected_sprite = new_name;
        self.dispatch(Action::Run);
        self.dispatch(Action::Render);
        Reply::Done
    }

    fn select_sprite(&mut self, name: String) -> Reply {
        let Some(sprite) = self.state.sprites.get(&name) else {
            warn!("[sprites] cannot select unknown sprite '{name}'");
            return Reply::Done;
        };
        self.io.pixel_editor.load_grid(&name, sprite);
        self.state.selected_sprite = name;
        self.dispatch(Action::Render);
        Reply::Done
    }

    fn delete_sprite(&mut self, name: &str) -> Reply {
        if self.state.sprites.remove(name).is_none() {
            warn!("[sprites] cannot delete unknown sprite '{name}'");
            return Reply::Done;
        }
        if self.state.selected_sprite == name {
            if let Some(first) = self.state.sprites.first_name().map(str::to_string) {
                self.dispatch(Action::SelectSprite { name: first });
            }
        }
        if self.state.sprites.is_empty() {
            self.dispatch(Action::CreateSprite);
        }
        self.dispatch(Action::Render);
        self.dispatch(Action::Run);
        Reply::Done
    }

    fn update_sprite_colors(&mut self, name: &str, colors: Vec<Rgba>) -> Reply {
        let expected = self.state.canvas.pixel_count();
        if colors.len() != expected {
            warn!("[sprites] '{name}' update has {} pixels, expected {expected}", colors.len());
            return Reply::Done;
        }
        let Some(sprite) = self.state.sprites.get_mut(name) else {
            warn!("[sprites] cannot update unknown sprite '{name}'");
            return Reply::Done;
        };
        sprite.colors = colors;
        self.dispatch(Action::Render);
        Reply::Done
    }

    fn set_show(&mut self, show: DebugOverlay) -> Reply {
        self.state.show = show;
        self.state.engine.borrow_mut().set_overlay(show);
        self.dispatch(Action::Render);
        Reply::Done
    }

    fn render(&mut self) -> Reply {
        self.io.view.render(&self.state);
        Reply::Done
    }
}
