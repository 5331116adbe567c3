use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::host::{EngineFactory, FrameScheduler, VisualEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnimationFrameId(pub u64);

impl fmt::Display for AnimationFrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

/// Debug overlays the engine draws on top of the scene.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugOverlay {
    pub origin: bool,
    pub hitbox: bool,
}

/// Shared reference to a constructed engine, handed back to the program that
/// called `createEngine`.
#[derive(Clone)]
pub struct EngineRef {
    engine: Rc<RefCell<Box<dyn VisualEngine>>>,
    generation: u64,
}

impl EngineRef {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn animation_frame(&self) -> Option<AnimationFrameId> {
        self.engine.borrow().animation_frame()
    }

    pub fn same_instance(&self, other: &EngineRef) -> bool {
        Rc::ptr_eq(&self.engine, &other.engine)
    }

    fn set_show(&self, show: DebugOverlay) {
        self.engine.borrow_mut().set_show(show);
    }
}

impl fmt::Debug for EngineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineRef").field("generation", &self.generation).finish()
    }
}

/// Keeps at most one engine ticking. Constructing a replacement cancels the
/// previous instance's pending animation frame first.
pub struct EngineLifecycle {
    factory: Box<dyn EngineFactory>,
    scheduler: Box<dyn FrameScheduler>,
    current: Option<EngineRef>,
    overlay: DebugOverlay,
    generation: u64,
    cancelled_frames: u64,
}

impl EngineLifecycle {
    pub fn new(factory: Box<dyn EngineFactory>, scheduler: Box<dyn FrameScheduler>) -> Self {
        Self {
            factory,
            scheduler,
            current: None,
            overlay: DebugOverlay::default(),
            generation: 0,
            cancelled_frames: 0,
        }
    }

    pub fn current(&self) -> Option<&EngineRef> {
        self.current.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cancelled_frames(&self) -> u64 {
        self.cancelled_frames
    }

    pub fn overlay(&self) -> DebugOverlay {
        self.overlay
    }

    pub fn set_overlay(&mut self, overlay: DebugOverlay) {
        self.overlay = overlay;
        if let Some(current) = &self.current {
            current.set_show(overlay);
        }
    }

    /// Stops the current engine's animation loop, if any, then constructs and
    /// records the replacement.
    pub fn replace(&mut self, args: Vec<serde_json::Value>) -> Result<EngineRef> {
        if let Some(previous) = self.current.take() {
            if let Some(frame) = previous.animation_frame() {
                debug!("cancelling {frame} of engine generation {}", previous.generation);
                self.scheduler.cancel_animation_frame(frame);
                self.cancelled_frames += 1;
            }
        }
        let mut engine = self.factory.construct(args).context("Constructing engine")?;
        engine.set_show(self.overlay);
        self.generation += 1;
        let handle = EngineRef { engine: Rc::new(RefCell::new(engine)), generation: self.generation };
        self.current = Some(handle.clone());
        Ok(handle)
    }
}

#[derive(Clone)]
pub struct EngineLifecycleHandle(Rc<RefCell<EngineLifecycle>>);

impl EngineLifecycleHandle {
    pub fn new(lifecycle: EngineLifecycle) -> Self {
        Self(Rc::new(RefCell::new(lifecycle)))
    }

    pub fn borrow(&self) -> Ref<'_, EngineLifecycle> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, EngineLifecycle> {
        self.0.borrow_mut()
    }
}
