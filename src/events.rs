use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Dispatched { action: &'static str, depth: usize },
    UnknownAction { name: String },
    RunFinished { failed: bool },
    ModuleQueued { blob: String },
    ModuleLoaded { blob: String, failed: bool },
    ShareUploaded { link: String },
}

impl StoreEvent {
    /// Top-level and nested action names in call order.
    pub fn action_name(&self) -> Option<&'static str> {
        match self {
            StoreEvent::Dispatched { action, .. } => Some(action),
            _ => None,
        }
    }
}

impl fmt::Display for StoreEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreEvent::Dispatched { action, depth } => write!(f, "Dispatched action={action} depth={depth}"),
            StoreEvent::UnknownAction { name } => write!(f, "UnknownAction name={name}"),
            StoreEvent::RunFinished { failed } => write!(f, "RunFinished failed={failed}"),
            StoreEvent::ModuleQueued { blob } => write!(f, "ModuleQueued blob={blob}"),
            StoreEvent::ModuleLoaded { blob, failed } => {
                write!(f, "ModuleLoaded blob={blob} failed={failed}")
            }
            StoreEvent::ShareUploaded { link } => write!(f, "ShareUploaded link={link}"),
        }
    }
}

#[derive(Default)]
pub struct EventBus {
    events: Vec<StoreEvent>,
}

impl EventBus {
    pub fn push(&mut self, event: StoreEvent) {
        self.events.push(event);
    }

    pub fn drain(&mut self) -> Vec<StoreEvent> {
        self.events.drain(..).collect()
    }
}
