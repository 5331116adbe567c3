pub mod actions;
pub mod audio;
pub mod cli;
pub mod config;
pub mod console;
pub mod dispatcher;
pub mod events;
pub mod headless;
pub mod host;
pub mod lifecycle;
pub mod sandbox;
pub mod save;
pub mod sprites;
pub mod state;

pub use actions::{Action, Reply};
pub use dispatcher::Dispatcher;
pub use host::Host;
pub use state::AppState;
