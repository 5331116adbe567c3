use anyhow::{Context, Result};
use kestrel_sketch::cli::CliOverrides;
use kestrel_sketch::config::AppConfig;
use kestrel_sketch::console::ConsoleKind;
use kestrel_sketch::save::SaveState;
use kestrel_sketch::{Action, Dispatcher, Host};
use log::{info, warn};
use std::fs;

const DEFAULT_CONFIG_PATH: &str = "config/app.json";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = match CliOverrides::parse_from_env() {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("[cli] {err}");
            std::process::exit(2);
        }
    };
    match run(&cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("Application error: {err:?}");
            std::process::exit(1);
        }
    }
}

/// Returns whether the program ran without error.
fn run(cli: &CliOverrides) -> Result<bool> {
    let mut config = match cli.config_path() {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::load_or_default(DEFAULT_CONFIG_PATH),
    };
    let overrides = cli.config_overrides();
    if !overrides.is_empty() {
        info!("[cli] overriding {}", overrides.applied_fields().join(", "));
        config.apply_overrides(&overrides);
    }

    let mut dispatcher = Dispatcher::new(&config, Host::headless(&config));
    dispatcher.dispatch(Action::Init);
    if let Some(path) = cli.load() {
        let saved = SaveState::load(path)?;
        dispatcher.dispatch(Action::Upload { saved });
    } else if let Some(path) = cli.program() {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read program {}", path.display()))?;
        dispatcher.dispatch(Action::LoadExample { content });
    } else {
        dispatcher.dispatch(Action::Run);
    }
    dispatcher.pump();

    let state = dispatcher.state();
    for entry in state.logs().entries() {
        match entry.kind {
            ConsoleKind::Output => println!("{}", entry.text),
            ConsoleKind::Error => eprintln!("{}", entry.text),
        }
    }
    if state.logs().dropped() > 0 {
        warn!("[console] {} earlier entries were trimmed from the log", state.logs().dropped());
    }
    let ok = !state.error();

    if let Some(kind) = cli.export() {
        dispatcher.dispatch(Action::Save { kind });
        dispatcher.pump();
        let link = &dispatcher.state().last_saved().link;
        if !link.is_empty() {
            println!("[share] {link}");
        }
    }
    Ok(ok)
}
