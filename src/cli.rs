use crate::config::AppConfigOverrides;
use crate::save::ShareKind;
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CliOverrides {
    config: Option<PathBuf>,
    program: Option<PathBuf>,
    load: Option<PathBuf>,
    export: Option<ShareKind>,
    seed: Option<u64>,
    export_dir: Option<PathBuf>,
    name: Option<String>,
}

impl CliOverrides {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = CliOverrides::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            let Some(key) = flag.strip_prefix("--") else {
                bail!("Unexpected argument '{flag}'. Flags take the form --name value.");
            };
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?.as_ref().to_string();
            match key {
                "config" => overrides.config = Some(PathBuf::from(value)),
                "program" => overrides.program = Some(PathBuf::from(value)),
                "load" => overrides.load = Some(PathBuf::from(value)),
                "export" => overrides.export = Some(parse_share_kind(&value)?),
                "seed" => {
                    overrides.seed =
                        Some(value.parse::<u64>().with_context(|| format!("Invalid seed '{value}'"))?);
                }
                "export-dir" => overrides.export_dir = Some(PathBuf::from(value)),
                "name" => overrides.name = Some(value),
                _ => bail!(
                    "Unknown flag '{flag}'. Supported flags: --config, --program, --load, --export, --seed, \
                     --export-dir, --name."
                ),
            }
        }
        if overrides.program.is_some() && overrides.load.is_some() {
            bail!("--program and --load are mutually exclusive");
        }
        Ok(overrides)
    }

    pub fn config_path(&self) -> Option<&PathBuf> {
        self.config.as_ref()
    }

    pub fn program(&self) -> Option<&PathBuf> {
        self.program.as_ref()
    }

    pub fn load(&self) -> Option<&PathBuf> {
        self.load.as_ref()
    }

    pub fn export(&self) -> Option<ShareKind> {
        self.export
    }

    pub fn config_overrides(&self) -> AppConfigOverrides {
        AppConfigOverrides { seed: self.seed, export_dir: self.export_dir.clone(), name: self.name.clone() }
    }
}

fn parse_share_kind(value: &str) -> Result<ShareKind> {
    match value.to_ascii_lowercase().as_str() {
        "link" => Ok(ShareKind::Link),
        "file" => Ok(ShareKind::File),
        other => bail!("Invalid export kind '{other}'. Use link or file."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_program_export_and_seed() {
        let args = ["app", "--program", "demo.rhai", "--export", "FILE", "--seed", "42"];
        let overrides = CliOverrides::parse(args).expect("parse overrides");
        assert_eq!(overrides.program(), Some(&PathBuf::from("demo.rhai")));
        assert_eq!(overrides.export(), Some(ShareKind::File));
        assert_eq!(overrides.config_overrides().seed, Some(42));
    }

    #[test]
    fn latest_flag_wins() {
        let args = ["app", "--name", "first", "--name", "second"];
        let overrides = CliOverrides::parse(args).expect("parse overrides");
        assert_eq!(overrides.config_overrides().name.as_deref(), Some("second"));
    }

    #[test]
    fn missing_value_errors() {
        let err = CliOverrides::parse(["app", "--program"]).unwrap_err();
        assert!(err.to_string().contains("Expected a value"), "error should mention missing value");
    }

    #[test]
    fn rejects_unknown_flags() {
        let err = CliOverrides::parse(["app", "--foo", "bar"]).unwrap_err();
        assert!(err.to_string().contains("Unknown flag"), "unknown flags should error");
    }

    #[test]
    fn program_and_load_conflict() {
        let err = CliOverrides::parse(["app", "--program", "a.rhai", "--load", "b.json"]).unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }
}
