use anyhow::{Context, Result};
use log::warn;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::sprites::SpriteCanvas;

#[derive(Debug, Clone, Deserialize)]
pub struct SpriteConfig {
    #[serde(default = "SpriteConfig::default_width")]
    pub width: usize,
    #[serde(default = "SpriteConfig::default_height")]
    pub height: usize,
    #[serde(default = "SpriteConfig::default_name_prefix")]
    pub name_prefix: String,
    #[serde(default = "SpriteConfig::default_suffix_len")]
    pub suffix_len: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SandboxConfig {
    #[serde(default = "SandboxConfig::default_max_operations")]
    pub max_operations: u64,
    #[serde(default = "SandboxConfig::default_max_call_levels")]
    pub max_call_levels: usize,
    #[serde(default = "SandboxConfig::default_max_expr_depth")]
    pub max_expr_depth: usize,
    #[serde(default = "SandboxConfig::default_max_string_size")]
    pub max_string_size: usize,
    #[serde(default = "SandboxConfig::default_max_array_size")]
    pub max_array_size: usize,
    #[serde(default)]
    pub deterministic_seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleConfig {
    #[serde(default = "ConsoleConfig::default_capacity")]
    pub capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    #[serde(default = "ProjectConfig::default_name")]
    pub default_name: String,
    #[serde(default = "ProjectConfig::default_export_dir")]
    pub export_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub sprite: SpriteConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub console: ConsoleConfig,
    #[serde(default)]
    pub project: ProjectConfig,
}

#[derive(Debug, Clone, Default)]
pub struct AppConfigOverrides {
    pub seed: Option<u64>,
    pub export_dir: Option<PathBuf>,
    pub name: Option<String>,
}

impl SpriteConfig {
    const fn default_width() -> usize {
        32
    }

    const fn default_height() -> usize {
        32
    }

    fn default_name_prefix() -> String {
        "sprite_".to_string()
    }

    const fn default_suffix_len() -> usize {
        3
    }

    pub fn canvas(&self) -> SpriteCanvas {
        SpriteCanvas::new(self.width, self.height)
    }
}

impl Default for SpriteConfig {
    fn default() -> Self {
        Self {
            width: Self::default_width(),
            height: Self::default_height(),
            name_prefix: Self::default_name_prefix(),
            suffix_len: Self::default_suffix_len(),
        }
    }
}

impl SandboxConfig {
    const fn default_max_operations() -> u64 {
        5_000_000
    }

    const fn default_max_call_levels() -> usize {
        64
    }

    const fn default_max_expr_depth() -> usize {
        64
    }

    const fn default_max_string_size() -> usize {
        1 << 20
    }

    const fn default_max_array_size() -> usize {
        1 << 16
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_operations: Self::default_max_operations(),
            max_call_levels: Self::default_max_call_levels(),
            max_expr_depth: Self::default_max_expr_depth(),
            max_string_size: Self::default_max_string_size(),
            max_array_size: Self::default_max_array_size(),
            deterministic_seed: None,
        }
    }
}

impl ConsoleConfig {
    const fn default_capacity() -> usize {
        512
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self { capacity: Self::default_capacity() }
    }
}

impl ProjectConfig {
    fn default_name() -> String {
        "name-here".to_string()
    }

    fn default_export_dir() -> PathBuf {
        PathBuf::from("exports")
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self { default_name: Self::default_name(), export_dir: Self::default_export_dir() }
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                warn!("Config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &AppConfigOverrides) {
        if let Some(seed) = overrides.seed {
            self.sandbox.deterministic_seed = Some(seed);
        }
        if let Some(dir) = &overrides.export_dir {
            self.project.export_dir = dir.clone();
        }
        if let Some(name) = &overrides.name {
            self.project.default_name = name.clone();
        }
    }
}

impl AppConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.seed.is_none() && self.export_dir.is_none() && self.name.is_none()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.seed.is_some() {
            fields.push("seed");
        }
        if self.export_dir.is_some() {
            fields.push("export_dir");
        }
        if self.name.is_some() {
            fields.push("name");
        }
        fields
    }
}
