use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::sprites::SpriteRegistry;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareKind {
    #[default]
    Link,
    File,
}

impl ShareKind {
    pub fn label(self) -> &'static str {
        match self {
            ShareKind::Link => "link",
            ShareKind::File => "file",
        }
    }
}

/// Serializable projection of a project: program text, sprites and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveState {
    #[serde(rename = "prog", alias = "programText")]
    pub program_text: String,
    #[serde(default)]
    pub sprites: SpriteRegistry,
    #[serde(default)]
    pub name: String,
}

impl SaveState {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Serializing save state")
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Parsing save state")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read save file {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Failed to parse save file {}", path.display()))
    }
}

/// The last snapshot that made it to the share backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LastSaved {
    pub name: String,
    #[serde(rename = "prog", alias = "programText")]
    pub program_text: String,
    pub link: String,
}

impl LastSaved {
    pub fn matches(&self, save: &SaveState) -> bool {
        !self.link.is_empty() && self.name == save.name && self.program_text == save.program_text
    }
}
