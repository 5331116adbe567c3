use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::lifecycle::DebugOverlay;
use crate::save::{LastSaved, SaveState, ShareKind};
use crate::sprites::Rgba;

/// The closed set of operations allowed to mutate the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Init,
    Run,
    ShareType { kind: ShareKind },
    GetSaveState,
    Save { kind: ShareKind },
    CanvasMouseMove { mouse_x: f64, mouse_y: f64 },
    SizeUpSprites,
    Upload { saved: SaveState },
    LoadExample { content: String },
    CreateSprite,
    ChangeSpriteName { old_name: String, new_name: String },
    SelectSprite { name: String },
    DeleteSprite { name: String },
    UpdateSpriteColors { name: String, colors: Vec<Rgba> },
    SetShow { show: DebugOverlay },
    ShareLinkReady { saved: LastSaved },
    Render,
}

/// What a handler hands back to its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Done,
    SaveState(String),
}

impl Reply {
    pub fn save_state(&self) -> Option<&str> {
        match self {
            Reply::SaveState(json) => Some(json),
            Reply::Done => None,
        }
    }
}

#[derive(Deserialize)]
struct KindArgs {
    #[serde(rename = "type")]
    kind: ShareKind,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pointer {
    mouse_x: f64,
    mouse_y: f64,
}

#[derive(Deserialize)]
struct PointerArgs {
    content: Pointer,
}

#[derive(Deserialize)]
struct UploadArgs {
    saved: SaveState,
}

#[derive(Deserialize)]
struct ContentArgs {
    content: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenameArgs {
    old_name: String,
    new_name: String,
}

#[derive(Deserialize)]
struct NameArgs {
    name: String,
}

#[derive(Deserialize)]
struct ColorsArgs {
    name: String,
    colors: Vec<Rgba>,
}

fn parse<T: DeserializeOwned>(name: &str, args: Value) -> Result<T> {
    serde_json::from_value(args).with_context(|| format!("Invalid arguments for {name}"))
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Init => "INIT",
            Action::Run => "RUN",
            Action::ShareType { .. } => "SHARE_TYPE",
            Action::GetSaveState => "GET_SAVE_STATE",
            Action::Save { .. } => "SAVE",
            Action::CanvasMouseMove { .. } => "CANVAS_MOUSE_MOVE",
            Action::SizeUpSprites => "SIZE_UP_SPRITES",
            Action::Upload { .. } => "UPLOAD",
            Action::LoadExample { .. } => "LOAD_EXAMPLE",
            Action::CreateSprite => "CREATE_SPRITE",
            Action::ChangeSpriteName { .. } => "CHANGE_SPRITE_NAME",
            Action::SelectSprite { .. } => "SELECT_SPRITE",
            Action::DeleteSprite { .. } => "DELETE_SPRITE",
            Action::UpdateSpriteColors { .. } => "UPDATE_SPRITE_COLORS",
            Action::SetShow { .. } => "SET_SHOW",
            Action::ShareLinkReady { .. } => "SHARE_LINK_READY",
            Action::Render => "RENDER",
        }
    }

    /// Builds an action from its registered name and JSON arguments.
    /// `Ok(None)` means the name is not registered.
    pub fn from_named(name: &str, args: Value) -> Result<Option<Self>> {
        let action = match name {
            "INIT" => Action::Init,
            "RUN" => Action::Run,
            "SHARE_TYPE" => Action::ShareType { kind: parse::<KindArgs>(name, args)?.kind },
            "GET_SAVE_STATE" => Action::GetSaveState,
            "SAVE" => Action::Save { kind: parse::<KindArgs>(name, args)?.kind },
            "CANVAS_MOUSE_MOVE" => {
                let Pointer { mouse_x, mouse_y } = parse::<PointerArgs>(name, args)?.content;
                Action::CanvasMouseMove { mouse_x, mouse_y }
            }
            "SIZE_UP_SPRITES" => Action::SizeUpSprites,
            "UPLOAD" => Action::Upload { saved: parse::<UploadArgs>(name, args)?.saved },
            "LOAD_EXAMPLE" => Action::LoadExample { content: parse::<ContentArgs>(name, args)?.content },
            "CREATE_SPRITE" => Action::CreateSprite,
            "CHANGE_SPRITE_NAME" => {
                let RenameArgs { old_name, new_name } = parse(name, args)?;
                Action::ChangeSpriteName { old_name, new_name }
            }
            "SELECT_SPRITE" => Action::SelectSprite { name: parse::<NameArgs>(name, args)?.name },
            "DELETE_SPRITE" => Action::DeleteSprite { name: parse::<NameArgs>(name, args)?.name },
            "UPDATE_SPRITE_COLORS" => {
                let ColorsArgs { name: sprite, colors } = parse(name, args)?;
                Action::UpdateSpriteColors { name: sprite, colors }
            }
            "SET_SHOW" => Action::SetShow { show: parse(name, args)? },
            "SHARE_LINK_READY" => Action::ShareLinkReady { saved: parse(name, args)? },
            "RENDER" => Action::Render,
            _ => return Ok(None),
        };
        Ok(Some(action))
    }
}
