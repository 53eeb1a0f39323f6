// src/models.rs
use serde::{Deserialize, Deserializer, Serialize};

pub const GUILD_ICON_CDN: &str = "https://cdn.discordapp.com/icons";
pub const DEFAULT_GUILD_ICON: &str = "https://cdn.discordapp.com/embed/avatars/0.png";

/// Guild entry as returned by `GET /users/@me/guilds`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawGuild {
    pub id: String,
    pub name: String,
    pub icon: Option<String>,
    #[serde(default)]
    pub owner: bool,
    /// Discord sends the permission bitfield as a decimal string
    #[serde(default, deserialize_with = "permissions_from_string_or_number")]
    pub permissions: u64,
}

/// A guild the operator may administer, normalized for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guild {
    pub id: String,
    pub name: String,
    pub icon_url: String,
    pub owner: bool,
    pub permissions: u64,
}

impl Guild {
    pub fn from_raw(raw: &RawGuild) -> Self {
        let icon_url = match raw.icon.as_deref() {
            Some(hash) if !hash.is_empty() => {
                format!("{}/{}/{}.png", GUILD_ICON_CDN, raw.id, hash)
            }
            _ => DEFAULT_GUILD_ICON.to_string(),
        };

        Self {
            id: raw.id.clone(),
            name: raw.name.clone(),
            icon_url,
            owner: raw.owner,
            permissions: raw.permissions,
        }
    }
}

/// The authenticated operator, from `GET /users/@me`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl OperatorUser {
    pub fn display_name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.username)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Text,
    Category,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub kind: ChannelKind,
    pub parent_id: Option<String>,
    pub position: u16,
}

fn permissions_from_string_or_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Mask {
        Text(String),
        Number(u64),
    }

    // A mask that can't be parsed grants nothing
    Ok(match Mask::deserialize(deserializer)? {
        Mask::Text(s) => s.trim().parse().unwrap_or(0),
        Mask::Number(n) => n,
    })
}
