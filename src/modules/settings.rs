//! Per-module settings records.
//!
//! Each record deserializes with `#[serde(default)]` so a partially written
//! (or empty) record from storage is still usable, and every `is_active` rule
//! is a pure function of the record alone.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::ModuleKind;
use crate::error::{DashboardError, Result};

pub const DEFAULT_PREFIX: &str = ",";
pub const MAX_PREFIXES: usize = 5;
pub const MAX_PREFIX_LEN: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeneralSettings {
    pub prefix: String,
    pub language: String,
    pub use_24_hour_time: bool,
    pub manager_role_ids: Vec<String>,
    pub error_logs_enabled: bool,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            language: "en".to_string(),
            use_24_hour_time: true,
            manager_role_ids: Vec::new(),
            error_logs_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TicketSettings {
    pub panel_channel_id: Option<String>,
    pub category_id: Option<String>,
    pub support_role_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AutoModSettings {
    pub enabled: bool,
    pub block_bad_words: bool,
    pub anti_spam: bool,
    pub whitelisted_role_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChatbotSettings {
    pub enabled: bool,
    pub channel_id: Option<String>,
    pub persona: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GiveawaySettings {
    pub manager_role_ids: Vec<String>,
    pub default_emoji: String,
}

impl Default for GiveawaySettings {
    fn default() -> Self {
        Self {
            manager_role_ids: Vec::new(),
            default_emoji: "🎉".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClaimTimeSettings {
    pub enabled: bool,
    pub role_id: Option<String>,
    pub command: String,
    pub frequency_hours: u32,
}

impl Default for ClaimTimeSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            role_id: None,
            command: "claim".to_string(),
            frequency_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CustomCommand {
    pub name: String,
    pub response: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommandSettings {
    pub prefixes: Vec<String>,
    pub custom_commands: Vec<CustomCommand>,
    pub disabled_commands: Vec<String>,
    pub error_command_not_found_enabled: bool,
    pub error_wrong_usage_enabled: bool,
}

impl CommandSettings {
    /// Add a prefix if it is new, non-empty and within limits.
    /// Returns whether the draft changed.
    pub fn add_prefix(&mut self, prefix: &str) -> bool {
        let prefix = prefix.trim();
        if prefix.is_empty()
            || prefix.chars().count() > MAX_PREFIX_LEN
            || self.prefixes.len() >= MAX_PREFIXES
            || self.prefixes.iter().any(|p| p == prefix)
        {
            return false;
        }
        self.prefixes.push(prefix.to_string());
        true
    }

    pub fn remove_prefix(&mut self, prefix: &str) -> bool {
        let before = self.prefixes.len();
        self.prefixes.retain(|p| p != prefix);
        self.prefixes.len() != before
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoggingSettings {
    pub channel_id: Option<String>,
    pub message_edits: bool,
    pub message_deletes: bool,
    pub member_joins: bool,
    pub member_leaves: bool,
    pub moderation_actions: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JoinRoleSettings {
    pub role_ids: Vec<String>,
    pub bot_role_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReactionRoleEntry {
    pub emoji: String,
    pub role_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReactionRolePanel {
    pub channel_id: Option<String>,
    pub message_id: Option<String>,
    pub entries: Vec<ReactionRoleEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReactionRoleSettings {
    pub panels: Vec<ReactionRolePanel>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WelcomeSettings {
    pub enabled: bool,
    pub channel_id: Option<String>,
    pub message: String,
    pub dm_enabled: bool,
}

/// One record per module kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "module", content = "settings", rename_all = "camelCase")]
pub enum ModuleSettings {
    General(GeneralSettings),
    Tickets(TicketSettings),
    Automod(AutoModSettings),
    Chatbot(ChatbotSettings),
    Giveaways(GiveawaySettings),
    ClaimTime(ClaimTimeSettings),
    Commands(CommandSettings),
    Logging(LoggingSettings),
    JoinRoles(JoinRoleSettings),
    ReactionRoles(ReactionRoleSettings),
    WelcomeMessages(WelcomeSettings),
}

impl ModuleSettings {
    /// The safe default rendered when a module has no record or failed to load
    pub fn default_for(kind: ModuleKind) -> Self {
        match kind {
            ModuleKind::General => Self::General(GeneralSettings::default()),
            ModuleKind::Tickets => Self::Tickets(TicketSettings::default()),
            ModuleKind::Automod => Self::Automod(AutoModSettings::default()),
            ModuleKind::Chatbot => Self::Chatbot(ChatbotSettings::default()),
            ModuleKind::Giveaways => Self::Giveaways(GiveawaySettings::default()),
            ModuleKind::ClaimTime => Self::ClaimTime(ClaimTimeSettings::default()),
            ModuleKind::Commands => Self::Commands(CommandSettings::default()),
            ModuleKind::Logging => Self::Logging(LoggingSettings::default()),
            ModuleKind::JoinRoles => Self::JoinRoles(JoinRoleSettings::default()),
            ModuleKind::ReactionRoles => Self::ReactionRoles(ReactionRoleSettings::default()),
            ModuleKind::WelcomeMessages => Self::WelcomeMessages(WelcomeSettings::default()),
        }
    }

    pub fn kind(&self) -> ModuleKind {
        match self {
            Self::General(_) => ModuleKind::General,
            Self::Tickets(_) => ModuleKind::Tickets,
            Self::Automod(_) => ModuleKind::Automod,
            Self::Chatbot(_) => ModuleKind::Chatbot,
            Self::Giveaways(_) => ModuleKind::Giveaways,
            Self::ClaimTime(_) => ModuleKind::ClaimTime,
            Self::Commands(_) => ModuleKind::Commands,
            Self::Logging(_) => ModuleKind::Logging,
            Self::JoinRoles(_) => ModuleKind::JoinRoles,
            Self::ReactionRoles(_) => ModuleKind::ReactionRoles,
            Self::WelcomeMessages(_) => ModuleKind::WelcomeMessages,
        }
    }

    /// Whether the module counts as configured/active for status badges
    pub fn is_active(&self) -> bool {
        match self {
            Self::General(s) => !s.manager_role_ids.is_empty(),
            Self::Tickets(s) => is_set(&s.panel_channel_id),
            Self::Automod(s) => s.enabled,
            Self::Chatbot(s) => s.enabled,
            Self::Giveaways(s) => !s.manager_role_ids.is_empty(),
            Self::ClaimTime(s) => s.enabled,
            Self::Commands(s) => !s.custom_commands.is_empty(),
            Self::Logging(s) => is_set(&s.channel_id),
            Self::JoinRoles(s) => !s.role_ids.is_empty(),
            Self::ReactionRoles(s) => s.panels.iter().any(|p| !p.entries.is_empty()),
            Self::WelcomeMessages(s) => s.enabled && is_set(&s.channel_id),
        }
    }

    /// Parse a record for `kind` from its bare JSON body
    pub fn from_value(kind: ModuleKind, value: serde_json::Value) -> Result<Self> {
        let parsed = match kind {
            ModuleKind::General => serde_json::from_value(value).map(Self::General),
            ModuleKind::Tickets => serde_json::from_value(value).map(Self::Tickets),
            ModuleKind::Automod => serde_json::from_value(value).map(Self::Automod),
            ModuleKind::Chatbot => serde_json::from_value(value).map(Self::Chatbot),
            ModuleKind::Giveaways => serde_json::from_value(value).map(Self::Giveaways),
            ModuleKind::ClaimTime => serde_json::from_value(value).map(Self::ClaimTime),
            ModuleKind::Commands => serde_json::from_value(value).map(Self::Commands),
            ModuleKind::Logging => serde_json::from_value(value).map(Self::Logging),
            ModuleKind::JoinRoles => serde_json::from_value(value).map(Self::JoinRoles),
            ModuleKind::ReactionRoles => serde_json::from_value(value).map(Self::ReactionRoles),
            ModuleKind::WelcomeMessages => {
                serde_json::from_value(value).map(Self::WelcomeMessages)
            }
        };

        parsed.map_err(|e| DashboardError::validation(format!("{}: {}", kind.display_name(), e)))
    }

    /// The bare record, without the module tag
    pub fn to_value(&self) -> serde_json::Value {
        let value = match self {
            Self::General(s) => serde_json::to_value(s),
            Self::Tickets(s) => serde_json::to_value(s),
            Self::Automod(s) => serde_json::to_value(s),
            Self::Chatbot(s) => serde_json::to_value(s),
            Self::Giveaways(s) => serde_json::to_value(s),
            Self::ClaimTime(s) => serde_json::to_value(s),
            Self::Commands(s) => serde_json::to_value(s),
            Self::Logging(s) => serde_json::to_value(s),
            Self::JoinRoles(s) => serde_json::to_value(s),
            Self::ReactionRoles(s) => serde_json::to_value(s),
            Self::WelcomeMessages(s) => serde_json::to_value(s),
        };
        value.unwrap_or(serde_json::Value::Null)
    }

    /// Check a draft before it is written
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::General(s) => {
                let len = s.prefix.trim().chars().count();
                if len == 0 || len > MAX_PREFIX_LEN {
                    return Err(DashboardError::validation(format!(
                        "Prefix must be between 1 and {} characters",
                        MAX_PREFIX_LEN
                    )));
                }
            }
            Self::Commands(s) => {
                if s.prefixes.len() > MAX_PREFIXES {
                    return Err(DashboardError::validation(format!(
                        "At most {} prefixes are allowed",
                        MAX_PREFIXES
                    )));
                }
                let mut seen = HashSet::new();
                for prefix in &s.prefixes {
                    let len = prefix.chars().count();
                    if len == 0 || len > MAX_PREFIX_LEN {
                        return Err(DashboardError::validation(format!(
                            "Prefix '{}' must be between 1 and {} characters",
                            prefix, MAX_PREFIX_LEN
                        )));
                    }
                    if !seen.insert(prefix.as_str()) {
                        return Err(DashboardError::validation(format!(
                            "Duplicate prefix '{}'",
                            prefix
                        )));
                    }
                }
                let mut names = HashSet::new();
                for command in &s.custom_commands {
                    let name = command.name.trim().to_lowercase();
                    if name.is_empty() {
                        return Err(DashboardError::validation("Custom command name is empty"));
                    }
                    if !names.insert(name) {
                        return Err(DashboardError::validation(format!(
                            "Duplicate custom command '{}'",
                            command.name
                        )));
                    }
                }
            }
            Self::ClaimTime(s) => {
                if s.frequency_hours == 0 {
                    return Err(DashboardError::validation(
                        "Claim frequency must be at least 1 hour",
                    ));
                }
            }
            Self::ReactionRoles(s) => {
                let blank = s
                    .panels
                    .iter()
                    .flat_map(|p| &p.entries)
                    .any(|e| e.emoji.trim().is_empty() || e.role_id.trim().is_empty());
                if blank {
                    return Err(DashboardError::validation(
                        "Every reaction role needs an emoji and a role",
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Effective command prefix, if this is the general record
    pub fn prefix(&self) -> Option<&str> {
        match self {
            Self::General(s) => Some(s.prefix.as_str()),
            _ => None,
        }
    }
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}
