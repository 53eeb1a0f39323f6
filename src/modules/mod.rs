//! The closed set of configuration modules a guild can carry.

pub mod channels;
pub mod settings;

pub use channels::{ChannelList, ChannelPicker};
pub use settings::*;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::ChannelKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModuleKind {
    General,
    Tickets,
    Automod,
    Chatbot,
    Giveaways,
    ClaimTime,
    Commands,
    Logging,
    JoinRoles,
    ReactionRoles,
    WelcomeMessages,
}

impl ModuleKind {
    pub const ALL: [ModuleKind; 11] = [
        ModuleKind::General,
        ModuleKind::Tickets,
        ModuleKind::Automod,
        ModuleKind::Chatbot,
        ModuleKind::Giveaways,
        ModuleKind::ClaimTime,
        ModuleKind::Commands,
        ModuleKind::Logging,
        ModuleKind::JoinRoles,
        ModuleKind::ReactionRoles,
        ModuleKind::WelcomeMessages,
    ];

    /// Lowercase token used in URL fragments and API paths
    pub fn token(self) -> &'static str {
        match self {
            ModuleKind::General => "general",
            ModuleKind::Tickets => "tickets",
            ModuleKind::Automod => "automod",
            ModuleKind::Chatbot => "chatbot",
            ModuleKind::Giveaways => "giveaways",
            ModuleKind::ClaimTime => "claimtime",
            ModuleKind::Commands => "commands",
            ModuleKind::Logging => "logging",
            ModuleKind::JoinRoles => "joinroles",
            ModuleKind::ReactionRoles => "reactionroles",
            ModuleKind::WelcomeMessages => "welcomemessages",
        }
    }

    /// File stem the storage layer keeps this module's record under
    pub fn storage_key(self) -> &'static str {
        match self {
            ModuleKind::General => "general_settings",
            ModuleKind::Tickets => "ticket_settings",
            ModuleKind::Automod => "automod_settings",
            ModuleKind::Chatbot => "chatbot_settings",
            ModuleKind::Giveaways => "giveaway_settings",
            ModuleKind::ClaimTime => "claim_time_settings",
            ModuleKind::Commands => "command_settings",
            ModuleKind::Logging => "logging_settings",
            ModuleKind::JoinRoles => "join_role_settings",
            ModuleKind::ReactionRoles => "reaction_role_settings",
            ModuleKind::WelcomeMessages => "welcome_settings",
        }
    }

    /// Human-readable name shown in navigation and warnings
    pub fn display_name(self) -> &'static str {
        match self {
            ModuleKind::General => "General Settings",
            ModuleKind::Tickets => "Ticket System",
            ModuleKind::Automod => "Auto Moderation",
            ModuleKind::Chatbot => "Chatbot",
            ModuleKind::Giveaways => "Giveaways",
            ModuleKind::ClaimTime => "Claim Time",
            ModuleKind::Commands => "Commands",
            ModuleKind::Logging => "Logging",
            ModuleKind::JoinRoles => "Join Roles",
            ModuleKind::ReactionRoles => "Reaction Roles",
            ModuleKind::WelcomeMessages => "Welcome Messages",
        }
    }

    /// Case-insensitive lookup by fragment token
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.token().eq_ignore_ascii_case(token))
    }

    /// Channel selectors this module's editor renders: (field, accepted kind)
    pub fn channel_fields(self) -> &'static [(&'static str, ChannelKind)] {
        match self {
            ModuleKind::Tickets => &[
                ("panelChannelId", ChannelKind::Text),
                ("categoryId", ChannelKind::Category),
            ],
            ModuleKind::Chatbot => &[("channelId", ChannelKind::Text)],
            ModuleKind::Logging => &[("channelId", ChannelKind::Text)],
            ModuleKind::ReactionRoles => &[("channelId", ChannelKind::Text)],
            ModuleKind::WelcomeMessages => &[("channelId", ChannelKind::Text)],
            _ => &[],
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
