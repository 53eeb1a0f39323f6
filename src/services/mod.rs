//! External collaborators the dashboard talks to.

pub mod platform;
pub mod storage;

pub use platform::{ChatPlatform, DiscordPlatform, SharedPlatform, DISCORD_API_URL};
pub use storage::{JsonSettingsStorage, SettingsStorage, SharedStorage};
