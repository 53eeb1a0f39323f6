//! Guild configuration orchestrator: settle-all fan-out over every module
//! read for the selected guild, and the aggregate status derived from it.

pub mod outcome;
pub mod runner;
pub mod selection;
pub mod status;

pub use runner::{GuildConfigOrchestrator, RunResult};
pub use selection::ActiveGuild;
pub use status::GuildSnapshot;
