use std::path::PathBuf;
use std::time::Duration;

use crate::editor::DEFAULT_FEEDBACK_DELAY;
use crate::error::{DashboardError, Result};
use crate::services::DISCORD_API_URL;
use crate::state::SelectionFallback;

/// Dashboard configuration, from environment variables
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Bot token, used for channel lookups
    pub discord_token: String,
    /// Discord REST base URL for operator requests
    pub api_url: String,
    /// Root of the per-guild settings files
    pub data_path: PathBuf,
    /// Durable client state (selected guild per operator)
    pub state_path: PathBuf,
    /// How long save feedback stays visible
    pub save_feedback: Duration,
    pub selection_fallback: SelectionFallback,
    /// Browser origin allowed by CORS. Any origin when unset.
    pub allowed_origin: Option<String>,
}

impl DashboardConfig {
    pub fn from_env() -> Result<Self> {
        let discord_token = std::env::var("DISCORD_TOKEN").map_err(|_| DashboardError::Config {
            message: "Missing DISCORD_TOKEN environment variable".to_string(),
        })?;

        let selection_fallback = match std::env::var("SELECTION_FALLBACK") {
            Ok(value) => value
                .parse()
                .map_err(|message| DashboardError::Config { message })?,
            Err(_) => SelectionFallback::default(),
        };

        Ok(Self {
            discord_token,
            api_url: std::env::var("DISCORD_API_URL")
                .unwrap_or_else(|_| DISCORD_API_URL.to_string()),
            data_path: std::env::var("DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data")),
            state_path: std::env::var("STATE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/dashboard_state.json")),
            save_feedback: std::env::var("SAVE_FEEDBACK_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_FEEDBACK_DELAY),
            selection_fallback,
            allowed_origin: std::env::var("ALLOWED_ORIGIN")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        })
    }

    /// Per-operator dashboard options derived from this config
    pub fn dashboard_options(&self) -> crate::dashboard::DashboardOptions {
        crate::dashboard::DashboardOptions {
            feedback_delay: self.save_feedback,
            fallback: self.selection_fallback,
        }
    }
}
