//! Per-module settings storage.
//!
//! Layout:
//! data/
//! └── guilds/
//!     └── {guild_id}/
//!         ├── general_settings.json
//!         ├── ticket_settings.json
//!         └── ...             # one file per module kind

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{DashboardError, Result};
use crate::modules::{ModuleKind, ModuleSettings};

#[async_trait]
pub trait SettingsStorage: Send + Sync {
    /// Load a module's record, or its defaults when none was ever saved
    async fn get(&self, guild_id: &str, kind: ModuleKind) -> Result<ModuleSettings>;

    /// Write one module's record
    async fn save(&self, guild_id: &str, settings: &ModuleSettings) -> Result<()>;
}

pub type SharedStorage = Arc<dyn SettingsStorage>;

/// JSON files under the data directory
pub struct JsonSettingsStorage {
    base_path: PathBuf,
}

impl JsonSettingsStorage {
    pub fn new(data_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: data_path.as_ref().join("guilds"),
        }
    }

    fn record_path(&self, guild_id: &str, kind: ModuleKind) -> Result<PathBuf> {
        // Guild ids are snowflakes; anything else must not reach the filesystem
        if guild_id.is_empty() || !guild_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DashboardError::GuildNotAdministrable {
                id: guild_id.to_string(),
            });
        }
        Ok(self
            .base_path
            .join(guild_id)
            .join(format!("{}.json", kind.storage_key())))
    }
}

#[async_trait]
impl SettingsStorage for JsonSettingsStorage {
    async fn get(&self, guild_id: &str, kind: ModuleKind) -> Result<ModuleSettings> {
        let path = self.record_path(guild_id, kind)?;

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No {} record for guild {}, using defaults", kind, guild_id);
                return Ok(ModuleSettings::default_for(kind));
            }
            Err(e) => {
                return Err(DashboardError::SettingsLoad {
                    module: kind.display_name().to_string(),
                    message: e.to_string(),
                })
            }
        };

        let value: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| DashboardError::SettingsLoad {
                module: kind.display_name().to_string(),
                message: format!("{}: {}", path.display(), e),
            })?;

        ModuleSettings::from_value(kind, value).map_err(|e| DashboardError::SettingsLoad {
            module: kind.display_name().to_string(),
            message: e.to_string(),
        })
    }

    async fn save(&self, guild_id: &str, settings: &ModuleSettings) -> Result<()> {
        let kind = settings.kind();
        let path = self.record_path(guild_id, kind)?;
        let save_error = |e: std::io::Error| DashboardError::SettingsSave {
            module: kind.display_name().to_string(),
            message: e.to_string(),
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(save_error)?;
        }

        let content = serde_json::to_string_pretty(&settings.to_value())?;

        // Write atomically
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &content)
            .await
            .map_err(save_error)?;
        tokio::fs::rename(&temp_path, &path)
            .await
            .map_err(save_error)?;

        info!("Saved {} for guild {}", kind, guild_id);
        Ok(())
    }
}
