//! In-memory collaborators for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{DashboardError, Result};
use crate::models::{Channel, ChannelKind, OperatorUser, RawGuild};
use crate::modules::*;
use crate::services::{ChatPlatform, SettingsStorage};
use crate::state::durable_store::DurableStore;

/// A record for `kind` that counts as active
pub fn configured_settings(kind: ModuleKind) -> ModuleSettings {
    let channel = Some("c1".to_string());
    let roles = vec!["r1".to_string()];
    match kind {
        ModuleKind::General => ModuleSettings::General(GeneralSettings {
            prefix: "!".to_string(),
            manager_role_ids: roles,
            ..Default::default()
        }),
        ModuleKind::Tickets => ModuleSettings::Tickets(TicketSettings {
            panel_channel_id: channel,
            ..Default::default()
        }),
        ModuleKind::Automod => ModuleSettings::Automod(AutoModSettings {
            enabled: true,
            ..Default::default()
        }),
        ModuleKind::Chatbot => ModuleSettings::Chatbot(ChatbotSettings {
            enabled: true,
            channel_id: channel,
            ..Default::default()
        }),
        ModuleKind::Giveaways => ModuleSettings::Giveaways(GiveawaySettings {
            manager_role_ids: roles,
            ..Default::default()
        }),
        ModuleKind::ClaimTime => ModuleSettings::ClaimTime(ClaimTimeSettings {
            enabled: true,
            ..Default::default()
        }),
        ModuleKind::Commands => ModuleSettings::Commands(CommandSettings {
            custom_commands: vec![CustomCommand {
                name: "rules".to_string(),
                response: "Be nice".to_string(),
            }],
            ..Default::default()
        }),
        ModuleKind::Logging => ModuleSettings::Logging(LoggingSettings {
            channel_id: channel,
            ..Default::default()
        }),
        ModuleKind::JoinRoles => ModuleSettings::JoinRoles(JoinRoleSettings {
            role_ids: roles,
            ..Default::default()
        }),
        ModuleKind::ReactionRoles => ModuleSettings::ReactionRoles(ReactionRoleSettings {
            panels: vec![ReactionRolePanel {
                channel_id: channel,
                message_id: None,
                entries: vec![ReactionRoleEntry {
                    emoji: "🎮".to_string(),
                    role_id: "r1".to_string(),
                }],
            }],
        }),
        ModuleKind::WelcomeMessages => ModuleSettings::WelcomeMessages(WelcomeSettings {
            enabled: true,
            channel_id: channel,
            ..Default::default()
        }),
    }
}

pub fn raw_guild(id: &str, owner: bool, permissions: u64) -> RawGuild {
    RawGuild {
        id: id.to_string(),
        name: format!("Guild {}", id),
        icon: None,
        owner,
        permissions,
    }
}

pub fn text_channel(id: &str, name: &str) -> Channel {
    Channel {
        id: id.to_string(),
        name: name.to_string(),
        kind: ChannelKind::Text,
        parent_id: None,
        position: 0,
    }
}

pub struct FakePlatform {
    user: Mutex<Option<OperatorUser>>,
    guilds: Mutex<std::result::Result<Vec<RawGuild>, String>>,
    channels: Mutex<HashMap<String, Vec<Channel>>>,
    channel_failure: Mutex<Option<String>>,
    channel_delay: Mutex<Duration>,
    channel_reads: AtomicUsize,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            user: Mutex::new(Some(OperatorUser {
                id: "u1".to_string(),
                username: "astro".to_string(),
                global_name: Some("AstroDev".to_string()),
                avatar: None,
            })),
            guilds: Mutex::new(Ok(Vec::new())),
            channels: Mutex::new(HashMap::new()),
            channel_failure: Mutex::new(None),
            channel_delay: Mutex::new(Duration::ZERO),
            channel_reads: AtomicUsize::new(0),
        }
    }

    pub fn set_guilds(&self, guilds: Vec<RawGuild>) {
        *self.guilds.lock() = Ok(guilds);
    }

    pub fn fail_guilds(&self, reason: &str) {
        *self.guilds.lock() = Err(reason.to_string());
    }

    pub fn reject_token(&self) {
        *self.user.lock() = None;
    }

    pub fn set_channels(&self, guild_id: &str, channels: Vec<Channel>) {
        self.channels.lock().insert(guild_id.to_string(), channels);
    }

    pub fn fail_channels(&self, reason: &str) {
        *self.channel_failure.lock() = Some(reason.to_string());
    }

    pub fn set_channel_delay(&self, delay: Duration) {
        *self.channel_delay.lock() = delay;
    }

    pub fn channel_reads(&self) -> usize {
        self.channel_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    async fn current_user(&self, _access_token: &str) -> Result<OperatorUser> {
        self.user.lock().clone().ok_or(DashboardError::Discord {
            status: Some(401),
            message: "401 Unauthorized".to_string(),
        })
    }

    async fn list_guilds(&self, _access_token: &str) -> Result<Vec<RawGuild>> {
        self.guilds.lock().clone().map_err(|message| DashboardError::Discord {
            status: Some(401),
            message,
        })
    }

    async fn list_channels(&self, guild_id: &str) -> Result<Vec<Channel>> {
        self.channel_reads.fetch_add(1, Ordering::SeqCst);
        let delay = *self.channel_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = self.channel_failure.lock().clone() {
            return Err(DashboardError::Discord {
                status: Some(403),
                message: reason,
            });
        }
        Ok(self
            .channels
            .lock()
            .get(guild_id)
            .cloned()
            .unwrap_or_default())
    }
}

pub struct FakeStorage {
    records: Mutex<HashMap<(String, ModuleKind), ModuleSettings>>,
    failing: Mutex<HashMap<ModuleKind, String>>,
    kind_delays: Mutex<HashMap<ModuleKind, Duration>>,
    guild_delays: Mutex<HashMap<String, Duration>>,
    read_starts: Mutex<Vec<Instant>>,
    saves: Mutex<Vec<(String, ModuleSettings)>>,
    fail_saves: AtomicBool,
}

impl FakeStorage {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashMap::new()),
            kind_delays: Mutex::new(HashMap::new()),
            guild_delays: Mutex::new(HashMap::new()),
            read_starts: Mutex::new(Vec::new()),
            saves: Mutex::new(Vec::new()),
            fail_saves: AtomicBool::new(false),
        }
    }

    /// Store an active record for every module of `guild_id`
    pub fn configure_all(&self, guild_id: &str) {
        let mut records = self.records.lock();
        for kind in ModuleKind::ALL {
            records.insert((guild_id.to_string(), kind), configured_settings(kind));
        }
    }

    pub fn fail_kind(&self, kind: ModuleKind, reason: &str) {
        self.failing.lock().insert(kind, reason.to_string());
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn set_kind_delay(&self, kind: ModuleKind, delay: Duration) {
        self.kind_delays.lock().insert(kind, delay);
    }

    pub fn set_guild_delay(&self, guild_id: &str, delay: Duration) {
        self.guild_delays.lock().insert(guild_id.to_string(), delay);
    }

    pub fn read_count(&self) -> usize {
        self.read_starts.lock().len()
    }

    pub fn read_starts(&self) -> Vec<Instant> {
        self.read_starts.lock().clone()
    }

    pub fn saves(&self) -> Vec<(String, ModuleSettings)> {
        self.saves.lock().clone()
    }
}

#[async_trait]
impl SettingsStorage for FakeStorage {
    async fn get(&self, guild_id: &str, kind: ModuleKind) -> Result<ModuleSettings> {
        self.read_starts.lock().push(Instant::now());

        let delay = {
            let by_kind = self.kind_delays.lock().get(&kind).copied();
            let by_guild = self.guild_delays.lock().get(guild_id).copied();
            by_kind.or(by_guild).unwrap_or_default()
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(reason) = self.failing.lock().get(&kind).cloned() {
            return Err(DashboardError::SettingsLoad {
                module: kind.display_name().to_string(),
                message: reason,
            });
        }

        Ok(self
            .records
            .lock()
            .get(&(guild_id.to_string(), kind))
            .cloned()
            .unwrap_or_else(|| ModuleSettings::default_for(kind)))
    }

    async fn save(&self, guild_id: &str, settings: &ModuleSettings) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(DashboardError::SettingsSave {
                module: settings.kind().display_name().to_string(),
                message: "database unavailable".to_string(),
            });
        }
        self.saves
            .lock()
            .push((guild_id.to_string(), settings.clone()));
        self.records
            .lock()
            .insert((guild_id.to_string(), settings.kind()), settings.clone());
        Ok(())
    }
}

/// Process-local durable store
#[derive(Default)]
pub struct MemoryStore {
    entries: parking_lot::RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}
