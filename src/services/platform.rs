//! Chat-platform API: the operator's identity and guilds (user token) and a
//! guild's channels (bot token).

use async_trait::async_trait;
use serenity::model::channel::ChannelType;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::{DashboardError, Result};
use crate::models::{Channel, ChannelKind, OperatorUser, RawGuild};

pub const DISCORD_API_URL: &str = "https://discord.com/api/v10";

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Resolve the operator behind an access token
    async fn current_user(&self, access_token: &str) -> Result<OperatorUser>;

    /// Every guild the operator is a member of, unfiltered
    async fn list_guilds(&self, access_token: &str) -> Result<Vec<RawGuild>>;

    /// Text channels and categories of a guild
    async fn list_channels(&self, guild_id: &str) -> Result<Vec<Channel>>;
}

pub type SharedPlatform = Arc<dyn ChatPlatform>;

/// Discord implementation
#[derive(Clone)]
pub struct DiscordPlatform {
    pub api_url: String,
    pub http_client: reqwest::Client,
    pub bot_http: Arc<serenity::http::Http>,
}

impl DiscordPlatform {
    pub fn new(api_url: &str, bot_token: &str) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
            bot_http: Arc::new(serenity::http::Http::new(bot_token)),
        }
    }

    async fn get_as_user<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        access_token: &str,
    ) -> Result<T> {
        let url = format!("{}{}", self.api_url, path);
        let response = self
            .http_client
            .get(&url)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Discord API error on {}: {} {}", path, status, body);
            return Err(DashboardError::Discord {
                status: Some(status.as_u16()),
                message: format!("{} {}", status, discord_error_message(&body)),
            });
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl ChatPlatform for DiscordPlatform {
    async fn current_user(&self, access_token: &str) -> Result<OperatorUser> {
        self.get_as_user("/users/@me", access_token).await
    }

    async fn list_guilds(&self, access_token: &str) -> Result<Vec<RawGuild>> {
        let guilds: Vec<RawGuild> = self.get_as_user("/users/@me/guilds", access_token).await?;
        debug!("Discord returned {} guilds", guilds.len());
        Ok(guilds)
    }

    async fn list_channels(&self, guild_id: &str) -> Result<Vec<Channel>> {
        let id = parse_guild_id(guild_id)?;
        let channels = self.bot_http.get_channels(id).await?;

        let mut channels: Vec<Channel> = channels
            .into_iter()
            .filter_map(|c| {
                let kind = match c.kind {
                    ChannelType::Text => ChannelKind::Text,
                    ChannelType::Category => ChannelKind::Category,
                    _ => return None,
                };
                Some(Channel {
                    id: c.id.to_string(),
                    name: c.name,
                    kind,
                    parent_id: c.parent_id.map(|p| p.to_string()),
                    position: c.position,
                })
            })
            .collect();
        channels.sort_by_key(|c| c.position);

        debug!("Guild {} has {} usable channels", guild_id, channels.len());
        Ok(channels)
    }
}

fn parse_guild_id(guild_id: &str) -> Result<GuildId> {
    match guild_id.parse::<u64>() {
        Ok(id) if id != 0 => Ok(GuildId::new(id)),
        _ => Err(DashboardError::GuildNotAdministrable {
            id: guild_id.to_string(),
        }),
    }
}

/// Discord error bodies look like `{"message": "...", "code": 0}`
fn discord_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| body.trim().to_string())
}
