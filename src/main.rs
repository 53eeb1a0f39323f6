use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Per-guild configuration dashboard for the bot
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the per-guild settings files (overrides DATA_PATH)
    #[arg(long)]
    data_path: Option<PathBuf>,

    /// File for durable dashboard state (overrides STATE_PATH)
    #[arg(long)]
    state_path: Option<PathBuf>,

    /// Plain HTTP port when no TLS certificates are found (overrides HTTP_PORT)
    #[arg(long, short = 'p')]
    http_port: Option<u16>,

    /// What to select when the remembered guild is gone: none or first
    #[arg(long)]
    selection_fallback: Option<state::SelectionFallback>,
}

mod config;
mod dashboard;
mod editor;
mod error;
mod logging;
mod models;
mod modules;
mod orchestrator;
mod permissions;
mod router;
mod services;
mod state;
#[cfg(test)]
mod test_support;
mod web;

use config::DashboardConfig;
use services::{DiscordPlatform, JsonSettingsStorage};
use state::JsonFileStore;

/// Log the bot's application id, encoded in the first token segment
fn log_bot_id(token: &str) {
    use base64::Engine;

    let Some(bot_id_b64) = token.split('.').next() else {
        return;
    };
    let decoded = base64::engine::general_purpose::STANDARD_NO_PAD
        .decode(bot_id_b64)
        .or_else(|_| base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(bot_id_b64));

    if let Some(id_str) = decoded.ok().and_then(|d| String::from_utf8(d).ok()) {
        info!("Bot ID: {}", id_str);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    // Recent entries for GET /api/logs
    let log_buffer = logging::create_log_buffer(1000);

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true),
        )
        .with(logging::LogCaptureLayer::new(log_buffer.clone()))
        .init();

    let mut config = DashboardConfig::from_env()?;
    if let Some(path) = args.data_path {
        config.data_path = path;
    }
    if let Some(path) = args.state_path {
        config.state_path = path;
    }
    if let Some(fallback) = args.selection_fallback {
        config.selection_fallback = fallback;
    }

    log_bot_id(&config.discord_token);

    let platform = Arc::new(DiscordPlatform::new(&config.api_url, &config.discord_token));

    info!("Settings stored under {}", config.data_path.display());
    let storage = Arc::new(JsonSettingsStorage::new(&config.data_path));

    if let Some(parent) = config.state_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }
    info!("Loading dashboard state from {}...", config.state_path.display());
    let durable = Arc::new(JsonFileStore::open(&config.state_path.to_string_lossy()).await?);

    let sessions = web::create_session_store(platform.clone());
    let state = web::AppState::new(
        sessions,
        platform,
        storage,
        durable,
        config.dashboard_options(),
        log_buffer,
    );

    let mut web_config = web::WebServerConfig::from_env();
    web_config.allowed_origin = config.allowed_origin.clone();
    if let Some(port) = args.http_port {
        web_config.http_port = port;
    }

    tokio::select! {
        result = web::start_web_server(web_config, state) => {
            if let Err(e) = &result {
                error!("Web server error: {}", e);
            }
            result
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    }
}
