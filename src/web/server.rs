//! Web server start-up

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use super::api::{api_router, handle_session_event, AppState};

const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(600);

/// Web server configuration
pub struct WebServerConfig {
    /// HTTPS port, used when TLS files are present
    pub https_port: u16,
    /// Plain HTTP port otherwise
    pub http_port: u16,
    /// Path to certificate PEM file (cert + CA bundle)
    pub cert_path: PathBuf,
    /// Path to private key PEM file
    pub key_path: PathBuf,
    /// Allowed browser origin; any origin when unset
    pub allowed_origin: Option<String>,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            https_port: 443,
            http_port: 8080,
            cert_path: PathBuf::from("certs/cert.pem"),
            key_path: PathBuf::from("certs/key.pem"),
            allowed_origin: None,
        }
    }
}

impl WebServerConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self {
            https_port: std::env::var("HTTPS_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(443),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8080),
            cert_path: std::env::var("TLS_CERT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("certs/cert.pem")),
            key_path: std::env::var("TLS_KEY_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("certs/key.pem")),
            allowed_origin: None,
        }
    }

    fn tls_available(&self) -> bool {
        self.cert_path.exists() && self.key_path.exists()
    }
}

fn cors_layer(allowed_origin: Option<&str>) -> anyhow::Result<CorsLayer> {
    let Some(origin) = allowed_origin else {
        return Ok(CorsLayer::permissive());
    };

    let origin: HeaderValue = origin
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid ALLOWED_ORIGIN '{}': {}", origin, e))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true))
}

/// Drop dashboards whose session ended
fn spawn_session_listener(state: AppState) -> JoinHandle<()> {
    let mut events = state.sessions.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => handle_session_event(&state, event).await,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Session listener lagged, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn spawn_session_cleanup(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            let expired = state.sessions.cleanup_expired().await;
            if expired > 0 {
                debug!("Cleaned up {} expired sessions", expired);
            }
        }
    })
}

/// Serve the dashboard API until the server stops
pub async fn start_web_server(config: WebServerConfig, state: AppState) -> anyhow::Result<()> {
    spawn_session_listener(state.clone());
    spawn_session_cleanup(state.clone());

    let app: Router = api_router(state).layer(cors_layer(config.allowed_origin.as_deref())?);

    if config.tls_available() {
        info!("Loading TLS certificates:");
        info!("  Certificate: {}", config.cert_path.display());
        info!("  Private key: {}", config.key_path.display());

        let tls_config = RustlsConfig::from_pem_file(&config.cert_path, &config.key_path)
            .await
            .map_err(|e| anyhow::anyhow!(
                "Failed to load TLS certificates: {}\n  Certificate: {}\n  Private key: {}\n\nHint: The private key must be in PKCS#8 PEM format.",
                e, config.cert_path.display(), config.key_path.display()
            ))?;

        let https_addr = SocketAddr::from(([0, 0, 0, 0], config.https_port));
        info!("Dashboard API listening on https://0.0.0.0:{}", config.https_port);

        axum_server::bind_rustls(https_addr, tls_config)
            .serve(app.into_make_service())
            .await?;
    } else {
        warn!(
            "TLS certificates not found at {}, serving plain HTTP",
            config.cert_path.display()
        );
        let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Dashboard API listening on http://{}", listener.local_addr()?);

        axum::serve(listener, app).await?;
    }

    Ok(())
}
