//! JSON API over the per-operator dashboards

use axum::{
    extract::{Path, Query, State},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::auth::{
    create_logout_cookie, create_session_cookie, get_session_token, OperatorSession,
    SessionEvent, SharedSessionStore,
};
use crate::dashboard::{Dashboard, DashboardOptions, DashboardView, ModuleView};
use crate::error::{DashboardError, Result};
use crate::logging::{LogEntry, SharedLogBuffer};
use crate::models::Guild;
use crate::modules::ModuleKind;
use crate::router::Route;
use crate::services::{SharedPlatform, SharedStorage};
use crate::state::SharedDurableStore;

const DEFAULT_LOG_COUNT: usize = 200;

#[derive(Clone)]
pub struct AppState {
    pub sessions: SharedSessionStore,
    /// One dashboard per session token
    pub dashboards: Arc<DashMap<String, Arc<Dashboard>>>,
    /// Held while a session's dashboard is being mounted
    mounting: Arc<DashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    pub platform: SharedPlatform,
    pub storage: SharedStorage,
    pub durable: SharedDurableStore,
    pub options: DashboardOptions,
    pub log_buffer: SharedLogBuffer,
}

impl AppState {
    pub fn new(
        sessions: SharedSessionStore,
        platform: SharedPlatform,
        storage: SharedStorage,
        durable: SharedDurableStore,
        options: DashboardOptions,
        log_buffer: SharedLogBuffer,
    ) -> Self {
        Self {
            sessions,
            dashboards: Arc::new(DashMap::new()),
            mounting: Arc::new(DashMap::new()),
            platform,
            storage,
            durable,
            options,
            log_buffer,
        }
    }
}

pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route(
            "/api/session",
            get(current_session).post(sign_in).delete(sign_out),
        )
        .route("/api/guilds", get(list_guilds))
        .route(
            "/api/selection",
            get(get_selection).put(select_guild).delete(clear_selection),
        )
        .route("/api/dashboard", get(dashboard_view))
        .route("/api/dashboard/refresh", post(refresh))
        .route("/api/route", get(resolve_route).put(navigate))
        .route(
            "/api/modules/:module",
            get(module_view).put(save_module).patch(update_draft),
        )
        .route("/api/logs", get(recent_logs))
        .with_state(state)
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

pub fn status_for(err: &DashboardError) -> StatusCode {
    match err {
        DashboardError::NotSignedIn | DashboardError::SessionExpired => StatusCode::UNAUTHORIZED,
        DashboardError::Discord {
            status: Some(401), ..
        } => StatusCode::UNAUTHORIZED,
        DashboardError::Discord {
            status: Some(403), ..
        } => StatusCode::FORBIDDEN,
        DashboardError::Discord { .. } => StatusCode::BAD_GATEWAY,
        DashboardError::GuildNotAdministrable { .. } => StatusCode::FORBIDDEN,
        DashboardError::NoGuildSelected | DashboardError::StillLoading { .. } => {
            StatusCode::CONFLICT
        }
        DashboardError::UnknownModule { .. } => StatusCode::NOT_FOUND,
        DashboardError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        DashboardError::SettingsLoad { .. } | DashboardError::SettingsSave { .. } => {
            StatusCode::BAD_GATEWAY
        }
        DashboardError::StateSave { .. }
        | DashboardError::StateLoad { .. }
        | DashboardError::StateParse { .. }
        | DashboardError::Config { .. }
        | DashboardError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            debug!("Request rejected ({}): {}", status, self);
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Session for the request's cookie
async fn require_session(headers: &HeaderMap, state: &AppState) -> Result<(String, OperatorSession)> {
    let token = get_session_token(headers).ok_or(DashboardError::NotSignedIn)?;
    let session = state.sessions.get_session(&token).await?;
    Ok((token, session))
}

/// Dashboard for the request's session, mounted on first use.
/// Concurrent first requests share a single mount.
async fn require_dashboard(headers: &HeaderMap, state: &AppState) -> Result<Arc<Dashboard>> {
    let (token, session) = require_session(headers, state).await?;
    if let Some(dashboard) = state.dashboards.get(&token) {
        return Ok(dashboard.clone());
    }

    let guard = state.mounting.entry(token.clone()).or_default().clone();
    let _mounting = guard.lock().await;
    if let Some(dashboard) = state.dashboards.get(&token) {
        return Ok(dashboard.clone());
    }

    let result = open_dashboard(state, &token, &session, None).await;
    state.mounting.remove(&token);
    result
}

async fn open_dashboard(
    state: &AppState,
    token: &str,
    session: &OperatorSession,
    fragment: Option<&str>,
) -> Result<Arc<Dashboard>> {
    let dashboard = Arc::new(Dashboard::new(
        session.user.clone(),
        &session.access_token,
        state.platform.clone(),
        state.storage.clone(),
        state.durable.clone(),
        state.options,
    ));
    dashboard.mount(fragment).await?;

    Ok(state
        .dashboards
        .entry(token.to_string())
        .or_insert(dashboard)
        .clone())
}

/// React to session changes: a dashboard lives only as long as its session
pub async fn handle_session_event(state: &AppState, event: SessionEvent) {
    match event {
        SessionEvent::SignedIn { user_id, .. } => {
            debug!("Session opened for {}", user_id);
        }
        SessionEvent::SignedOut { token, user_id } => {
            if let Some((_, dashboard)) = state.dashboards.remove(&token) {
                dashboard.discard().await;
            }
            info!("Dashboard for {} discarded after sign-out", user_id);
        }
        SessionEvent::Expired { token, user_id } => {
            // Keep the stored selection for the next sign-in
            if state.dashboards.remove(&token).is_some() {
                info!("Dashboard for {} dropped, session expired", user_id);
            }
        }
    }
}

/// GET / - Health check
async fn health() -> &'static str {
    "Guild dashboard running"
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest {
    access_token: String,
    #[serde(default)]
    fragment: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    session: OperatorSession,
    dashboard: DashboardView,
}

/// POST /api/session - Sign in with a Discord access token
async fn sign_in(
    State(state): State<AppState>,
    Json(request): Json<SignInRequest>,
) -> Result<Response> {
    let (token, session) = state.sessions.sign_in(&request.access_token).await?;
    let dashboard =
        open_dashboard(&state, &token, &session, request.fragment.as_deref()).await?;
    let body = SignInResponse {
        session,
        dashboard: dashboard.view()?,
    };

    Ok(([(SET_COOKIE, create_session_cookie(&token))], Json(body)).into_response())
}

/// GET /api/session
async fn current_session(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<OperatorSession>> {
    let (_, session) = require_session(&headers, &state).await?;
    Ok(Json(session))
}

/// DELETE /api/session - Sign out
async fn sign_out(headers: HeaderMap, State(state): State<AppState>) -> impl IntoResponse {
    if let Some(token) = get_session_token(&headers) {
        state.sessions.sign_out(&token).await;
    }
    ([(SET_COOKIE, create_logout_cookie())], StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct GuildsQuery {
    #[serde(default)]
    refresh: bool,
}

/// GET /api/guilds - Guilds the operator may administer
async fn list_guilds(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<GuildsQuery>,
) -> Result<Json<Vec<Guild>>> {
    let dashboard = require_dashboard(&headers, &state).await?;
    let guilds = if query.refresh {
        dashboard.load_guilds().await?
    } else {
        dashboard.guilds()
    };
    Ok(Json(guilds))
}

#[derive(Serialize)]
struct SelectionBody {
    guild: Option<Guild>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectRequest {
    guild_id: String,
}

/// GET /api/selection
async fn get_selection(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<SelectionBody>> {
    let dashboard = require_dashboard(&headers, &state).await?;
    Ok(Json(SelectionBody {
        guild: dashboard.selected_guild(),
    }))
}

/// PUT /api/selection - Select a guild and load its configuration
async fn select_guild(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(request): Json<SelectRequest>,
) -> Result<Json<DashboardView>> {
    let dashboard = require_dashboard(&headers, &state).await?;
    dashboard.select_guild(&request.guild_id).await?;
    Ok(Json(dashboard.view()?))
}

/// DELETE /api/selection
async fn clear_selection(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<DashboardView>> {
    let dashboard = require_dashboard(&headers, &state).await?;
    dashboard.clear_selection().await;
    Ok(Json(dashboard.view()?))
}

/// GET /api/dashboard - Overview for the selected guild
async fn dashboard_view(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<DashboardView>> {
    let dashboard = require_dashboard(&headers, &state).await?;
    Ok(Json(dashboard.view()?))
}

/// POST /api/dashboard/refresh - Fetch every module again
async fn refresh(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<DashboardView>> {
    let dashboard = require_dashboard(&headers, &state).await?;
    dashboard.refresh().await?;
    Ok(Json(dashboard.view()?))
}

#[derive(Deserialize)]
struct RouteQuery {
    fragment: Option<String>,
}

#[derive(Deserialize)]
struct NavigateRequest {
    fragment: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RouteBody {
    route: Route,
    fragment: String,
    module: Option<ModuleKind>,
}

impl From<Route> for RouteBody {
    fn from(route: Route) -> Self {
        Self {
            route,
            fragment: route.fragment(),
            module: route.module(),
        }
    }
}

/// GET /api/route - Current route, or how `?fragment=` would resolve
async fn resolve_route(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<RouteQuery>,
) -> Result<Json<RouteBody>> {
    let route = match query.fragment {
        Some(fragment) => Route::from_fragment(&fragment),
        None => require_dashboard(&headers, &state).await?.route(),
    };
    Ok(Json(route.into()))
}

/// PUT /api/route - Follow a fragment change
async fn navigate(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(request): Json<NavigateRequest>,
) -> Result<Json<RouteBody>> {
    let dashboard = require_dashboard(&headers, &state).await?;
    Ok(Json(dashboard.navigate(&request.fragment).into()))
}

fn parse_module(name: &str) -> Result<ModuleKind> {
    ModuleKind::from_token(name).ok_or_else(|| DashboardError::UnknownModule {
        name: name.to_string(),
    })
}

/// GET /api/modules/:module - Editor view
async fn module_view(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(module): Path<String>,
) -> Result<Json<ModuleView>> {
    let kind = parse_module(&module)?;
    let dashboard = require_dashboard(&headers, &state).await?;
    Ok(Json(dashboard.module_view(kind).await?))
}

/// PUT /api/modules/:module - Save a module
async fn save_module(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(module): Path<String>,
    Json(settings): Json<serde_json::Value>,
) -> Result<Json<ModuleView>> {
    let kind = parse_module(&module)?;
    let dashboard = require_dashboard(&headers, &state).await?;
    let view = dashboard.save_module(kind, settings).await?;
    if view.feedback.as_ref().is_some_and(|f| !f.success) {
        warn!("Save of {} for guild {} failed", kind, view.guild_id);
    }
    Ok(Json(view))
}

/// PATCH /api/modules/:module - Update the draft only
async fn update_draft(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(module): Path<String>,
    Json(settings): Json<serde_json::Value>,
) -> Result<Json<ModuleView>> {
    let kind = parse_module(&module)?;
    let dashboard = require_dashboard(&headers, &state).await?;
    Ok(Json(dashboard.update_draft(kind, settings).await?))
}

#[derive(Deserialize)]
struct LogsQuery {
    count: Option<usize>,
    level: Option<String>,
}

/// GET /api/logs - Recent log entries
async fn recent_logs(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<LogEntry>>> {
    require_session(&headers, &state).await?;

    let level = match query.level.as_deref() {
        Some(level) => level
            .parse()
            .map_err(|_| DashboardError::validation(format!("Unknown log level '{}'", level)))?,
        None => tracing::Level::INFO,
    };
    let count = query.count.unwrap_or(DEFAULT_LOG_COUNT);
    Ok(Json(state.log_buffer.recent(count, level)))
}
