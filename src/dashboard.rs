//! One operator's dashboard: their guild list, the active selection, the
//! fetched configuration, navigation and the module editors.

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::editor::{ModuleEditor, SaveFeedback, DEFAULT_FEEDBACK_DELAY};
use crate::error::{DashboardError, Result};
use crate::models::{Guild, OperatorUser};
use crate::modules::{ChannelPicker, ModuleKind, ModuleSettings};
use crate::orchestrator::{ActiveGuild, GuildConfigOrchestrator, GuildSnapshot, RunResult};
use crate::permissions::filter_administrable;
use crate::router::{FragmentRouter, Route};
use crate::services::{SharedPlatform, SharedStorage};
use crate::state::{reconcile_selection, SelectionFallback, SelectionStore, SharedDurableStore};

#[derive(Debug, Clone, Copy)]
pub struct DashboardOptions {
    pub feedback_delay: Duration,
    pub fallback: SelectionFallback,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            feedback_delay: DEFAULT_FEEDBACK_DELAY,
            fallback: SelectionFallback::None,
        }
    }
}

/// Badge and navigation entry for one module
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleSummary {
    pub module: ModuleKind,
    pub name: &'static str,
    pub fragment: String,
    pub active: bool,
    pub badge: &'static str,
    /// Saved since the last fetch, so `active` may be out of date
    pub stale: bool,
    pub sub_pages: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub guild: Guild,
    pub prefix: String,
    pub modules: Vec<ModuleSummary>,
    pub warning: Option<String>,
    pub route: Route,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum DashboardView {
    NoSelection { guilds: Vec<Guild> },
    Loading { guild: Guild },
    Ready(Box<Overview>),
}

/// What a module editor renders
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleView {
    pub module: ModuleKind,
    pub name: &'static str,
    pub guild_id: String,
    pub settings: serde_json::Value,
    pub active: bool,
    pub dirty: bool,
    pub stale: bool,
    /// Why the read failed; the editor then holds defaults
    pub load_error: Option<String>,
    pub channel_pickers: Vec<ChannelPicker>,
    pub feedback: Option<SaveFeedback>,
}

type SharedEditor = Arc<tokio::sync::Mutex<ModuleEditor>>;

pub struct Dashboard {
    operator: OperatorUser,
    access_token: String,
    platform: SharedPlatform,
    storage: SharedStorage,
    selection: SelectionStore,
    orchestrator: GuildConfigOrchestrator,
    guilds: RwLock<Vec<Guild>>,
    router: Mutex<FragmentRouter>,
    editors: Mutex<HashMap<(String, ModuleKind), SharedEditor>>,
    stale: Mutex<BTreeSet<ModuleKind>>,
    options: DashboardOptions,
}

impl Dashboard {
    pub fn new(
        operator: OperatorUser,
        access_token: &str,
        platform: SharedPlatform,
        storage: SharedStorage,
        durable: SharedDurableStore,
        options: DashboardOptions,
    ) -> Self {
        let selection = SelectionStore::new(durable, &operator.id);
        let orchestrator =
            GuildConfigOrchestrator::new(platform.clone(), storage.clone(), Arc::new(ActiveGuild::new()));
        Self {
            operator,
            access_token: access_token.to_string(),
            platform,
            storage,
            selection,
            orchestrator,
            guilds: RwLock::new(Vec::new()),
            router: Mutex::new(FragmentRouter::default()),
            editors: Mutex::new(HashMap::new()),
            stale: Mutex::new(BTreeSet::new()),
            options,
        }
    }

    /// Fetch the operator's guilds and keep the administrable ones.
    /// A failure here blocks the whole dashboard.
    pub async fn load_guilds(&self) -> Result<Vec<Guild>> {
        let raw = self.platform.list_guilds(&self.access_token).await?;
        let guilds = filter_administrable(&raw);
        info!(
            "{} can administer {} of {} guilds",
            self.operator.display_name(),
            guilds.len(),
            raw.len()
        );
        *self.guilds.write() = guilds.clone();
        self.reconcile_active(&guilds).await;
        Ok(guilds)
    }

    /// Drop or replace the active selection once it left the list
    async fn reconcile_active(&self, guilds: &[Guild]) {
        let Some(current) = self.orchestrator.active().current() else {
            return;
        };
        if guilds.iter().any(|g| g.id == current) {
            return;
        }

        warn!(
            "Guild {} is no longer administrable by {}",
            current,
            self.operator.display_name()
        );
        match reconcile_selection(Some(&current), guilds, self.options.fallback) {
            Some(id) => {
                if let Err(e) = self.select_guild(&id).await {
                    warn!("Could not fall back to guild {}: {}", id, e);
                }
            }
            None => self.clear_selection().await,
        }
    }

    /// First load: guild list, restored selection, initial route
    pub async fn mount(&self, fragment: Option<&str>) -> Result<Option<RunResult>> {
        let guilds = self.load_guilds().await?;
        *self.router.lock() = FragmentRouter::new(fragment);

        let restored = self.selection.restore().await;
        let selected = reconcile_selection(restored.as_deref(), &guilds, self.options.fallback);

        match selected {
            Some(id) => {
                if restored.as_deref() != Some(id.as_str()) {
                    self.selection.persist(&id).await;
                }
                let token = self.orchestrator.active().select(&id);
                Ok(Some(self.orchestrator.run(token).await))
            }
            None => {
                if restored.is_some() {
                    self.selection.clear().await;
                }
                Ok(None)
            }
        }
    }

    pub fn guilds(&self) -> Vec<Guild> {
        self.guilds.read().clone()
    }

    pub fn selected_guild(&self) -> Option<Guild> {
        let id = self.orchestrator.active().current()?;
        self.guilds.read().iter().find(|g| g.id == id).cloned()
    }

    /// Switch guilds: persist, reset navigation and editors, fetch everything
    pub async fn select_guild(&self, guild_id: &str) -> Result<RunResult> {
        if !self.guilds.read().iter().any(|g| g.id == guild_id) {
            return Err(DashboardError::GuildNotAdministrable {
                id: guild_id.to_string(),
            });
        }

        info!("{} selected guild {}", self.operator.display_name(), guild_id);
        self.selection.persist(guild_id).await;
        let token = self.orchestrator.active().select(guild_id);
        self.reset_guild_state();

        Ok(self.orchestrator.run(token).await)
    }

    pub async fn clear_selection(&self) {
        self.orchestrator.active().clear();
        self.selection.clear().await;
        self.reset_guild_state();
    }

    fn reset_guild_state(&self) {
        self.router.lock().reset_for_guild_switch();
        self.editors.lock().clear();
        self.stale.lock().clear();
    }

    /// Re-run the full fetch for the current guild. Clean editors are
    /// rebuilt from the fresh reads; drafts with unsaved edits are kept.
    pub async fn refresh(&self) -> Result<RunResult> {
        let result = self
            .orchestrator
            .refresh()
            .await
            .ok_or(DashboardError::NoGuildSelected)?;

        if let RunResult::Applied(_) = &result {
            self.stale.lock().clear();
            let mut editors = self.editors.lock();
            editors.retain(|_, editor| match editor.try_lock() {
                Ok(editor) => editor.is_dirty(),
                Err(_) => true,
            });
        }
        Ok(result)
    }

    /// Mark the selection as gone for this operator, e.g. on sign-out
    pub async fn discard(&self) {
        debug!("Discarding dashboard for {}", self.operator.id);
        self.clear_selection().await;
    }

    pub fn route(&self) -> Route {
        self.router.lock().current()
    }

    pub fn navigate(&self, fragment: &str) -> Route {
        self.router.lock().navigate(fragment)
    }

    fn current_snapshot(&self) -> Result<Arc<GuildSnapshot>> {
        let guild_id = self
            .orchestrator
            .active()
            .current()
            .ok_or(DashboardError::NoGuildSelected)?;
        if !self.guilds.read().iter().any(|g| g.id == guild_id) {
            return Err(DashboardError::NoGuildSelected);
        }
        self.orchestrator
            .snapshot()
            .ok_or(DashboardError::StillLoading { id: guild_id })
    }

    pub fn view(&self) -> Result<DashboardView> {
        let Some(guild) = self.selected_guild() else {
            return Ok(DashboardView::NoSelection {
                guilds: self.guilds(),
            });
        };
        if self.orchestrator.is_loading() {
            return Ok(DashboardView::Loading { guild });
        }
        Ok(DashboardView::Ready(Box::new(self.overview()?)))
    }

    pub fn overview(&self) -> Result<Overview> {
        let snapshot = self.current_snapshot()?;
        let guild = self
            .selected_guild()
            .ok_or(DashboardError::NoGuildSelected)?;

        Ok(Overview {
            guild,
            prefix: snapshot.prefix().to_string(),
            modules: self.navigation(&snapshot),
            warning: snapshot.status.warning_text.clone(),
            route: self.route(),
        })
    }

    fn navigation(&self, snapshot: &GuildSnapshot) -> Vec<ModuleSummary> {
        let stale = self.stale.lock();
        ModuleKind::ALL
            .iter()
            .map(|&kind| {
                let active = snapshot.status.is_active(kind);
                ModuleSummary {
                    module: kind,
                    name: kind.display_name(),
                    fragment: Route::Module(kind).fragment(),
                    active,
                    badge: if active { "Active" } else { "Inactive" },
                    stale: stale.contains(&kind),
                    sub_pages: Route::sub_pages(kind).iter().map(Route::fragment).collect(),
                }
            })
            .collect()
    }

    /// Editors are keyed by guild so a snapshot from before a switch
    /// can never hand its editor to the new guild
    fn editor(&self, kind: ModuleKind, snapshot: &GuildSnapshot) -> SharedEditor {
        self.editors
            .lock()
            .entry((snapshot.guild_id.clone(), kind))
            .or_insert_with(|| {
                Arc::new(tokio::sync::Mutex::new(ModuleEditor::new(
                    &snapshot.guild_id,
                    snapshot.settings(kind),
                    self.options.feedback_delay,
                )))
            })
            .clone()
    }

    pub async fn module_view(&self, kind: ModuleKind) -> Result<ModuleView> {
        let snapshot = self.current_snapshot()?;
        let editor = self.editor(kind, &snapshot);
        let mut editor = editor.lock().await;
        Ok(self.render_module(&snapshot, &mut editor))
    }

    fn render_module(&self, snapshot: &GuildSnapshot, editor: &mut ModuleEditor) -> ModuleView {
        let kind = editor.kind();
        let channel_pickers = kind
            .channel_fields()
            .iter()
            .map(|(field, accepts)| ChannelPicker::build(field, *accepts, &snapshot.channels))
            .collect();

        ModuleView {
            module: kind,
            name: kind.display_name(),
            guild_id: editor.guild_id().to_string(),
            settings: editor.draft().to_value(),
            active: snapshot.status.is_active(kind),
            dirty: editor.is_dirty(),
            stale: self.stale.lock().contains(&kind),
            load_error: snapshot.failures.get(&kind).cloned(),
            channel_pickers,
            feedback: editor.feedback().cloned(),
        }
    }

    /// Replace a module's draft without writing it
    pub async fn update_draft(&self, kind: ModuleKind, value: serde_json::Value) -> Result<ModuleView> {
        let snapshot = self.current_snapshot()?;
        let draft = ModuleSettings::from_value(kind, value)?;
        let editor = self.editor(kind, &snapshot);
        let mut editor = editor.lock().await;
        editor.replace_draft(draft)?;
        Ok(self.render_module(&snapshot, &mut editor))
    }

    /// Replace a module's draft and save it. A failed save is reported in
    /// the view's feedback, not as an error.
    pub async fn save_module(&self, kind: ModuleKind, value: serde_json::Value) -> Result<ModuleView> {
        let snapshot = self.current_snapshot()?;
        let draft = ModuleSettings::from_value(kind, value)?;
        let editor = self.editor(kind, &snapshot);
        let mut editor = editor.lock().await;
        editor.replace_draft(draft)?;

        let saved = editor.save(self.storage.as_ref()).await.success;
        if saved {
            if self.orchestrator.active().current().as_deref() == Some(editor.guild_id()) {
                self.stale.lock().insert(kind);
            } else {
                warn!(
                    "Saved {} for guild {} after the selection moved on",
                    kind,
                    editor.guild_id()
                );
            }
        }
        Ok(self.render_module(&snapshot, &mut editor))
    }
}
