use futures::future::join_all;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::outcome::settle;
use super::selection::{ActiveGuild, SelectionToken};
use super::status::GuildSnapshot;
use crate::modules::ModuleKind;
use crate::services::{SharedPlatform, SharedStorage};

/// Why a finished run was not applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// The operator selected another guild (or cleared the selection) meanwhile
    SelectionChanged,
    /// A later run for the same selection already landed
    Superseded,
}

#[derive(Debug, Clone)]
pub enum RunResult {
    Applied(Arc<GuildSnapshot>),
    Discarded(DiscardReason),
}

struct AppliedRun {
    token: SelectionToken,
    run_id: u64,
    snapshot: Arc<GuildSnapshot>,
}

/// Fans out every module read for the selected guild and keeps the snapshot
/// of the last run that was still current when it settled.
pub struct GuildConfigOrchestrator {
    platform: SharedPlatform,
    storage: SharedStorage,
    active: Arc<ActiveGuild>,
    next_run: AtomicU64,
    applied: RwLock<Option<AppliedRun>>,
}

impl GuildConfigOrchestrator {
    pub fn new(platform: SharedPlatform, storage: SharedStorage, active: Arc<ActiveGuild>) -> Self {
        Self {
            platform,
            storage,
            active,
            next_run: AtomicU64::new(0),
            applied: RwLock::new(None),
        }
    }

    pub fn active(&self) -> &Arc<ActiveGuild> {
        &self.active
    }

    /// Run one full fetch cycle for `token` and apply it if still current
    pub async fn run(&self, token: SelectionToken) -> RunResult {
        let run_id = self.next_run.fetch_add(1, Ordering::SeqCst) + 1;
        let started = Instant::now();
        info!("Fetch run {} started for guild {}", run_id, token.guild_id());

        let snapshot = self.fetch_all(token.guild_id()).await;

        debug!(
            "Fetch run {} settled in {:?} ({} module failures)",
            run_id,
            started.elapsed(),
            snapshot.status.failed_modules.len()
        );

        self.apply(token, run_id, snapshot)
    }

    /// Re-run the cycle for whatever is selected now
    pub async fn refresh(&self) -> Option<RunResult> {
        let token = self.active.token()?;
        Some(self.run(token).await)
    }

    /// Issue every read at once and wait for all of them to settle.
    /// Each read is converted to an outcome at its own boundary, so a failing
    /// module never aborts its siblings.
    pub async fn fetch_all(&self, guild_id: &str) -> GuildSnapshot {
        let channel_read = settle(self.platform.list_channels(guild_id));

        let module_reads = ModuleKind::ALL.iter().map(|&kind| {
            let storage = self.storage.clone();
            async move { (kind, settle(storage.get(guild_id, kind)).await) }
        });

        let (channels, modules) = futures::join!(channel_read, join_all(module_reads));

        GuildSnapshot::from_outcomes(guild_id, channels, modules)
    }

    fn apply(&self, token: SelectionToken, run_id: u64, snapshot: GuildSnapshot) -> RunResult {
        if !self.active.is_current(&token) {
            info!(
                "Discarding fetch run {} for guild {}: selection changed",
                run_id,
                token.guild_id()
            );
            return RunResult::Discarded(DiscardReason::SelectionChanged);
        }

        let mut applied = self.applied.write();
        if let Some(existing) = applied.as_ref() {
            if existing.token == token && existing.run_id > run_id {
                info!(
                    "Discarding fetch run {}: run {} already applied",
                    run_id, existing.run_id
                );
                return RunResult::Discarded(DiscardReason::Superseded);
            }
        }

        let snapshot = Arc::new(snapshot);
        *applied = Some(AppliedRun {
            token,
            run_id,
            snapshot: snapshot.clone(),
        });
        RunResult::Applied(snapshot)
    }

    /// The snapshot to render, if it belongs to the current selection
    pub fn snapshot(&self) -> Option<Arc<GuildSnapshot>> {
        let applied = self.applied.read();
        applied
            .as_ref()
            .filter(|run| self.active.is_current(&run.token))
            .map(|run| run.snapshot.clone())
    }

    pub fn is_loading(&self) -> bool {
        self.active.token().is_some() && self.snapshot().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakePlatform, FakeStorage};
    use std::time::Duration;

    fn orchestrator(
        platform: Arc<FakePlatform>,
        storage: Arc<FakeStorage>,
    ) -> Arc<GuildConfigOrchestrator> {
        Arc::new(GuildConfigOrchestrator::new(
            platform,
            storage,
            Arc::new(ActiveGuild::new()),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_start_concurrently_and_settle_together() {
        let platform = Arc::new(FakePlatform::new());
        platform.set_channel_delay(Duration::from_secs(3));
        let storage = Arc::new(FakeStorage::new());
        storage.set_kind_delay(ModuleKind::Logging, Duration::from_secs(10));
        storage.set_kind_delay(ModuleKind::Commands, Duration::from_millis(1));

        let orch = orchestrator(platform.clone(), storage.clone());
        let token = orch.active().select("g1");

        let begin = tokio::time::Instant::now();
        let result = orch.run(token).await;
        assert!(matches!(result, RunResult::Applied(_)));

        // All twelve reads overlapped, so the run took as long as the slowest
        let elapsed = begin.elapsed();
        assert!(elapsed >= Duration::from_secs(10) && elapsed < Duration::from_secs(11));
        assert_eq!(storage.read_count(), ModuleKind::ALL.len());
        assert_eq!(platform.channel_reads(), 1);
        assert!(storage.read_starts().iter().all(|t| *t == begin));
    }

    #[tokio::test(start_paused = true)]
    async fn test_aggregate_not_available_before_slowest_read() {
        let platform = Arc::new(FakePlatform::new());
        let storage = Arc::new(FakeStorage::new());
        storage.set_kind_delay(ModuleKind::WelcomeMessages, Duration::from_secs(30));

        let orch = orchestrator(platform, storage);
        let token = orch.active().select("g1");

        let background = {
            let orch = orch.clone();
            tokio::spawn(async move { orch.run(token).await })
        };

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(orch.snapshot().is_none());
        assert!(orch.is_loading());

        let result = background.await.unwrap();
        assert!(matches!(result, RunResult::Applied(_)));
        assert!(orch.snapshot().is_some());
    }

    #[tokio::test]
    async fn test_one_failure_does_not_block_siblings() {
        let platform = Arc::new(FakePlatform::new());
        let storage = Arc::new(FakeStorage::new());
        storage.configure_all("g1");
        storage.fail_kind(ModuleKind::Logging, "service unavailable");

        let orch = orchestrator(platform, storage);
        let token = orch.active().select("g1");

        let RunResult::Applied(snapshot) = orch.run(token).await else {
            panic!("run should apply");
        };
        assert_eq!(snapshot.status.failed_modules, vec!["Logging".to_string()]);
        assert!(snapshot.status.is_active(ModuleKind::Tickets));
        assert!(!snapshot.status.is_active(ModuleKind::Logging));
        assert_eq!(
            snapshot.failures.get(&ModuleKind::Logging).map(String::as_str),
            Some("Failed to load Logging settings: service unavailable")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_result_for_previous_guild_is_discarded() {
        let platform = Arc::new(FakePlatform::new());
        let storage = Arc::new(FakeStorage::new());
        storage.configure_all("b");
        storage.set_guild_delay("a", Duration::from_secs(10));

        let orch = orchestrator(platform, storage);

        let token_a = orch.active().select("a");
        let slow = {
            let orch = orch.clone();
            tokio::spawn(async move { orch.run(token_a).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;

        let token_b = orch.active().select("b");
        assert!(matches!(orch.run(token_b).await, RunResult::Applied(_)));
        assert_eq!(orch.snapshot().unwrap().guild_id, "b");

        let late = slow.await.unwrap();
        assert!(matches!(
            late,
            RunResult::Discarded(DiscardReason::SelectionChanged)
        ));
        let shown = orch.snapshot().unwrap();
        assert_eq!(shown.guild_id, "b");
        assert!(shown.status.is_active(ModuleKind::Tickets));
    }

    #[tokio::test(start_paused = true)]
    async fn test_older_refresh_cannot_overwrite_newer_one() {
        let platform = Arc::new(FakePlatform::new());
        let storage = Arc::new(FakeStorage::new());
        storage.set_guild_delay("g1", Duration::from_secs(10));

        let orch = orchestrator(platform, storage.clone());
        let token = orch.active().select("g1");

        let first = {
            let orch = orch.clone();
            let token = token.clone();
            tokio::spawn(async move { orch.run(token).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;

        // Second run is fast and finishes first
        storage.set_guild_delay("g1", Duration::ZERO);
        storage.configure_all("g1");
        assert!(matches!(orch.run(token).await, RunResult::Applied(_)));

        let late = first.await.unwrap();
        assert!(matches!(late, RunResult::Discarded(DiscardReason::Superseded)));
        assert!(orch.snapshot().unwrap().status.is_active(ModuleKind::Tickets));
    }

    #[tokio::test]
    async fn test_refresh_rebuilds_from_scratch() {
        let platform = Arc::new(FakePlatform::new());
        let storage = Arc::new(FakeStorage::new());
        storage.configure_all("g1");

        let orch = orchestrator(platform, storage.clone());
        orch.active().select("g1");
        orch.refresh().await.unwrap();
        assert!(orch.snapshot().unwrap().status.is_active(ModuleKind::Chatbot));

        storage.fail_kind(ModuleKind::Chatbot, "timeout");
        orch.refresh().await.unwrap();
        let snapshot = orch.snapshot().unwrap();
        assert!(!snapshot.status.is_active(ModuleKind::Chatbot));
        assert_eq!(snapshot.status.failed_modules, vec!["Chatbot".to_string()]);
    }

    #[tokio::test]
    async fn test_refresh_without_selection() {
        let orch = orchestrator(Arc::new(FakePlatform::new()), Arc::new(FakeStorage::new()));
        assert!(orch.refresh().await.is_none());
        assert!(!orch.is_loading());
    }
}
