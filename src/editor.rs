//! Per-module draft editing with an explicit save.

use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::error::{DashboardError, Result};
use crate::modules::{ModuleKind, ModuleSettings};
use crate::services::SettingsStorage;

pub const DEFAULT_FEEDBACK_DELAY: Duration = Duration::from_secs(5);

/// Transient result of the last save, scoped to one editor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveFeedback {
    pub success: bool,
    pub message: String,
    #[serde(skip)]
    pub expires_at: Instant,
}

impl SaveFeedback {
    fn new(success: bool, message: String, delay: Duration) -> Self {
        Self {
            success,
            message,
            expires_at: Instant::now() + delay,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

pub struct ModuleEditor {
    guild_id: String,
    kind: ModuleKind,
    /// Last record known to be in storage
    base: ModuleSettings,
    draft: ModuleSettings,
    feedback: Option<SaveFeedback>,
    feedback_delay: Duration,
}

impl ModuleEditor {
    pub fn new(guild_id: &str, base: ModuleSettings, feedback_delay: Duration) -> Self {
        Self {
            guild_id: guild_id.to_string(),
            kind: base.kind(),
            draft: base.clone(),
            base,
            feedback: None,
            feedback_delay,
        }
    }

    pub fn guild_id(&self) -> &str {
        &self.guild_id
    }

    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    pub fn draft(&self) -> &ModuleSettings {
        &self.draft
    }

    pub fn is_dirty(&self) -> bool {
        self.draft != self.base
    }

    /// Mutate the draft in place. Nothing is written.
    pub fn edit(&mut self, f: impl FnOnce(&mut ModuleSettings)) -> Result<()> {
        let mut next = self.draft.clone();
        f(&mut next);
        self.replace_draft(next)
    }

    pub fn replace_draft(&mut self, draft: ModuleSettings) -> Result<()> {
        if draft.kind() != self.kind {
            return Err(DashboardError::validation(format!(
                "{} editor cannot hold {} settings",
                self.kind.display_name(),
                draft.kind().display_name()
            )));
        }
        self.draft = draft;
        Ok(())
    }

    /// Validate and write this module's draft with exactly one storage call.
    /// The draft is kept whether or not the write succeeds.
    pub async fn save(&mut self, storage: &dyn SettingsStorage) -> &SaveFeedback {
        let result = match self.draft.validate() {
            Ok(()) => storage.save(&self.guild_id, &self.draft).await,
            Err(e) => Err(e),
        };

        let feedback = match result {
            Ok(()) => {
                info!("Saved {} for guild {}", self.kind, self.guild_id);
                self.base = self.draft.clone();
                SaveFeedback::new(
                    true,
                    format!("{} saved", self.kind.display_name()),
                    self.feedback_delay,
                )
            }
            Err(e) => {
                warn!(
                    "Saving {} for guild {} failed: {}",
                    self.kind, self.guild_id, e
                );
                SaveFeedback::new(false, save_failure_message(&e), self.feedback_delay)
            }
        };

        self.feedback.insert(feedback)
    }

    /// Feedback of the last save, until it is dismissed
    pub fn feedback(&mut self) -> Option<&SaveFeedback> {
        if self.feedback.as_ref().is_some_and(SaveFeedback::is_expired) {
            self.feedback = None;
        }
        self.feedback.as_ref()
    }
}

fn save_failure_message(err: &DashboardError) -> String {
    match err {
        DashboardError::Validation { message } => message.clone(),
        other => format!("Save failed: {}", other),
    }
}
