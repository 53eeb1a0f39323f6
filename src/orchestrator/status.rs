//! Aggregate status derived from one settled fetch cycle.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

use super::outcome::FetchOutcome;
use crate::models::Channel;
use crate::modules::{ChannelList, ModuleKind, ModuleSettings, DEFAULT_PREFIX};

/// Per-module "is this configured" map plus what went wrong in the cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateStatus {
    pub active: BTreeMap<ModuleKind, bool>,
    /// Human names of the modules whose read failed, in module order
    pub failed_modules: Vec<String>,
    pub channel_error: Option<String>,
    pub warning_text: Option<String>,
}

impl AggregateStatus {
    pub fn is_active(&self, kind: ModuleKind) -> bool {
        self.active.get(&kind).copied().unwrap_or(false)
    }
}

/// Everything one fetch cycle produced for a guild
#[derive(Debug, Clone, Serialize)]
pub struct GuildSnapshot {
    pub guild_id: String,
    pub channels: ChannelList,
    pub settings: BTreeMap<ModuleKind, ModuleSettings>,
    /// Failure reasons by module, for the editors
    pub failures: BTreeMap<ModuleKind, String>,
    pub status: AggregateStatus,
}

impl GuildSnapshot {
    /// Build a snapshot from scratch out of a fully settled batch.
    /// Nothing carries over from earlier cycles.
    pub fn from_outcomes(
        guild_id: &str,
        channels: FetchOutcome<Vec<Channel>>,
        modules: Vec<(ModuleKind, FetchOutcome<ModuleSettings>)>,
    ) -> Self {
        let channels = match channels {
            FetchOutcome::Success { value } => ChannelList::Loaded { channels: value },
            FetchOutcome::Failure { reason } => {
                warn!("Channel list for guild {} unavailable: {}", guild_id, reason);
                ChannelList::Unavailable { reason }
            }
        };

        let mut outcomes: HashMap<ModuleKind, FetchOutcome<ModuleSettings>> =
            modules.into_iter().collect();

        let mut settings = BTreeMap::new();
        let mut failures = BTreeMap::new();
        let mut active = BTreeMap::new();
        let mut failed_modules = Vec::new();

        for kind in ModuleKind::ALL {
            let outcome = outcomes
                .remove(&kind)
                .unwrap_or_else(|| FetchOutcome::failure("not fetched"));

            match outcome {
                FetchOutcome::Success { value } if value.kind() == kind => {
                    active.insert(kind, value.is_active());
                    settings.insert(kind, value);
                }
                FetchOutcome::Success { value } => {
                    let reason = format!("storage returned {} settings", value.kind());
                    record_failure(guild_id, kind, reason, &mut settings, &mut failures);
                    active.insert(kind, false);
                    failed_modules.push(kind.display_name().to_string());
                }
                FetchOutcome::Failure { reason } => {
                    record_failure(guild_id, kind, reason, &mut settings, &mut failures);
                    active.insert(kind, false);
                    failed_modules.push(kind.display_name().to_string());
                }
            }
        }

        let channel_error = channels.error().map(str::to_string);
        let warning_text = warning_text(channel_error.as_deref(), &failed_modules);

        Self {
            guild_id: guild_id.to_string(),
            channels,
            settings,
            failures,
            status: AggregateStatus {
                active,
                failed_modules,
                channel_error,
                warning_text,
            },
        }
    }

    pub fn settings(&self, kind: ModuleKind) -> ModuleSettings {
        self.settings
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| ModuleSettings::default_for(kind))
    }

    /// Effective bot prefix for the overview
    pub fn prefix(&self) -> &str {
        self.settings
            .get(&ModuleKind::General)
            .and_then(|s| s.prefix())
            .unwrap_or(DEFAULT_PREFIX)
    }
}

fn record_failure(
    guild_id: &str,
    kind: ModuleKind,
    reason: String,
    settings: &mut BTreeMap<ModuleKind, ModuleSettings>,
    failures: &mut BTreeMap<ModuleKind, String>,
) {
    warn!(
        "Could not fetch {} for guild {}: {}",
        kind.display_name(),
        guild_id,
        reason
    );
    settings.insert(kind, ModuleSettings::default_for(kind));
    failures.insert(kind, reason);
}

/// Banner text for a cycle, `None` when everything loaded
pub fn warning_text(channel_error: Option<&str>, failed_modules: &[String]) -> Option<String> {
    let mut parts = Vec::new();

    if let Some(reason) = channel_error {
        parts.push(format!(
            "Could not fetch the channel list ({}), so channel selectors are disabled.",
            reason
        ));
    }

    if !failed_modules.is_empty() {
        parts.push(format!(
            "Could not fetch settings for: {}.",
            failed_modules.join(", ")
        ));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChannelKind;
    use crate::test_support::configured_settings;
    use std::collections::BTreeSet;

    fn text_channel() -> Channel {
        Channel {
            id: "c1".to_string(),
            name: "general".to_string(),
            kind: ChannelKind::Text,
            parent_id: None,
            position: 0,
        }
    }

    fn batch(failing: &BTreeSet<ModuleKind>) -> Vec<(ModuleKind, FetchOutcome<ModuleSettings>)> {
        ModuleKind::ALL
            .iter()
            .map(|&kind| {
                let outcome = if failing.contains(&kind) {
                    FetchOutcome::failure("service unavailable")
                } else {
                    FetchOutcome::success(configured_settings(kind))
                };
                (kind, outcome)
            })
            .collect()
    }

    #[test]
    fn test_every_failing_subset() {
        // All 2^11 subsets of failing modules
        for bits in 0u32..(1 << ModuleKind::ALL.len()) {
            let failing: BTreeSet<ModuleKind> = ModuleKind::ALL
                .iter()
                .enumerate()
                .filter(|(i, _)| bits & (1 << i) != 0)
                .map(|(_, k)| *k)
                .collect();

            let snapshot = GuildSnapshot::from_outcomes(
                "g1",
                FetchOutcome::success(vec![text_channel()]),
                batch(&failing),
            );

            for kind in ModuleKind::ALL {
                let expected = !failing.contains(&kind);
                assert_eq!(snapshot.status.is_active(kind), expected, "{:?} in {:b}", kind, bits);
                if failing.contains(&kind) {
                    assert_eq!(snapshot.settings(kind), ModuleSettings::default_for(kind));
                }
            }

            let expected_names: BTreeSet<String> =
                failing.iter().map(|k| k.display_name().to_string()).collect();
            let actual_names: BTreeSet<String> =
                snapshot.status.failed_modules.iter().cloned().collect();
            assert_eq!(actual_names, expected_names);
            assert_eq!(snapshot.status.failed_modules.len(), failing.len());
            assert_eq!(snapshot.status.warning_text.is_some(), !failing.is_empty());
        }
    }

    #[test]
    fn test_failed_general_falls_back_to_default_prefix() {
        let failing = BTreeSet::from([ModuleKind::General]);
        let snapshot =
            GuildSnapshot::from_outcomes("g1", FetchOutcome::success(vec![]), batch(&failing));
        assert_eq!(snapshot.prefix(), DEFAULT_PREFIX);

        let snapshot = GuildSnapshot::from_outcomes(
            "g1",
            FetchOutcome::success(vec![]),
            batch(&BTreeSet::new()),
        );
        assert_eq!(snapshot.prefix(), "!");
    }

    #[test]
    fn test_warning_text_composition() {
        assert_eq!(warning_text(None, &[]), None);

        let names = vec!["Logging".to_string(), "Chatbot".to_string()];
        assert_eq!(
            warning_text(None, &names).unwrap(),
            "Could not fetch settings for: Logging, Chatbot."
        );

        let text = warning_text(Some("Missing Access"), &names).unwrap();
        assert!(text.starts_with("Could not fetch the channel list (Missing Access)"));
        assert!(text.ends_with("Could not fetch settings for: Logging, Chatbot."));

        let channel_only = warning_text(Some("Missing Access"), &[]).unwrap();
        assert!(!channel_only.contains("settings for"));
    }

    #[test]
    fn test_channel_failure_is_distinct_from_zero_channels() {
        let empty = GuildSnapshot::from_outcomes(
            "g1",
            FetchOutcome::success(vec![]),
            batch(&BTreeSet::new()),
        );
        assert_eq!(empty.status.channel_error, None);
        assert_eq!(empty.status.warning_text, None);

        let failed = GuildSnapshot::from_outcomes(
            "g1",
            FetchOutcome::failure("401 Unauthorized"),
            batch(&BTreeSet::new()),
        );
        assert_eq!(failed.status.channel_error.as_deref(), Some("401 Unauthorized"));
        assert!(failed.status.failed_modules.is_empty());
        assert!(failed.status.warning_text.unwrap().contains("401 Unauthorized"));
    }

    #[test]
    fn test_mismatched_record_counts_as_failure() {
        let mut modules = batch(&BTreeSet::new());
        modules[1].1 = FetchOutcome::success(ModuleSettings::default_for(ModuleKind::Logging));
        modules.pop();

        let snapshot = GuildSnapshot::from_outcomes("g1", FetchOutcome::success(vec![]), modules);
        assert_eq!(
            snapshot.status.failed_modules,
            vec!["Ticket System".to_string(), "Welcome Messages".to_string()]
        );
    }
}
