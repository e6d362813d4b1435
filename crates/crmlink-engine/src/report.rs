//! Aggregated results of one sync run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crmlink_connector::types::EntityKind;

/// A per-record failure descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordError {
    /// Entity kind name, or `"connection"` for session-establishment
    /// failures, or `"exception"` for orchestration failures.
    pub entity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub error: String,
}

impl RecordError {
    /// Failure of one record.
    pub fn record(kind: EntityKind, external_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            entity: kind.as_str().to_string(),
            external_id: Some(external_id.into()),
            error: error.into(),
        }
    }

    /// Failure to obtain a remote session for one entity kind.
    pub fn connection(error: impl Into<String>) -> Self {
        Self {
            entity: "connection".to_string(),
            external_id: None,
            error: error.into(),
        }
    }

    /// Orchestration-level exception recorded on a failed job.
    pub fn exception(error: impl Into<String>) -> Self {
        Self {
            entity: "exception".to_string(),
            external_id: None,
            error: error.into(),
        }
    }
}

/// Counters for one entity kind within a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStats {
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl EntityStats {
    /// Records that made it through the pipeline.
    pub fn processed(&self) -> u64 {
        self.created + self.updated + self.skipped
    }
}

/// The aggregated outcome of one `sync()` invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
    pub success: bool,
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
    /// Per-entity-kind breakdown.
    pub stats: BTreeMap<EntityKind, EntityStats>,
    /// Ordered per-record error descriptors.
    pub errors: Vec<RecordError>,
}

impl SyncReport {
    /// Fold one entity kind's stats and errors into the run totals.
    pub fn absorb(&mut self, kind: EntityKind, stats: EntityStats, errors: Vec<RecordError>) {
        self.created += stats.created;
        self.updated += stats.updated;
        self.skipped += stats.skipped;
        self.failed += stats.failed;
        let entry = self.stats.entry(kind).or_default();
        entry.created += stats.created;
        entry.updated += stats.updated;
        entry.skipped += stats.skipped;
        entry.failed += stats.failed;
        self.errors.extend(errors);
    }

    /// Apply the overall success rule: a run with failures still counts
    /// as success when it made progress.
    pub fn finalize(&mut self) {
        self.success = self.failed == 0 || self.created + self.updated > 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_failures_is_success() {
        let mut report = SyncReport::default();
        report.absorb(
            EntityKind::Contact,
            EntityStats {
                created: 3,
                updated: 1,
                ..Default::default()
            },
            vec![],
        );
        report.finalize();
        assert!(report.success);
    }

    #[test]
    fn failures_with_progress_is_partial_success() {
        let mut report = SyncReport::default();
        report.absorb(
            EntityKind::Contact,
            EntityStats {
                created: 2,
                failed: 1,
                ..Default::default()
            },
            vec![RecordError::record(EntityKind::Contact, "x", "boom")],
        );
        report.finalize();
        assert!(report.success);
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn failures_without_progress_is_not_success() {
        let mut report = SyncReport::default();
        report.absorb(
            EntityKind::Contact,
            EntityStats {
                failed: 4,
                ..Default::default()
            },
            vec![],
        );
        report.finalize();
        assert!(!report.success);
    }

    #[test]
    fn skips_alone_do_not_rescue_failures() {
        // Dry-run skips are not progress in the success rule.
        let mut report = SyncReport::default();
        report.absorb(
            EntityKind::Contact,
            EntityStats {
                skipped: 5,
                failed: 1,
                ..Default::default()
            },
            vec![],
        );
        report.finalize();
        assert!(!report.success);
    }

    #[test]
    fn absorb_accumulates_across_kinds() {
        let mut report = SyncReport::default();
        report.absorb(
            EntityKind::Contact,
            EntityStats {
                created: 2,
                ..Default::default()
            },
            vec![],
        );
        report.absorb(
            EntityKind::Company,
            EntityStats {
                updated: 3,
                ..Default::default()
            },
            vec![],
        );
        assert_eq!(report.created, 2);
        assert_eq!(report.updated, 3);
        assert_eq!(report.stats.len(), 2);
    }
}
