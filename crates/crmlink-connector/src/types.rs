//! Shared enums and request/response types for remote-system clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::record::NormalizedRecord;

/// External systems the CRM can synchronize with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncSource {
    DynamicsBc,
    Salesforce,
    Hubspot,
    GenericRest,
}

impl SyncSource {
    /// Stable string form, matching the wire/API representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncSource::DynamicsBc => "dynamics_bc",
            SyncSource::Salesforce => "salesforce",
            SyncSource::Hubspot => "hubspot",
            SyncSource::GenericRest => "generic_rest",
        }
    }
}

impl std::fmt::Display for SyncSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Required because thiserror treats error-enum fields named `source` as the
// error's cause; the `source` field name is part of the public API.
impl std::error::Error for SyncSource {}

/// Direction of a synchronization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// External system → CRM.
    Inbound,
    /// CRM → external system.
    Outbound,
    Bidirectional,
}

impl SyncDirection {
    /// True when the run pulls remote changes into the CRM.
    pub fn includes_inbound(&self) -> bool {
        matches!(self, SyncDirection::Inbound | SyncDirection::Bidirectional)
    }

    /// True when the run pushes local changes to the remote system.
    pub fn includes_outbound(&self) -> bool {
        matches!(self, SyncDirection::Outbound | SyncDirection::Bidirectional)
    }
}

/// CRM entity categories that can be synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Contact,
    Company,
    Deal,
    Task,
    Tag,
    Note,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Contact => "contact",
            EntityKind::Company => "company",
            EntityKind::Deal => "deal",
            EntityKind::Task => "task",
            EntityKind::Tag => "tag",
            EntityKind::Note => "note",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote service page-size limits.
pub const MIN_PAGE_SIZE: u32 = 1;
pub const MAX_PAGE_SIZE: u32 = 1000;

/// One page of a caller-driven pagination loop.
///
/// The engine advances `skip` by `top` until the client reports no
/// further pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Maximum records to return (`$top`), clamped to service limits.
    pub top: u32,
    /// Records to skip from the start of the collection (`$skip`).
    pub skip: u32,
}

impl PageRequest {
    /// Create a page request, clamping `top` to the allowed 1..=1000 range.
    pub fn new(top: u32, skip: u32) -> Self {
        Self {
            top: top.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE),
            skip,
        }
    }

    /// The request for the page following this one.
    pub fn next(&self) -> Self {
        Self {
            top: self.top,
            skip: self.skip + self.top,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(100, 0)
    }
}

/// Server-side filter for a fetch.
///
/// `modified_after` is the incremental-sync watermark; `extra` carries
/// source-specific raw predicates through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordFilter {
    /// Only records modified strictly after this instant.
    pub modified_after: Option<DateTime<Utc>>,
    /// Source-specific raw filter terms, ANDed with the watermark.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl RecordFilter {
    /// Filter on records modified strictly after `instant`.
    pub fn modified_after(instant: DateTime<Utc>) -> Self {
        Self {
            modified_after: Some(instant),
            extra: BTreeMap::new(),
        }
    }

    /// Render the filter as an OData `$filter` expression against the
    /// given timestamp field, e.g. `lastModifiedDateTime gt
    /// 2024-01-01T00:00:00Z`. Returns `None` when the filter is empty.
    pub fn to_odata_filter(&self, timestamp_field: &str) -> Option<String> {
        let mut terms = Vec::new();
        if let Some(watermark) = self.modified_after {
            terms.push(format!(
                "{} gt {}",
                timestamp_field,
                watermark.format("%Y-%m-%dT%H:%M:%SZ")
            ));
        }
        for (field, predicate) in &self.extra {
            terms.push(format!("{field} {predicate}"));
        }
        if terms.is_empty() {
            None
        } else {
            Some(terms.join(" and "))
        }
    }

    /// True when no predicate is set.
    pub fn is_empty(&self) -> bool {
        self.modified_after.is_none() && self.extra.is_empty()
    }
}

/// Result of one `fetch_page` call.
#[derive(Debug, Clone, Default)]
pub struct FetchPage {
    pub records: Vec<NormalizedRecord>,
    /// Whether further pages remain after this one.
    pub has_more: bool,
}

/// Outcome of an outbound push of one payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushOutcome {
    Created,
    Updated,
}

/// Structured result of a connection diagnostic.
///
/// `test_connection` never fails; problems are reported in `error`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    /// Human-readable facts about the remote (company names, tenant, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectionStatus {
    /// A successful diagnostic.
    pub fn ok() -> Self {
        Self {
            connected: true,
            details: BTreeMap::new(),
            error: None,
        }
    }

    /// A failed diagnostic carrying the error description.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            connected: false,
            details: BTreeMap::new(),
            error: Some(error.into()),
        }
    }

    /// Attach a detail field (builder pattern).
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}
