//! Record shapes at the fetch/apply boundary.
//!
//! A remote system's native item is first translated into a
//! [`NormalizedRecord`] (source-agnostic field map), then mapped into a
//! [`CrmEntityPayload`] (CRM-shape data ready for upsert). The split keeps
//! mapping testable without I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::types::{EntityKind, SyncSource};

/// A remote record translated into a common shape before mapping.
///
/// Immutable once built; discarded after mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// The remote system's native identifier for this record.
    pub source_id: String,
    /// Remote modification timestamp, when the system reports one.
    pub last_modified: Option<DateTime<Utc>>,
    /// Field name → value, with source-agnostic names.
    pub fields: BTreeMap<String, Value>,
}

impl NormalizedRecord {
    /// Create a record with the given source id and no fields.
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            last_modified: None,
            fields: BTreeMap::new(),
        }
    }

    /// Set the remote modification timestamp (builder pattern).
    pub fn with_last_modified(mut self, instant: DateTime<Utc>) -> Self {
        self.last_modified = Some(instant);
        self
    }

    /// Set a field value (builder pattern). Null values are dropped so that
    /// absent and null remote fields look the same to the mapper.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        if !value.is_null() {
            self.fields.insert(name.into(), value);
        }
        self
    }

    /// Get a field as a string slice, if present and a string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Check if a field is present.
    pub fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }
}

/// Fully mapped CRM-shape data plus sync bookkeeping.
///
/// Consumed by the storage interface's upsert call; the raw normalized
/// record rides along for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrmEntityPayload {
    pub kind: EntityKind,
    pub source: SyncSource,
    /// The remote id the upsert is keyed on, together with `source`.
    pub external_id: String,
    /// When the mapping was performed, not the remote's modification time.
    pub last_sync_at: DateTime<Utc>,
    /// CRM field name → value.
    pub fields: BTreeMap<String, Value>,
    /// The normalized record this payload was mapped from.
    pub raw: NormalizedRecord,
}

impl CrmEntityPayload {
    /// Get a mapped field as a string slice.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_fields_are_dropped() {
        let record = NormalizedRecord::new("c-1")
            .with_field("email", json!("a@b.test"))
            .with_field("phone", Value::Null);
        assert!(record.has("email"));
        assert!(!record.has("phone"));
    }

    #[test]
    fn get_str_ignores_non_strings() {
        let record = NormalizedRecord::new("c-1").with_field("revenue", json!(125000));
        assert_eq!(record.get_str("revenue"), None);
        assert!(record.has("revenue"));
    }

    #[test]
    fn record_serde_round_trip() {
        let record = NormalizedRecord::new("c-42")
            .with_last_modified(Utc::now())
            .with_field("display_name", json!("Jane Doe"));
        let json = serde_json::to_string(&record).unwrap();
        let back: NormalizedRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
