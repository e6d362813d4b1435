//! Storage interface consumed by the engine.
//!
//! The relational store holding CRM contacts and companies lives outside
//! this crate; the engine only issues logical upsert-by-external-id
//! operations through [`CrmStore`]. Implementations must make each upsert
//! atomic per record and safe under concurrent calls for different
//! external ids; the engine adds no locking of its own.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crmlink_connector::error::ConnectorResult;
use crmlink_connector::record::CrmEntityPayload;
use crmlink_connector::types::{EntityKind, SyncSource};

/// Outcome of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// The CRM storage collaborator.
#[async_trait]
pub trait CrmStore: Send + Sync {
    /// Insert-if-absent / update-if-present, keyed by
    /// `(source, kind, external_id)`. Must be a single consistent
    /// operation: no read-then-write race is exposed to callers.
    async fn upsert_by_external_id(
        &self,
        kind: EntityKind,
        source: SyncSource,
        external_id: &str,
        payload: &CrmEntityPayload,
    ) -> ConnectorResult<UpsertOutcome>;

    /// Fetch a stored payload for diagnostics.
    async fn find_by_external_id(
        &self,
        kind: EntityKind,
        source: SyncSource,
        external_id: &str,
    ) -> ConnectorResult<Option<CrmEntityPayload>>;

    /// Locally changed payloads to push in the outbound direction:
    /// records of the kind/source whose raw `last_modified` is strictly
    /// after the watermark (all records when no watermark is given).
    async fn pending_outbound(
        &self,
        kind: EntityKind,
        source: SyncSource,
        modified_after: Option<DateTime<Utc>>,
    ) -> ConnectorResult<Vec<CrmEntityPayload>>;
}

type StoreKey = (SyncSource, EntityKind, String);

/// In-memory store for tests and development.
#[derive(Default)]
pub struct InMemoryCrmStore {
    records: RwLock<HashMap<StoreKey, CrmEntityPayload>>,
}

impl InMemoryCrmStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records across all kinds and sources.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Seed a record directly, bypassing upsert bookkeeping (test setup).
    pub async fn seed(&self, payload: CrmEntityPayload) {
        let key = (payload.source, payload.kind, payload.external_id.clone());
        self.records.write().await.insert(key, payload);
    }
}

#[async_trait]
impl CrmStore for InMemoryCrmStore {
    async fn upsert_by_external_id(
        &self,
        kind: EntityKind,
        source: SyncSource,
        external_id: &str,
        payload: &CrmEntityPayload,
    ) -> ConnectorResult<UpsertOutcome> {
        let key = (source, kind, external_id.to_string());
        let mut records = self.records.write().await;
        match records.insert(key, payload.clone()) {
            None => Ok(UpsertOutcome::Created),
            Some(_) => Ok(UpsertOutcome::Updated),
        }
    }

    async fn find_by_external_id(
        &self,
        kind: EntityKind,
        source: SyncSource,
        external_id: &str,
    ) -> ConnectorResult<Option<CrmEntityPayload>> {
        let key = (source, kind, external_id.to_string());
        Ok(self.records.read().await.get(&key).cloned())
    }

    async fn pending_outbound(
        &self,
        kind: EntityKind,
        source: SyncSource,
        modified_after: Option<DateTime<Utc>>,
    ) -> ConnectorResult<Vec<CrmEntityPayload>> {
        let records = self.records.read().await;
        let mut pending: Vec<CrmEntityPayload> = records
            .values()
            .filter(|p| p.kind == kind && p.source == source)
            .filter(|p| match (modified_after, p.raw.last_modified) {
                (Some(watermark), Some(modified)) => modified > watermark,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.external_id.cmp(&b.external_id));
        Ok(pending)
    }
}

impl std::fmt::Debug for InMemoryCrmStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCrmStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crmlink_connector::record::NormalizedRecord;
    use serde_json::json;

    fn payload(external_id: &str) -> CrmEntityPayload {
        let record = NormalizedRecord::new(external_id).with_field("display_name", json!("Jane"));
        CrmEntityPayload {
            kind: EntityKind::Contact,
            source: SyncSource::DynamicsBc,
            external_id: external_id.to_string(),
            last_sync_at: Utc::now(),
            fields: Default::default(),
            raw: record,
        }
    }

    #[tokio::test]
    async fn upsert_creates_then_updates() {
        let store = InMemoryCrmStore::new();
        let p = payload("c-1");

        let first = store
            .upsert_by_external_id(EntityKind::Contact, SyncSource::DynamicsBc, "c-1", &p)
            .await
            .unwrap();
        assert_eq!(first, UpsertOutcome::Created);

        let second = store
            .upsert_by_external_id(EntityKind::Contact, SyncSource::DynamicsBc, "c-1", &p)
            .await
            .unwrap();
        assert_eq!(second, UpsertOutcome::Updated);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn keys_are_scoped_by_source_and_kind() {
        let store = InMemoryCrmStore::new();
        let p = payload("c-1");

        store
            .upsert_by_external_id(EntityKind::Contact, SyncSource::DynamicsBc, "c-1", &p)
            .await
            .unwrap();
        let other_source = store
            .upsert_by_external_id(EntityKind::Contact, SyncSource::Hubspot, "c-1", &p)
            .await
            .unwrap();
        assert_eq!(other_source, UpsertOutcome::Created);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn pending_outbound_honors_watermark() {
        let store = InMemoryCrmStore::new();
        let old_instant = "2024-01-01T00:00:00Z".parse().unwrap();
        let new_instant = "2024-06-01T00:00:00Z".parse().unwrap();

        let mut old = payload("a");
        old.raw.last_modified = Some(old_instant);
        let mut new = payload("b");
        new.raw.last_modified = Some(new_instant);
        store.seed(old).await;
        store.seed(new).await;

        let watermark = "2024-03-01T00:00:00Z".parse().unwrap();
        let pending = store
            .pending_outbound(EntityKind::Contact, SyncSource::DynamicsBc, Some(watermark))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].external_id, "b");

        let all = store
            .pending_outbound(EntityKind::Contact, SyncSource::DynamicsBc, None)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }
}
