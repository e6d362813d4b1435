//! Orchestration of sync runs across entity kinds.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crmlink_connector::error::ConnectorError;
use crmlink_connector::registry::{BoxedRemoteClient, SourceRegistry};
use crmlink_connector::types::{EntityKind, PageRequest, PushOutcome, RecordFilter, SyncSource};

use crate::error::{SyncEngineResult, SyncError};
use crate::job::JobParams;
use crate::mapper::{self, MappingRule, MappingValidation, PreviewRecord};
use crate::report::{EntityStats, RecordError, SyncReport};
use crate::storage::{CrmStore, UpsertOutcome};

/// Tunables for a sync run.
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// Page size for inbound fetches.
    pub page_size: u32,
    /// Cap on inbound records per entity kind; `None` means no cap.
    pub max_records: Option<u64>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_records: None,
        }
    }
}

/// Pulls remote records into the CRM store and pushes local changes back.
///
/// The engine is stateless with respect to jobs: it produces a
/// [`SyncReport`] and leaves job bookkeeping to the task runner.
pub struct SyncEngine {
    registry: Arc<SourceRegistry>,
    store: Arc<dyn CrmStore>,
    options: SyncOptions,
}

impl SyncEngine {
    pub fn new(registry: Arc<SourceRegistry>, store: Arc<dyn CrmStore>) -> Self {
        Self {
            registry,
            store,
            options: SyncOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    async fn client_for(&self, source: SyncSource) -> SyncEngineResult<BoxedRemoteClient> {
        self.registry.create(source).await.map_err(|err| match err {
            ConnectorError::UnsupportedSource { .. } => SyncError::UnsupportedSource { source },
            other => SyncError::Connector(other),
        })
    }

    /// Run one synchronization described by `params`.
    ///
    /// Entity kinds run sequentially and independently: a connection or
    /// fetch failure for one kind is recorded in the report and the next
    /// kind still runs. Per-record failures never abort the run.
    #[instrument(skip(self, params), fields(source = %params.source, direction = ?params.direction, dry_run = params.dry_run))]
    pub async fn sync(&self, params: &JobParams) -> SyncEngineResult<SyncReport> {
        if params.entity_kinds.is_empty() {
            return Err(SyncError::NoEntityKinds);
        }
        if !self.registry.supports(params.source).await {
            return Err(SyncError::UnsupportedSource {
                source: params.source,
            });
        }

        let mut report = SyncReport::default();
        for &kind in &params.entity_kinds {
            let (stats, errors) = self.sync_kind(params, kind).await;
            report.absorb(kind, stats, errors);
        }
        report.finalize();
        info!(
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed,
            success = report.success,
            "sync finished"
        );
        Ok(report)
    }

    async fn sync_kind(&self, params: &JobParams, kind: EntityKind) -> (EntityStats, Vec<RecordError>) {
        let mut stats = EntityStats::default();
        let mut errors = Vec::new();

        let client = match self.client_for(params.source).await {
            Ok(client) => client,
            Err(err) => {
                warn!(kind = %kind, error = %err, "no client for source");
                stats.failed += 1;
                errors.push(RecordError::connection(err.to_string()));
                return (stats, errors);
            }
        };
        if let Err(err) = client.connect().await {
            warn!(kind = %kind, error = %err, "connection failed");
            stats.failed += 1;
            errors.push(RecordError::connection(err.to_string()));
            return (stats, errors);
        }

        if params.direction.includes_inbound() {
            self.sync_inbound(params, kind, &client, &mut stats, &mut errors)
                .await;
        }
        if params.direction.includes_outbound() {
            self.sync_outbound(params, kind, &client, &mut stats, &mut errors)
                .await;
        }

        client.close().await;
        (stats, errors)
    }

    async fn sync_inbound(
        &self,
        params: &JobParams,
        kind: EntityKind,
        client: &BoxedRemoteClient,
        stats: &mut EntityStats,
        errors: &mut Vec<RecordError>,
    ) {
        let filter = match params.modified_after {
            Some(watermark) => RecordFilter::modified_after(watermark),
            None => RecordFilter::default(),
        };
        let mut page = PageRequest::new(self.options.page_size, 0);
        let mut fetched: u64 = 0;

        loop {
            let batch = match client.fetch_page(kind, &filter, &page).await {
                Ok(batch) => batch,
                Err(err) => {
                    // The rest of this kind's pages are unreachable;
                    // other kinds still run.
                    warn!(kind = %kind, skip = page.skip, error = %err, "fetch failed");
                    stats.failed += 1;
                    errors.push(RecordError {
                        entity: kind.as_str().to_string(),
                        external_id: None,
                        error: err.to_string(),
                    });
                    return;
                }
            };
            debug!(kind = %kind, skip = page.skip, count = batch.records.len(), "fetched page");

            for record in &batch.records {
                if let Some(cap) = self.options.max_records {
                    if fetched >= cap {
                        info!(kind = %kind, cap, "record cap reached");
                        return;
                    }
                }
                fetched += 1;

                let payload = match mapper::map_record(params.source, kind, record) {
                    Ok(payload) => payload,
                    Err(err) => {
                        stats.failed += 1;
                        errors.push(RecordError::record(
                            kind,
                            record.source_id.clone(),
                            err.to_string(),
                        ));
                        continue;
                    }
                };

                if params.dry_run {
                    stats.skipped += 1;
                    continue;
                }
                match self
                    .store
                    .upsert_by_external_id(kind, params.source, &payload.external_id, &payload)
                    .await
                {
                    Ok(UpsertOutcome::Created) => stats.created += 1,
                    Ok(UpsertOutcome::Updated) => stats.updated += 1,
                    Err(err) => {
                        stats.failed += 1;
                        errors.push(RecordError::record(
                            kind,
                            payload.external_id.clone(),
                            err.to_string(),
                        ));
                    }
                }
            }

            if !batch.has_more {
                return;
            }
            page = page.next();
        }
    }

    async fn sync_outbound(
        &self,
        params: &JobParams,
        kind: EntityKind,
        client: &BoxedRemoteClient,
        stats: &mut EntityStats,
        errors: &mut Vec<RecordError>,
    ) {
        let pending = match self
            .store
            .pending_outbound(kind, params.source, params.modified_after)
            .await
        {
            Ok(pending) => pending,
            Err(err) => {
                warn!(kind = %kind, error = %err, "outbound scan failed");
                stats.failed += 1;
                errors.push(RecordError {
                    entity: kind.as_str().to_string(),
                    external_id: None,
                    error: err.to_string(),
                });
                return;
            }
        };
        debug!(kind = %kind, count = pending.len(), "pending outbound records");

        for payload in &pending {
            if params.dry_run {
                stats.skipped += 1;
                continue;
            }
            match client.push(kind, payload).await {
                Ok(PushOutcome::Created) => stats.created += 1,
                Ok(PushOutcome::Updated) => stats.updated += 1,
                Err(err) => {
                    stats.failed += 1;
                    errors.push(RecordError::record(
                        kind,
                        payload.external_id.clone(),
                        err.to_string(),
                    ));
                }
            }
        }
    }

    /// Fetch a small sample of remote records, mapped to the preview
    /// shape. Nothing is written to the store.
    #[instrument(skip(self), fields(source = %source, kind = %kind))]
    pub async fn preview(
        &self,
        source: SyncSource,
        kind: EntityKind,
        limit: u32,
    ) -> SyncEngineResult<Vec<PreviewRecord>> {
        let client = self.client_for(source).await?;
        client.connect().await?;
        let page = PageRequest::new(limit, 0);
        let batch = client
            .fetch_page(kind, &RecordFilter::default(), &page)
            .await?;
        client.close().await;
        Ok(batch.records.iter().map(mapper::preview_row).collect())
    }

    /// Validate a custom field-mapping configuration.
    pub fn validate_mapping(&self, rules: &[MappingRule]) -> MappingValidation {
        mapper::validate_mapping(rules)
    }
}
