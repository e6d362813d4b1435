//! Client factory registry keyed by source system.
//!
//! The engine resolves a [`RemoteClient`] once at job start through this
//! registry. Adding a remote system means registering one factory, not
//! editing engine dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{ConnectorError, ConnectorResult};
use crate::traits::RemoteClient;
use crate::types::SyncSource;

/// A boxed client instance as handed to the engine.
pub type BoxedRemoteClient = Arc<dyn RemoteClient>;

/// Factory producing a fresh client for each job.
///
/// Factories are fallible: configuration problems (missing credentials)
/// surface at creation time, before any network traffic.
pub type RemoteClientFactory =
    Arc<dyn Fn() -> ConnectorResult<BoxedRemoteClient> + Send + Sync>;

/// Registry of remote-client factories.
#[derive(Default)]
pub struct SourceRegistry {
    factories: RwLock<HashMap<SyncSource, RemoteClientFactory>>,
}

impl SourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for a source, replacing any existing one.
    pub async fn register(&self, source: SyncSource, factory: RemoteClientFactory) {
        debug!(%source, "registering remote client factory");
        self.factories.write().await.insert(source, factory);
    }

    /// Create a fresh client for the source.
    ///
    /// Fails with `UnsupportedSource` when no factory is registered.
    pub async fn create(&self, source: SyncSource) -> ConnectorResult<BoxedRemoteClient> {
        let factories = self.factories.read().await;
        let factory = factories
            .get(&source)
            .ok_or(ConnectorError::UnsupportedSource { source })?;
        factory()
    }

    /// Whether a factory is registered for the source.
    pub async fn supports(&self, source: SyncSource) -> bool {
        self.factories.read().await.contains_key(&source)
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CrmEntityPayload;
    use crate::types::{
        ConnectionStatus, EntityKind, FetchPage, PageRequest, PushOutcome, RecordFilter,
    };
    use async_trait::async_trait;

    struct NullClient;

    #[async_trait]
    impl RemoteClient for NullClient {
        fn source(&self) -> SyncSource {
            SyncSource::GenericRest
        }
        async fn connect(&self) -> ConnectorResult<()> {
            Ok(())
        }
        async fn close(&self) {}
        async fn fetch_page(
            &self,
            _kind: EntityKind,
            _filter: &RecordFilter,
            _page: &PageRequest,
        ) -> ConnectorResult<FetchPage> {
            Ok(FetchPage::default())
        }
        async fn push(
            &self,
            _kind: EntityKind,
            _payload: &CrmEntityPayload,
        ) -> ConnectorResult<PushOutcome> {
            Ok(PushOutcome::Created)
        }
        async fn test_connection(&self) -> ConnectionStatus {
            ConnectionStatus::ok()
        }
    }

    #[tokio::test]
    async fn create_resolves_registered_factory() {
        let registry = SourceRegistry::new();
        registry
            .register(
                SyncSource::GenericRest,
                Arc::new(|| Ok(Arc::new(NullClient) as BoxedRemoteClient)),
            )
            .await;

        assert!(registry.supports(SyncSource::GenericRest).await);
        let client = registry.create(SyncSource::GenericRest).await.unwrap();
        assert_eq!(client.source(), SyncSource::GenericRest);
    }

    #[tokio::test]
    async fn create_unknown_source_fails() {
        let registry = SourceRegistry::new();
        let err = registry.create(SyncSource::Salesforce).await.unwrap_err();
        assert!(matches!(err, ConnectorError::UnsupportedSource { .. }));
    }
}
