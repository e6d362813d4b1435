//! The remote-system capability trait.

use async_trait::async_trait;

use crate::error::ConnectorResult;
use crate::record::CrmEntityPayload;
use crate::types::{
    ConnectionStatus, EntityKind, FetchPage, PageRequest, PushOutcome, RecordFilter, SyncSource,
};

/// One external system's client: authenticated session, paginated fetches,
/// outbound pushes, connection diagnostics.
///
/// ## Token lifecycle
///
/// Implementations own their access token exclusively and hold to this
/// state machine: `NoToken → Valid → Expiring → Valid` on refresh success,
/// `Expiring → NoToken` on refresh failure. A request is never issued with
/// a token inside the 5-minute expiry margin: a refresh runs first, and
/// only one refresh is in flight at a time; concurrent callers wait for it
/// rather than issuing duplicates. A refresh failure surfaces as
/// `ConnectorError::Authentication` and leaves the client in `NoToken`, so
/// the next call retries the refresh instead of a doomed request.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Which source system this client talks to.
    fn source(&self) -> SyncSource;

    /// Acquire the HTTP transport and a valid access token.
    ///
    /// Guarantees a usable authenticated state on success. Fails with
    /// `ConnectorError::Authentication` when credentials are missing or
    /// the identity provider rejects the exchange.
    async fn connect(&self) -> ConnectorResult<()>;

    /// Release the transport. Idempotent; safe after partial failure.
    async fn close(&self);

    /// Issue one paginated, server-side-filtered read.
    ///
    /// The caller drives pagination: advance `skip` by `top` until
    /// `has_more` is false. Items the client cannot normalize are logged
    /// and skipped rather than failing the page.
    async fn fetch_page(
        &self,
        kind: EntityKind,
        filter: &RecordFilter,
        page: &PageRequest,
    ) -> ConnectorResult<FetchPage>;

    /// Push one mapped payload to the remote system (outbound direction).
    ///
    /// A payload whose `external_id` already exists remotely is updated,
    /// otherwise a new remote record is created.
    async fn push(&self, kind: EntityKind, payload: &CrmEntityPayload)
        -> ConnectorResult<PushOutcome>;

    /// Minimal read-only diagnostic. Never returns `Err`; failures are
    /// reported inside the returned status.
    async fn test_connection(&self) -> ConnectionStatus;
}

impl std::fmt::Debug for dyn RemoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClient")
            .field("source", &self.source())
            .finish_non_exhaustive()
    }
}
