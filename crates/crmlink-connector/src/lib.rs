//! # Connector Framework
//!
//! Core abstractions for connecting a CRM to external business systems.
//!
//! This crate provides the foundation for synchronizing CRM contacts and
//! companies with systems like Dynamics 365 Business Central, Salesforce,
//! and HubSpot.
//!
//! ## Architecture
//!
//! Each remote system implements the [`RemoteClient`] capability trait:
//! authenticated session management, paginated and filtered fetches that
//! produce [`NormalizedRecord`]s, outbound pushes of mapped payloads, and a
//! non-failing connection diagnostic. The sync engine selects an
//! implementation once per job through a [`SourceRegistry`] keyed by
//! [`SyncSource`]; adding a remote system means registering one factory,
//! not editing engine dispatch.
//!
//! ## Example
//!
//! ```ignore
//! use crmlink_connector::prelude::*;
//!
//! let registry = SourceRegistry::new();
//! registry.register(SyncSource::DynamicsBc, bc_factory).await;
//!
//! let client = registry.create(SyncSource::DynamicsBc).await?;
//! client.connect().await?;
//! let page = client
//!     .fetch_page(EntityKind::Contact, &RecordFilter::default(), &PageRequest::new(100, 0))
//!     .await?;
//! client.close().await;
//! ```
//!
//! ## Crate Organization
//!
//! - [`error`] - Error types with transient/permanent classification
//! - [`types`] - Source, direction, and entity enums plus pagination types
//! - [`record`] - Normalized record and CRM payload shapes
//! - [`traits`] - The `RemoteClient` capability trait
//! - [`registry`] - Factory registry keyed by source system
//! - [`webhook`] - Inbound webhook signature verification

pub mod error;
pub mod record;
pub mod registry;
pub mod traits;
pub mod types;
pub mod webhook;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{ConnectorError, ConnectorResult};
    pub use crate::record::{CrmEntityPayload, NormalizedRecord};
    pub use crate::registry::{BoxedRemoteClient, RemoteClientFactory, SourceRegistry};
    pub use crate::traits::RemoteClient;
    pub use crate::types::{
        ConnectionStatus, EntityKind, FetchPage, PageRequest, PushOutcome, RecordFilter,
        SyncDirection, SyncSource,
    };
    pub use crate::webhook::{SignatureCheck, WebhookEvent};
}

pub use crate::error::{ConnectorError, ConnectorResult};
pub use crate::record::{CrmEntityPayload, NormalizedRecord};
pub use crate::registry::{BoxedRemoteClient, RemoteClientFactory, SourceRegistry};
pub use crate::traits::RemoteClient;
pub use crate::types::{
    ConnectionStatus, EntityKind, FetchPage, PageRequest, PushOutcome, RecordFilter, SyncDirection,
    SyncSource,
};

// Re-export async_trait for client implementors
pub use async_trait::async_trait;
