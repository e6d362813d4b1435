//! # Business Central Connector
//!
//! [`RemoteClient`] implementation for Dynamics 365 Business Central,
//! speaking the OData v4 REST API
//! (<https://learn.microsoft.com/en-us/dynamics365/business-central/dev-itpro/api-reference/v2.0/>).
//!
//! - OAuth2 client-credentials token acquisition against Azure AD, with a
//!   5-minute expiry margin and single-flight refresh
//! - `$top`/`$skip`/`$filter` paginated collection reads with incremental
//!   `lastModifiedDateTime gt <ISO>` filtering
//! - Customers map to CRM contacts, vendors to CRM companies
//!
//! [`RemoteClient`]: crmlink_connector::RemoteClient

pub mod auth;
pub mod client;
pub mod config;
pub mod connector;

pub use auth::TokenCache;
pub use client::{ODataClient, ODataCollection};
pub use config::BcConfig;
pub use connector::BusinessCentralClient;
