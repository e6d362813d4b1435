//! `RemoteClient` implementation for Business Central.
//!
//! Customers are synchronized as CRM contacts and vendors as CRM
//! companies. Other entity kinds have no Business Central counterpart and
//! fetch as empty pages.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crmlink_connector::error::{ConnectorError, ConnectorResult};
use crmlink_connector::record::{CrmEntityPayload, NormalizedRecord};
use crmlink_connector::traits::RemoteClient;
use crmlink_connector::types::{
    ConnectionStatus, EntityKind, FetchPage, PageRequest, PushOutcome, RecordFilter, SyncSource,
};

use crate::auth::TokenCache;
use crate::client::{ODataClient, ODataCollection};
use crate::config::BcConfig;

/// Customer/vendor wire record. The two collections share the same shape.
#[derive(Debug, Clone, Deserialize)]
pub struct BcPartyRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "phoneNumber")]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default, rename = "taxRegistrationNo")]
    pub vat_registration_no: Option<String>,
    #[serde(default)]
    pub blocked: Option<String>,
    #[serde(default, rename = "lastModifiedDateTime")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl BcPartyRecord {
    /// Translate into the source-agnostic shape. `None` when the record
    /// carries no usable identifier.
    fn normalize(self) -> Option<NormalizedRecord> {
        let source_id = self.id.clone().or_else(|| self.number.clone())?;

        let mut record = NormalizedRecord::new(source_id)
            .with_field("display_name", Value::from(self.display_name));
        if let Some(instant) = self.last_modified {
            record = record.with_last_modified(instant);
        }
        if let Some(number) = self.number {
            record = record.with_field("number", Value::from(number));
        }
        if let Some(email) = self.email {
            record = record.with_field("email", Value::from(email));
        }
        if let Some(phone) = self.phone {
            record = record.with_field("phone", Value::from(phone));
        }
        if let Some(address) = self.address {
            record = record.with_field("address", Value::from(address));
        }
        if let Some(city) = self.city {
            record = record.with_field("city", Value::from(city));
        }
        if let Some(country) = self.country {
            record = record.with_field("country", Value::from(country));
        }
        if let Some(vat) = self.vat_registration_no {
            record = record.with_field("vat_number", Value::from(vat));
        }
        if let Some(blocked) = self.blocked {
            record = record.with_field("blocked", Value::from(blocked));
        }
        Some(record)
    }
}

/// Company listing entry, used for discovery and diagnostics.
#[derive(Debug, Deserialize)]
struct BcCompany {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

/// Business Central client.
pub struct BusinessCentralClient {
    config: BcConfig,
    odata: ODataClient,
    connected: RwLock<bool>,
    /// Discovered company id, cached for the session.
    company_id: RwLock<Option<String>>,
}

impl BusinessCentralClient {
    /// Create a client from validated configuration.
    pub fn new(config: BcConfig) -> ConnectorResult<Self> {
        config.validate()?;

        let token_cache = Arc::new(TokenCache::new(config.clone(), reqwest::Client::new()));
        let odata = ODataClient::new(&config, token_cache)?;

        Ok(Self {
            config,
            odata,
            connected: RwLock::new(false),
            company_id: RwLock::new(None),
        })
    }

    async fn ensure_connected(&self) -> ConnectorResult<()> {
        if *self.connected.read().await {
            Ok(())
        } else {
            Err(ConnectorError::NotConnected)
        }
    }

    /// The BC collection backing an entity kind, when one exists.
    fn collection_for(kind: EntityKind) -> Option<&'static str> {
        match kind {
            EntityKind::Contact => Some("customers"),
            EntityKind::Company => Some("vendors"),
            _ => None,
        }
    }

    /// The configured or discovered company id. `None` when the tenant
    /// exposes no companies at all.
    async fn resolve_company_id(&self) -> ConnectorResult<Option<String>> {
        if let Some(id) = &self.config.company_id {
            return Ok(Some(id.clone()));
        }
        if let Some(id) = self.company_id.read().await.clone() {
            return Ok(Some(id));
        }

        let companies: ODataCollection<BcCompany> = self
            .odata
            .get_collection("companies", &RecordFilter::default(), &PageRequest::new(1, 0))
            .await?;

        let discovered = companies.value.into_iter().next().map(|c| c.id);
        if let Some(id) = &discovered {
            debug!(company_id = %id, "discovered company id");
            *self.company_id.write().await = Some(id.clone());
        }
        Ok(discovered)
    }

    /// Translate a mapped CRM payload back to the BC wire shape.
    fn to_wire_body(payload: &CrmEntityPayload) -> Value {
        let display_name = match payload.kind {
            EntityKind::Contact => {
                let first = payload.get_str("first_name").unwrap_or_default();
                let last = payload.get_str("last_name").unwrap_or_default();
                if last.is_empty() {
                    first.to_string()
                } else {
                    format!("{first} {last}")
                }
            }
            _ => payload.get_str("name").unwrap_or_default().to_string(),
        };

        let mut map = serde_json::Map::new();
        map.insert("displayName".to_string(), Value::from(display_name));
        if let Some(email) = payload.get_str("email") {
            map.insert("email".to_string(), Value::from(email));
        }
        if let Some(phone) = payload.get_str("phone") {
            map.insert("phoneNumber".to_string(), Value::from(phone));
        }
        if let Some(address) = payload.get_str("address") {
            map.insert("address".to_string(), Value::from(address));
        }
        if let Some(city) = payload.get_str("city") {
            map.insert("city".to_string(), Value::from(city));
        }
        if let Some(country) = payload.get_str("country") {
            map.insert("country".to_string(), Value::from(country));
        }
        Value::Object(map)
    }
}

#[async_trait]
impl RemoteClient for BusinessCentralClient {
    fn source(&self) -> SyncSource {
        SyncSource::DynamicsBc
    }

    #[instrument(skip(self), fields(tenant_id = %self.config.tenant_id))]
    async fn connect(&self) -> ConnectorResult<()> {
        // Forces a token exchange when no valid token is cached, so a
        // successful connect guarantees an authenticated state.
        self.odata.token().await?;
        *self.connected.write().await = true;
        info!(environment = %self.config.environment, "connected to Business Central");
        Ok(())
    }

    async fn close(&self) {
        *self.connected.write().await = false;
    }

    #[instrument(skip(self, filter))]
    async fn fetch_page(
        &self,
        kind: EntityKind,
        filter: &RecordFilter,
        page: &PageRequest,
    ) -> ConnectorResult<FetchPage> {
        self.ensure_connected().await?;

        let Some(collection) = Self::collection_for(kind) else {
            warn!(%kind, "entity kind has no Business Central collection");
            return Ok(FetchPage::default());
        };
        let Some(company_id) = self.resolve_company_id().await? else {
            warn!("tenant exposes no companies");
            return Ok(FetchPage::default());
        };

        let path = format!("companies({company_id})/{collection}");
        let response: ODataCollection<BcPartyRecord> =
            self.odata.get_collection(&path, filter, page).await?;

        let fetched = response.value.len();
        // `$skip` paging carries no next-link; a full page means more may
        // remain and costs at most one extra empty fetch.
        let has_more = fetched == page.top as usize;

        let records: Vec<NormalizedRecord> = response
            .value
            .into_iter()
            .filter_map(|item| {
                let normalized = item.normalize();
                if normalized.is_none() {
                    warn!(%kind, "skipping record without id or number");
                }
                normalized
            })
            .collect();

        debug!(%kind, fetched, normalized = records.len(), has_more, "fetched page");
        Ok(FetchPage { records, has_more })
    }

    #[instrument(skip(self, payload), fields(external_id = %payload.external_id))]
    async fn push(
        &self,
        kind: EntityKind,
        payload: &CrmEntityPayload,
    ) -> ConnectorResult<PushOutcome> {
        self.ensure_connected().await?;

        let collection = Self::collection_for(kind).ok_or_else(|| {
            ConnectorError::invalid_configuration(format!(
                "entity kind '{kind}' cannot be pushed to Business Central"
            ))
        })?;
        let company_id = self.resolve_company_id().await?.ok_or_else(|| {
            ConnectorError::invalid_configuration("company id required for writes")
        })?;

        let body = Self::to_wire_body(payload);

        // An existing remote id means the record originated remotely or
        // was pushed before: update in place. Otherwise create.
        if payload.external_id.is_empty() {
            let path = format!("companies({company_id})/{collection}");
            let _created: BcPartyRecord = self.odata.post(&path, &body).await?;
            Ok(PushOutcome::Created)
        } else {
            let path = format!(
                "companies({company_id})/{collection}({})",
                payload.external_id
            );
            let _updated: BcPartyRecord = self.odata.patch(&path, &body).await?;
            Ok(PushOutcome::Updated)
        }
    }

    #[instrument(skip(self))]
    async fn test_connection(&self) -> ConnectionStatus {
        let companies: ConnectorResult<ODataCollection<BcCompany>> = self
            .odata
            .get_collection("companies", &RecordFilter::default(), &PageRequest::new(5, 0))
            .await;

        match companies {
            Ok(collection) => {
                let names: Vec<Value> = collection
                    .value
                    .iter()
                    .map(|c| json!({ "id": c.id, "name": c.name }))
                    .collect();
                ConnectionStatus::ok()
                    .with_detail("companies_found", collection.value.len())
                    .with_detail("companies", Value::from(names))
                    .with_detail("tenant", self.config.tenant_id.clone())
                    .with_detail("environment", self.config.environment.clone())
            }
            Err(err) => ConnectionStatus::failed(err.to_string()),
        }
    }
}

impl std::fmt::Debug for BusinessCentralClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusinessCentralClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn contact_payload(external_id: &str) -> CrmEntityPayload {
        let mut fields = BTreeMap::new();
        fields.insert("first_name".to_string(), Value::from("Jane"));
        fields.insert("last_name".to_string(), Value::from("Doe"));
        fields.insert("email".to_string(), Value::from("jane@example.test"));
        fields.insert("phone".to_string(), Value::from("+1 555 0101"));
        CrmEntityPayload {
            kind: EntityKind::Contact,
            source: SyncSource::DynamicsBc,
            external_id: external_id.to_string(),
            last_sync_at: Utc::now(),
            fields,
            raw: NormalizedRecord::new(external_id),
        }
    }

    #[test]
    fn normalize_prefers_id_over_number() {
        let record = BcPartyRecord {
            id: Some("guid-1".to_string()),
            number: Some("C00010".to_string()),
            display_name: "Jane Doe".to_string(),
            email: None,
            phone: None,
            address: None,
            city: None,
            country: None,
            vat_registration_no: None,
            blocked: None,
            last_modified: None,
        };
        let normalized = record.normalize().unwrap();
        assert_eq!(normalized.source_id, "guid-1");
        assert_eq!(normalized.get_str("number"), Some("C00010"));
    }

    #[test]
    fn normalize_falls_back_to_number() {
        let record = BcPartyRecord {
            id: None,
            number: Some("V00020".to_string()),
            display_name: "Acme Corp".to_string(),
            email: None,
            phone: None,
            address: None,
            city: None,
            country: None,
            vat_registration_no: None,
            blocked: None,
            last_modified: None,
        };
        assert_eq!(record.normalize().unwrap().source_id, "V00020");
    }

    #[test]
    fn normalize_without_any_id_is_dropped() {
        let record = BcPartyRecord {
            id: None,
            number: None,
            display_name: "Ghost".to_string(),
            email: None,
            phone: None,
            address: None,
            city: None,
            country: None,
            vat_registration_no: None,
            blocked: None,
            last_modified: None,
        };
        assert!(record.normalize().is_none());
    }

    #[test]
    fn wire_record_parses_bc_field_names() {
        let json = r#"{
            "id": "guid-1",
            "number": "C00010",
            "displayName": "Jane Doe",
            "email": "jane@example.test",
            "phoneNumber": "+1 555 0101",
            "taxRegistrationNo": "IT0001",
            "lastModifiedDateTime": "2024-03-01T10:00:00Z"
        }"#;
        let record: BcPartyRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.phone.as_deref(), Some("+1 555 0101"));
        assert_eq!(record.vat_registration_no.as_deref(), Some("IT0001"));
        assert_eq!(
            record.last_modified,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn wire_body_joins_contact_name() {
        let body = BusinessCentralClient::to_wire_body(&contact_payload("x"));
        assert_eq!(body["displayName"], "Jane Doe");
        assert_eq!(body["email"], "jane@example.test");
        assert_eq!(body["phoneNumber"], "+1 555 0101");
    }

    #[test]
    fn wire_body_single_token_name() {
        let mut payload = contact_payload("x");
        payload
            .fields
            .insert("last_name".to_string(), Value::from(""));
        payload
            .fields
            .insert("first_name".to_string(), Value::from("Prince"));
        let body = BusinessCentralClient::to_wire_body(&payload);
        assert_eq!(body["displayName"], "Prince");
    }
}
