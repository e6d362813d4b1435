//! OData v4 HTTP client for Business Central collections.

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use crmlink_connector::error::{ConnectorError, ConnectorResult};
use crmlink_connector::types::{PageRequest, RecordFilter};

use crate::auth::TokenCache;
use crate::config::BcConfig;

/// Timestamp field Business Central exposes for incremental filtering.
pub const MODIFIED_FIELD: &str = "lastModifiedDateTime";

/// Envelope for OData collection responses.
#[derive(Debug, Deserialize)]
pub struct ODataCollection<T> {
    pub value: Vec<T>,
}

/// Thin OData client: token injection, one forced refresh on 401,
/// `$top`/`$skip`/`$filter` query building, error classification.
pub struct ODataClient {
    http_client: reqwest::Client,
    token_cache: Arc<TokenCache>,
    base_url: String,
    timeout_secs: u64,
}

impl ODataClient {
    /// Build a client from the config.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` when the HTTP client cannot be built.
    pub fn new(config: &BcConfig, token_cache: Arc<TokenCache>) -> ConnectorResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                ConnectorError::invalid_configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            http_client,
            token_cache,
            base_url: config.api_base_url(),
            timeout_secs: config.timeout_secs,
        })
    }

    /// Obtain a valid bearer token, refreshing when needed.
    ///
    /// Used by `connect()` to force authentication before any data call.
    pub async fn token(&self) -> ConnectorResult<String> {
        self.token_cache.bearer().await
    }

    /// Read one page of a collection, e.g. `companies(id)/customers`.
    #[instrument(skip(self, filter))]
    pub async fn get_collection<T: DeserializeOwned>(
        &self,
        entity_path: &str,
        filter: &RecordFilter,
        page: &PageRequest,
    ) -> ConnectorResult<ODataCollection<T>> {
        let mut query: Vec<(&str, String)> = vec![
            ("$top", page.top.to_string()),
            ("$skip", page.skip.to_string()),
        ];
        if let Some(predicate) = filter.to_odata_filter(MODIFIED_FIELD) {
            query.push(("$filter", predicate));
        }

        self.request(Method::GET, entity_path, Some(&query), None::<&()>)
            .await
    }

    /// GET a single resource.
    pub async fn get<T: DeserializeOwned>(&self, entity_path: &str) -> ConnectorResult<T> {
        self.request(Method::GET, entity_path, None, None::<&()>)
            .await
    }

    /// POST a new resource.
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        entity_path: &str,
        body: &B,
    ) -> ConnectorResult<T> {
        self.request(Method::POST, entity_path, None, Some(body))
            .await
    }

    /// PATCH an existing resource with `If-Match: *`.
    pub async fn patch<T: DeserializeOwned, B: Serialize>(
        &self,
        entity_path: &str,
        body: &B,
    ) -> ConnectorResult<T> {
        self.request(Method::PATCH, entity_path, None, Some(body))
            .await
    }

    /// Issue one request with token injection.
    ///
    /// A 401 invalidates the token cache and retries exactly once with a
    /// fresh token; a second 401 is an authentication failure, not a
    /// remote API error.
    async fn request<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        entity_path: &str,
        query: Option<&[(&str, String)]>,
        body: Option<&B>,
    ) -> ConnectorResult<T> {
        let url = format!("{}/{}", self.base_url, entity_path.trim_start_matches('/'));
        let mut refreshed = false;

        loop {
            let token = self.token_cache.bearer().await?;

            let mut request = self
                .http_client
                .request(method.clone(), &url)
                .header("Accept", "application/json")
                .bearer_auth(&token);
            if let Some(query) = query {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }
            // OData updates require optimistic concurrency; match any etag.
            if method == Method::PATCH {
                request = request.header("If-Match", "*");
            }

            let response = request.send().await.map_err(|e| {
                if e.is_timeout() {
                    ConnectorError::Timeout {
                        timeout_secs: self.timeout_secs,
                    }
                } else {
                    ConnectorError::from(e)
                }
            })?;

            let status = response.status();

            if status == StatusCode::UNAUTHORIZED {
                if refreshed {
                    let www = response.text().await.unwrap_or_default();
                    return Err(ConnectorError::authentication(format!(
                        "request rejected after token refresh: {www}"
                    )));
                }
                debug!("401 from remote, forcing token refresh");
                self.token_cache.invalidate().await;
                refreshed = true;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ConnectorError::remote_api(status.as_u16(), body));
            }

            return response.json().await.map_err(ConnectorError::from);
        }
    }
}

impl std::fmt::Debug for ODataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ODataClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_envelope_parses() {
        #[derive(Debug, Deserialize)]
        struct Item {
            id: String,
        }

        let json = r#"{"value": [{"id": "a"}, {"id": "b"}]}"#;
        let parsed: ODataCollection<Item> = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.value.len(), 2);
        assert_eq!(parsed.value[0].id, "a");
    }
}
