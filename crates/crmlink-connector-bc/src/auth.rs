//! OAuth2 client-credentials authentication against Azure AD.

use chrono::{DateTime, Duration, Utc};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crmlink_connector::error::{ConnectorError, ConnectorResult};

use crate::config::BcConfig;

/// Token response from the identity provider.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// A cached bearer token with its expiry instant.
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// True when the token is expired or inside the safety margin.
    fn is_expiring(&self, margin: Duration) -> bool {
        Utc::now() + margin >= self.expires_at
    }
}

/// Bearer-token cache for one Business Central client.
///
/// State machine: no token → valid → expiring (inside the margin) →
/// valid after a successful refresh, or back to no token on refresh
/// failure. The refresh runs under the write lock, so concurrent callers
/// on an expiring token wait for the in-flight refresh instead of
/// issuing duplicates.
pub struct TokenCache {
    config: BcConfig,
    http_client: reqwest::Client,
    cached: RwLock<Option<CachedToken>>,
    /// Refresh this far before expiry.
    margin: Duration,
}

impl TokenCache {
    /// Create a cache with the default 5-minute expiry margin.
    pub fn new(config: BcConfig, http_client: reqwest::Client) -> Self {
        Self {
            config,
            http_client,
            cached: RwLock::new(None),
            margin: Duration::minutes(5),
        }
    }

    /// Get a bearer token that is valid for at least the safety margin,
    /// refreshing first when necessary.
    #[instrument(skip(self), fields(tenant_id = %self.config.tenant_id))]
    pub async fn bearer(&self) -> ConnectorResult<String> {
        {
            let cached = self.cached.read().await;
            if let Some(token) = cached.as_ref() {
                if !token.is_expiring(self.margin) {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let mut cached = self.cached.write().await;
        // Another caller may have refreshed while we waited for the lock.
        if let Some(token) = cached.as_ref() {
            if !token.is_expiring(self.margin) {
                return Ok(token.access_token.clone());
            }
        }

        debug!("refreshing access token");
        match self.exchange().await {
            Ok(token) => {
                let bearer = token.access_token.clone();
                *cached = Some(token);
                Ok(bearer)
            }
            Err(err) => {
                // Leave the cache empty so the next call retries the
                // refresh rather than a doomed request.
                *cached = None;
                Err(err)
            }
        }
    }

    /// Drop the cached token, forcing a refresh on next use.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }

    /// Perform the client-credentials exchange.
    async fn exchange(&self) -> ConnectorResult<CachedToken> {
        self.config.validate()?;

        let scope = self.config.token_scope();
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose_secret()),
            ("scope", scope.as_str()),
        ];

        let response = self
            .http_client
            .post(self.config.token_url())
            .form(&params)
            .send()
            .await
            .map_err(|e| ConnectorError::authentication(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::authentication(format!(
                "token request failed with status {status}: {body}"
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            ConnectorError::authentication(format!("invalid token response: {e}"))
        })?;

        let expires_at = Utc::now() + Duration::seconds(token.expires_in);
        debug!(%expires_at, "acquired access token");

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at,
        })
    }
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_outside_margin_is_usable() {
        let token = CachedToken {
            access_token: "t".to_string(),
            expires_at: Utc::now() + Duration::minutes(10),
        };
        assert!(!token.is_expiring(Duration::minutes(5)));
    }

    #[test]
    fn token_inside_margin_is_expiring() {
        let token = CachedToken {
            access_token: "t".to_string(),
            expires_at: Utc::now() + Duration::minutes(3),
        };
        assert!(token.is_expiring(Duration::minutes(5)));
    }

    #[test]
    fn expired_token_is_expiring() {
        let token = CachedToken {
            access_token: "t".to_string(),
            expires_at: Utc::now() - Duration::minutes(1),
        };
        assert!(token.is_expiring(Duration::zero()));
    }
}
