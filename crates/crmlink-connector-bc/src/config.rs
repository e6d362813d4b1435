//! Business Central connection configuration.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crmlink_connector::error::{ConnectorError, ConnectorResult};
use crmlink_connector::types::{MAX_PAGE_SIZE, MIN_PAGE_SIZE};

const DEFAULT_API_HOST: &str = "https://api.businesscentral.dynamics.com";
const DEFAULT_LOGIN_HOST: &str = "https://login.microsoftonline.com";
const DEFAULT_PAGE_SIZE: u32 = 100;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for one Business Central environment.
#[derive(Clone, Deserialize)]
pub struct BcConfig {
    /// Azure AD tenant id.
    pub tenant_id: String,
    /// BC environment name, e.g. "production" or "sandbox".
    #[serde(default = "default_environment")]
    pub environment: String,
    /// BC company id. Discovered from `/companies` when absent.
    #[serde(default)]
    pub company_id: Option<String>,
    /// OAuth2 application (client) id.
    pub client_id: String,
    /// OAuth2 client secret.
    pub client_secret: SecretString,
    /// Full API base URL override. When absent the standard
    /// `https://api.businesscentral.dynamics.com/v2.0/{tenant}/{env}/api/v2.0`
    /// is used.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Token endpoint host override. Defaults to the Microsoft login host;
    /// tests point this at a mock server.
    #[serde(default)]
    pub login_base_url: Option<String>,
    /// Records per page for collection reads.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Upper bound for each remote call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_environment() -> String {
    "production".to_string()
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl BcConfig {
    /// Create a config with defaults for the optional fields.
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            environment: default_environment(),
            company_id: None,
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
            base_url: None,
            login_base_url: None,
            page_size: DEFAULT_PAGE_SIZE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Set the environment name (builder pattern).
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Pin the company id instead of discovering it.
    pub fn with_company_id(mut self, company_id: impl Into<String>) -> Self {
        self.company_id = Some(company_id.into());
        self
    }

    /// Override the API base URL (tests, sovereign clouds).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Override the token endpoint host.
    pub fn with_login_base_url(mut self, login_base_url: impl Into<String>) -> Self {
        self.login_base_url = Some(login_base_url.into());
        self
    }

    /// Set the collection page size, clamped to service limits.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE);
        self
    }

    /// Set the per-call timeout.
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Validate that the credential triple is present.
    pub fn validate(&self) -> ConnectorResult<()> {
        if self.tenant_id.trim().is_empty() {
            return Err(ConnectorError::invalid_configuration("tenant_id is required"));
        }
        if self.client_id.trim().is_empty() {
            return Err(ConnectorError::invalid_configuration("client_id is required"));
        }
        if self.client_secret.expose_secret().is_empty() {
            return Err(ConnectorError::invalid_configuration(
                "client_secret is required",
            ));
        }
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(ConnectorError::invalid_configuration(format!(
                "page_size must be between {MIN_PAGE_SIZE} and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(())
    }

    /// The API base URL, trailing slash trimmed.
    pub fn api_base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!(
                "{DEFAULT_API_HOST}/v2.0/{}/{}/api/v2.0",
                self.tenant_id, self.environment
            ),
        }
    }

    /// The OAuth2 token endpoint for this tenant.
    pub fn token_url(&self) -> String {
        let host = self
            .login_base_url
            .as_deref()
            .unwrap_or(DEFAULT_LOGIN_HOST)
            .trim_end_matches('/');
        format!("{host}/{}/oauth2/v2.0/token", self.tenant_id)
    }

    /// The OAuth2 scope requested in the client-credentials grant.
    pub fn token_scope(&self) -> String {
        format!("{DEFAULT_API_HOST}/.default")
    }
}

impl std::fmt::Debug for BcConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BcConfig")
            .field("tenant_id", &self.tenant_id)
            .field("environment", &self.environment)
            .field("company_id", &self.company_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("page_size", &self.page_size)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_base_url() {
        let config = BcConfig::new("tenant-1", "app-1", "secret").with_environment("sandbox");
        assert_eq!(
            config.api_base_url(),
            "https://api.businesscentral.dynamics.com/v2.0/tenant-1/sandbox/api/v2.0"
        );
    }

    #[test]
    fn base_url_override_trims_slash() {
        let config =
            BcConfig::new("tenant-1", "app-1", "secret").with_base_url("http://localhost:9999/");
        assert_eq!(config.api_base_url(), "http://localhost:9999");
    }

    #[test]
    fn token_url_uses_tenant() {
        let config = BcConfig::new("tenant-1", "app-1", "secret");
        assert_eq!(
            config.token_url(),
            "https://login.microsoftonline.com/tenant-1/oauth2/v2.0/token"
        );
    }

    #[test]
    fn validate_rejects_missing_credentials() {
        assert!(BcConfig::new("", "app", "secret").validate().is_err());
        assert!(BcConfig::new("tenant", "", "secret").validate().is_err());
        assert!(BcConfig::new("tenant", "app", "").validate().is_err());
        assert!(BcConfig::new("tenant", "app", "secret").validate().is_ok());
    }

    #[test]
    fn page_size_is_clamped() {
        let config = BcConfig::new("t", "a", "s").with_page_size(0);
        assert_eq!(config.page_size, 1);
        let config = BcConfig::new("t", "a", "s").with_page_size(10_000);
        assert_eq!(config.page_size, 1000);
    }

    #[test]
    fn debug_redacts_secret() {
        let config = BcConfig::new("tenant", "app", "super-secret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
