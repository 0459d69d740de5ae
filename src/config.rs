//! Configuration for the MCP auth gateway.

use std::time::Duration;

/// Gateway timing and sizing constants.
pub mod defaults {
    use std::time::Duration;

    /// Pending authorization transaction lifetime.
    pub const TRANSACTION_TTL: Duration = Duration::from_secs(600);

    /// Proxy authorization code lifetime.
    pub const AUTH_CODE_TTL: Duration = Duration::from_secs(300);

    /// Sweep interval for expired transactions and codes.
    pub const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

    /// JWKS document cache lifetime.
    pub const JWKS_CACHE_TTL: Duration = Duration::from_secs(600);

    /// Maximum cached JWKS documents (tolerates key rotation overlap).
    pub const JWKS_CACHE_CAPACITY: u64 = 5;

    /// Maximum outbound JWKS fetches per minute.
    pub const JWKS_FETCH_PER_MINUTE: usize = 10;

    /// Clock skew tolerance for JWT expiry checks.
    pub const JWT_LEEWAY: Duration = Duration::from_secs(60);

    /// Outbound IdP request timeout.
    pub const IDP_TIMEOUT: Duration = Duration::from_secs(10);

    /// Outbound connection timeout.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Maximum dynamically registered clients held in memory.
    pub const MAX_REGISTRATIONS: usize = 4096;

    /// Companion scopes requested from the IdP alongside the API scope.
    pub const OIDC_SCOPES: &str = "openid profile email offline_access";
}

/// Gateway configuration.
///
/// The gateway is a pre-registered confidential client at the IdP; MCP
/// clients register dynamically with the gateway instead.
#[derive(Debug, Clone)]
pub struct Config {
    /// IdP tenant identifier.
    pub tenant_id: String,

    /// The gateway's client ID at the IdP.
    pub idp_client_id: String,

    /// The gateway's client secret at the IdP.
    pub idp_client_secret: Option<String>,

    /// IdP host, e.g. `https://login.microsoftonline.com`.
    pub idp_host: String,

    /// Public base URL of this gateway (no trailing slash).
    pub base_url: String,

    /// The API scope the gateway exposes and enforces as `aud`.
    pub api_scope: String,

    /// Outbound request timeout.
    pub idp_timeout: Duration,

    /// Outbound connection timeout.
    pub connect_timeout: Duration,

    /// Pending transaction lifetime.
    pub transaction_ttl: Duration,

    /// Proxy code lifetime.
    pub auth_code_ttl: Duration,
}

impl Config {
    /// Create a configuration from explicit IdP coordinates.
    #[must_use]
    pub fn new(
        tenant_id: String,
        idp_client_id: String,
        idp_client_secret: Option<String>,
        base_url: String,
        api_scope: String,
    ) -> Self {
        Self {
            tenant_id,
            idp_client_id,
            idp_client_secret,
            idp_host: "https://login.microsoftonline.com".to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_scope,
            idp_timeout: defaults::IDP_TIMEOUT,
            connect_timeout: defaults::CONNECT_TIMEOUT,
            transaction_ttl: defaults::TRANSACTION_TTL,
            auth_code_ttl: defaults::AUTH_CODE_TTL,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns error if a required variable is missing.
    pub fn from_env() -> anyhow::Result<Self> {
        let tenant_id = require_env("IDP_TENANT_ID")?;
        let idp_client_id = require_env("IDP_CLIENT_ID")?;
        let idp_client_secret = std::env::var("IDP_CLIENT_SECRET").ok();
        let base_url = require_env("GATEWAY_BASE_URL")?;
        let api_scope = require_env("GATEWAY_API_SCOPE")?;

        Ok(Self::new(tenant_id, idp_client_id, idp_client_secret, base_url, api_scope))
    }

    /// Create a test configuration pointed at a mock IdP.
    #[must_use]
    pub fn for_testing(idp_host: &str, base_url: &str) -> Self {
        let mut config = Self::new(
            "test-tenant".to_string(),
            "gateway-client-id".to_string(),
            Some("gateway-client-secret".to_string()),
            base_url.to_string(),
            "api://mcp-access".to_string(),
        );
        config.idp_host = idp_host.trim_end_matches('/').to_string();
        config.idp_timeout = Duration::from_secs(5);
        config.connect_timeout = Duration::from_secs(2);
        config
    }

    /// IdP authority URL: `<host>/<tenant>`.
    #[must_use]
    pub fn authority(&self) -> String {
        format!("{}/{}", self.idp_host, self.tenant_id)
    }

    /// IdP authorization endpoint.
    #[must_use]
    pub fn idp_authorize_endpoint(&self) -> String {
        format!("{}/oauth2/v2.0/authorize", self.authority())
    }

    /// IdP token endpoint.
    #[must_use]
    pub fn idp_token_endpoint(&self) -> String {
        format!("{}/oauth2/v2.0/token", self.authority())
    }

    /// IdP signing key discovery URL.
    #[must_use]
    pub fn jwks_uri(&self) -> String {
        format!("{}/discovery/v2.0/keys", self.authority())
    }

    /// Expected `iss` claim on inbound tokens.
    #[must_use]
    pub fn issuer(&self) -> String {
        format!("{}/v2.0", self.authority())
    }

    /// Expected `aud` claim on inbound tokens.
    #[must_use]
    pub fn audience(&self) -> &str {
        &self.api_scope
    }

    /// The gateway's fixed redirect URI at the IdP.
    #[must_use]
    pub fn callback_url(&self) -> String {
        format!("{}/auth/callback", self.base_url)
    }

    /// Protected resource metadata URL, used in 401 challenges.
    #[must_use]
    pub fn resource_metadata_url(&self) -> String {
        format!("{}/.well-known/oauth-protected-resource", self.base_url)
    }

    /// The protected MCP endpoint URL.
    #[must_use]
    pub fn mcp_resource_url(&self) -> String {
        format!("{}/mcp", self.base_url)
    }

    /// Scope string sent to the IdP: the API scope plus OIDC companions.
    #[must_use]
    pub fn composite_scope(&self) -> String {
        format!("{} {}", self.api_scope, defaults::OIDC_SCOPES)
    }
}

fn require_env(name: &str) -> anyhow::Result<String> {
    std::env::var(name).map_err(|_| anyhow::anyhow!("missing required environment variable {name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_urls() {
        let config = Config::new(
            "tenant1".into(),
            "app1".into(),
            Some("secret".into()),
            "https://gw.example.com/".into(),
            "api://mcp-access".into(),
        );

        assert_eq!(config.base_url, "https://gw.example.com");
        assert_eq!(config.authority(), "https://login.microsoftonline.com/tenant1");
        assert_eq!(
            config.jwks_uri(),
            "https://login.microsoftonline.com/tenant1/discovery/v2.0/keys"
        );
        assert_eq!(config.issuer(), "https://login.microsoftonline.com/tenant1/v2.0");
        assert_eq!(config.callback_url(), "https://gw.example.com/auth/callback");
    }

    #[test]
    fn test_composite_scope_includes_offline_access() {
        let config = Config::for_testing("http://idp.localhost", "https://gw.example.com");
        let scope = config.composite_scope();
        assert!(scope.starts_with("api://mcp-access"));
        assert!(scope.contains("offline_access"));
    }

    #[test]
    fn test_for_testing_overrides_idp_host() {
        let config = Config::for_testing("http://127.0.0.1:9999/", "http://gw.localhost");
        assert_eq!(config.idp_token_endpoint(), "http://127.0.0.1:9999/test-tenant/oauth2/v2.0/token");
    }
}
