//! Outbound client for the IdP token endpoint.
//!
//! A thin form-POST wrapper used by the callback (code exchange), the
//! token endpoint (refresh proxying), and the delegation helper (OBO).
//! No retry middleware: authorization codes are single-use at the IdP,
//! so a retried exchange can only ever fail.

use serde::Deserialize;

use crate::config::Config;
use crate::error::IdpError;

/// Tokens returned by the IdP.
#[derive(Debug, Clone, Deserialize)]
pub struct IdpTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    #[serde(default)]
    pub scope: String,
}

fn default_expires_in() -> i64 {
    3600
}

/// OAuth error payload from the IdP.
#[derive(Debug, Deserialize)]
struct IdpErrorBody {
    error: String,
    error_description: Option<String>,
}

/// HTTP client for the IdP's token endpoint.
#[derive(Clone)]
pub struct IdpClient {
    http: reqwest::Client,
    token_endpoint: String,
    client_id: String,
    client_secret: Option<String>,
}

impl IdpClient {
    /// Create a new IdP client from gateway configuration.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.idp_timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http,
            token_endpoint: config.idp_token_endpoint(),
            client_id: config.idp_client_id.clone(),
            client_secret: config.idp_client_secret.clone(),
        })
    }

    /// Exchange an IdP authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns [`IdpError::Rejected`] on an IdP error payload and
    /// [`IdpError::Http`] on connectivity failure.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: &str,
    ) -> Result<IdpTokens, IdpError> {
        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("code_verifier", code_verifier),
        ];
        if let Some(ref secret) = self.client_secret {
            form.push(("client_secret", secret));
        }

        self.post_token_form(&form).await
    }

    /// Redeem a refresh token at the IdP.
    ///
    /// # Errors
    ///
    /// Mirrors the IdP's success or error outcome.
    pub async fn refresh(&self, refresh_token: &str, scope: &str) -> Result<IdpTokens, IdpError> {
        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("scope", scope),
        ];
        if let Some(ref secret) = self.client_secret {
            form.push(("client_secret", secret));
        }

        self.post_token_form(&form).await
    }

    /// Perform an On-Behalf-Of exchange (RFC 7523 jwt-bearer grant).
    ///
    /// # Errors
    ///
    /// Returns [`IdpError::Rejected`] when the user lacks delegated
    /// consent for the requested scopes.
    pub async fn on_behalf_of(
        &self,
        assertion: &str,
        scope: &str,
        client_secret: &str,
    ) -> Result<IdpTokens, IdpError> {
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", client_secret),
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", assertion),
            ("requested_token_use", "on_behalf_of"),
            ("scope", scope),
        ];

        self.post_token_form(&form).await
    }

    async fn post_token_form(&self, form: &[(&str, &str)]) -> Result<IdpTokens, IdpError> {
        let response = self.http.post(&self.token_endpoint).form(form).send().await?;

        let status = response.status();
        let body = response.bytes().await?;

        if status.is_success() {
            return Ok(serde_json::from_slice(&body)?);
        }

        // Non-2xx: prefer the IdP's own error payload.
        match serde_json::from_slice::<IdpErrorBody>(&body) {
            Ok(err) => Err(IdpError::rejected(err.error, err.error_description)),
            Err(_) => Err(IdpError::rejected(
                "server_error",
                Some(format!("IdP returned HTTP {status}")),
            )),
        }
    }
}

impl std::fmt::Debug for IdpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdpClient")
            .field("token_endpoint", &self.token_endpoint)
            .field("client_id", &self.client_id)
            .finish()
    }
}
