//! On-Behalf-Of delegation.
//!
//! Exchanges a validated inbound token for a downstream-API token using
//! the gateway's confidential credentials, so the downstream API sees
//! the user's identity rather than the gateway's.
//!
//! Failures here are tool-level: the user is already authenticated to
//! the gateway, they may just lack delegated consent.

use tokio::sync::OnceCell;

use crate::auth::UserIdentity;
use crate::config::Config;
use crate::error::OboError;
use crate::idp::IdpClient;

/// Process-wide delegation helper.
///
/// The confidential-client object is initialized lazily on first use and
/// reused for the lifetime of the process.
pub struct DelegationHelper {
    config: Config,
    client: OnceCell<IdpClient>,
}

impl DelegationHelper {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config, client: OnceCell::new() }
    }

    /// Acquire a downstream access token for the given scopes.
    ///
    /// # Errors
    ///
    /// [`OboError::MissingCredentials`] when the gateway has no client
    /// secret configured; [`OboError::Rejected`] when the IdP refuses
    /// the exchange.
    pub async fn acquire_token(
        &self,
        identity: &UserIdentity,
        scopes: &[&str],
    ) -> Result<String, OboError> {
        let secret = self
            .config
            .idp_client_secret
            .as_deref()
            .ok_or(OboError::MissingCredentials)?;

        let client = self
            .client
            .get_or_try_init(|| async { IdpClient::new(&self.config) })
            .await
            .map_err(|_| OboError::MissingCredentials)?;

        let scope = scopes.join(" ");
        tracing::debug!(oid = %identity.oid, scope = %scope, "Performing on-behalf-of exchange");

        let tokens = client.on_behalf_of(&identity.token, &scope, secret).await?;
        if tokens.access_token.is_empty() {
            return Err(OboError::MissingAccessToken);
        }
        Ok(tokens.access_token)
    }
}

impl std::fmt::Debug for DelegationHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegationHelper")
            .field("initialized", &self.client.initialized())
            .finish()
    }
}
