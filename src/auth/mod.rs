//! Bearer token validation for the protected MCP surface.
//!
//! Two middleware variants share one validation path:
//!
//! - **strict** (`POST /mcp`): a missing or malformed Authorization
//!   header yields HTTP 401 with a `WWW-Authenticate` challenge naming
//!   the Protected Resource Metadata URL. That challenge is what starts
//!   an MCP client's discovery cycle.
//! - **permissive** (`GET /mcp` streaming): no token means anonymous
//!   passthrough; a token that is present is still verified in full.
//!
//! Validation failures log the specific cause server-side and render an
//! undifferentiated 401 to the client.

pub mod jwks;

use std::sync::Arc;

use axum::Json;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::config::{Config, defaults};
use crate::error::AuthError;

pub use jwks::JwksCache;

/// The validated identity attached to each authenticated request.
#[derive(Debug, Clone)]
pub struct UserIdentity {
    /// The raw bearer token, retained for On-Behalf-Of exchange.
    pub token: String,
    /// The `aud` claim: the IdP application the token was issued for.
    pub client_id: String,
    /// Scopes parsed from the `scp` claim.
    pub scopes: Vec<String>,
    /// Stable per-tenant user identifier; partition key for user data.
    pub oid: String,
    pub name: Option<String>,
    pub preferred_username: Option<String>,
    pub sub: Option<String>,
    pub tid: Option<String>,
}

impl UserIdentity {
    /// Check whether the token carries a scope.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// Display label: `name`, then `preferred_username`, then `oid`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.preferred_username.as_deref())
            .unwrap_or(&self.oid)
    }
}

/// Claims the gateway reads from IdP-issued access tokens.
#[derive(Debug, Deserialize)]
struct TokenClaims {
    aud: String,
    oid: Option<String>,
    scp: Option<String>,
    name: Option<String>,
    preferred_username: Option<String>,
    sub: Option<String>,
    tid: Option<String>,
}

/// Verifies inbound JWTs against the IdP's published signing keys.
#[derive(Clone, Debug)]
pub struct TokenValidator {
    jwks: JwksCache,
    jwks_uri: String,
    issuer: String,
    audience: String,
}

impl TokenValidator {
    /// Create a validator from gateway configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the JWKS HTTP client cannot be built.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            jwks: JwksCache::new(config.idp_timeout, config.connect_timeout)?,
            jwks_uri: config.jwks_uri(),
            issuer: config.issuer(),
            audience: config.audience().to_owned(),
        })
    }

    /// Validate a bearer token and extract the user identity.
    ///
    /// RS256 only; `iss`, `aud`, and `exp` (with 60 s skew) are enforced,
    /// `nbf` is honored when present, and `oid` is required.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] naming the failed check; callers must not
    /// forward the variant to the client.
    pub async fn validate(&self, token: &str) -> Result<UserIdentity, AuthError> {
        let header =
            jsonwebtoken::decode_header(token).map_err(|_| AuthError::MalformedHeader)?;

        if header.alg != Algorithm::RS256 {
            return Err(AuthError::MalformedHeader);
        }
        let kid = header.kid.ok_or(AuthError::MalformedHeader)?;

        let jwks = self.jwks.get(&self.jwks_uri).await?;
        let jwk = jwks.find(&kid).ok_or_else(|| AuthError::UnknownKey { kid: kid.clone() })?;
        let key = DecodingKey::from_jwk(jwk).map_err(AuthError::Invalid)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.leeway = defaults::JWT_LEEWAY.as_secs();
        validation.validate_nbf = true;

        let data = jsonwebtoken::decode::<TokenClaims>(token, &key, &validation)?;
        let claims = data.claims;

        let oid = claims.oid.ok_or(AuthError::MissingOid)?;
        let scopes = claims
            .scp
            .map(|s| s.split_whitespace().map(String::from).collect())
            .unwrap_or_default();

        Ok(UserIdentity {
            token: token.to_owned(),
            client_id: claims.aud,
            scopes,
            oid,
            name: claims.name,
            preferred_username: claims.preferred_username,
            sub: claims.sub,
            tid: claims.tid,
        })
    }
}

/// State shared by the auth middleware.
#[derive(Clone)]
pub struct AuthLayerState {
    pub validator: TokenValidator,
    /// Absolute PRM URL named in the 401 challenge.
    pub resource_metadata_url: String,
}

/// Strict variant: reject requests without a valid bearer token.
pub async fn require_bearer(
    State(auth): State<Arc<AuthLayerState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let result = match extract_bearer(&request) {
        Some(token) => auth.validator.validate(&token).await,
        None => Err(AuthError::MissingToken),
    };

    match result {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(err) => {
            tracing::warn!(error = %err, path = %request.uri().path(), "Bearer token rejected");
            let description = match err {
                AuthError::MissingToken => "authentication required",
                _ => "invalid token",
            };
            challenge_response(&auth, description)
        }
    }
}

/// Permissive variant: anonymous requests pass through, but a token that
/// is present must still verify.
pub async fn optional_bearer(
    State(auth): State<Arc<AuthLayerState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = extract_bearer(&request) else {
        return next.run(request).await;
    };

    match auth.validator.validate(&token).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(err) => {
            tracing::warn!(error = %err, path = %request.uri().path(), "Bearer token rejected");
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "unauthorized" })),
            )
                .into_response()
        }
    }
}

fn extract_bearer(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_owned)
}

/// 401 with the RFC 6750 challenge pointing at the PRM document.
fn challenge_response(auth: &AuthLayerState, description: &str) -> Response {
    let challenge = format!(
        "Bearer resource_metadata=\"{}\"",
        auth.resource_metadata_url
    );

    let mut response = (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "unauthorized",
            "error_description": description,
        })),
    )
        .into_response();

    if let Ok(value) = HeaderValue::from_str(&challenge) {
        response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
    }
    response
}
