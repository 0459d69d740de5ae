//! OAuth data model: registrations, pending transactions, proxy codes.

use std::time::Instant;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

/// A dynamically registered MCP client (RFC 7591).
///
/// Never mutated after creation.
#[derive(Debug, Clone)]
pub struct ClientRegistration {
    pub client_id: String,
    pub client_name: Option<String>,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
    pub token_endpoint_auth_method: String,
    pub created_at: Instant,
    /// Unix timestamp echoed back as `client_id_issued_at`.
    pub issued_at: i64,
}

/// A pending authorization request while the user is at the IdP.
///
/// Keyed by `proxy_state`; consumed exactly once by the callback.
#[derive(Debug)]
pub struct AuthTransaction {
    pub client_id: String,
    pub client_redirect_uri: String,
    pub client_state: Option<String>,
    pub client_code_challenge: String,
    pub client_code_challenge_method: String,
    /// The gateway's own PKCE verifier for the IdP leg.
    pub proxy_code_verifier: String,
    pub requested_scope: String,
    pub created_at: Instant,
}

/// A one-shot proxy code redeemable at `/token`, holding the IdP tokens
/// obtained in the callback plus the client's PKCE commitment.
#[derive(Debug)]
pub struct AuthorizationCodeRecord {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub scope: String,
    pub client_code_challenge: String,
    pub client_code_challenge_method: String,
    pub created_at: Instant,
}

/// Client registration request body (RFC 7591).
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub client_name: Option<String>,
    pub redirect_uris: Option<Vec<String>>,
    #[serde(default)]
    pub grant_types: Vec<String>,
    #[serde(default)]
    pub response_types: Vec<String>,
    pub token_endpoint_auth_method: Option<String>,
}

/// Query parameters for `GET /authorize`.
#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub response_type: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub scope: Option<String>,
}

/// Query parameters for `GET /auth/callback` (IdP redirect).
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Form parameters for `POST /token`.
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    pub code: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
}

/// Token response returned to the MCP client.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub scope: String,
}

/// OAuth error body (RFC 6749 §5.2) with stable error codes.
#[derive(Debug, Serialize)]
pub struct OAuthError {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl OAuthError {
    #[must_use]
    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self { error: "invalid_request", error_description: Some(description.into()) }
    }

    #[must_use]
    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self { error: "invalid_grant", error_description: Some(description.into()) }
    }

    #[must_use]
    pub fn invalid_state() -> Self {
        Self { error: "invalid_state", error_description: None }
    }

    #[must_use]
    pub fn unsupported_response_type() -> Self {
        Self {
            error: "unsupported_response_type",
            error_description: Some("response_type must be 'code'".into()),
        }
    }

    #[must_use]
    pub fn unsupported_grant_type(grant_type: &str) -> Self {
        Self {
            error: "unsupported_grant_type",
            error_description: Some(format!("grant_type '{grant_type}' not supported")),
        }
    }

    #[must_use]
    pub fn server_error(correlation_id: &str) -> Self {
        Self {
            error: "server_error",
            error_description: Some(format!("internal error, correlation id {correlation_id}")),
        }
    }

    /// Render as an HTTP 400 response.
    #[must_use]
    pub fn into_bad_request(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(self)).into_response()
    }

    /// Render as an HTTP 500 response.
    #[must_use]
    pub fn into_server_error(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self)).into_response()
    }
}

impl AuthTransaction {
    /// Check whether the transaction has outlived its TTL.
    pub fn is_expired(&self, ttl: std::time::Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

impl AuthorizationCodeRecord {
    /// Check whether the code has outlived its TTL.
    pub fn is_expired(&self, ttl: std::time::Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}
