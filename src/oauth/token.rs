//! `POST /token` and `POST /revoke`.
//!
//! The authorization-code grant redeems a single-use proxy code and
//! verifies the client's PKCE. The refresh grant is proxied straight
//! through to the IdP with the gateway's confidential credentials.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};

use crate::error::IdpError;
use crate::server::AppState;

use super::models::{OAuthError, TokenRequest, TokenResponse};
use super::pkce;

/// `POST /token`: authorization_code or refresh_token grant.
pub async fn token(State(state): State<Arc<AppState>>, Form(request): Form<TokenRequest>) -> Response {
    match request.grant_type.as_str() {
        "authorization_code" => authorization_code_grant(&state, &request).await,
        "refresh_token" => refresh_token_grant(&state, &request).await,
        other => OAuthError::unsupported_grant_type(other).into_bad_request(),
    }
}

/// `POST /revoke`: RFC 7009 no-op.
///
/// Proxy codes are consumed on use and refresh handling is delegated to
/// the IdP, so there is no local state to clear.
pub async fn revoke() -> Response {
    StatusCode::OK.into_response()
}

async fn authorization_code_grant(state: &AppState, request: &TokenRequest) -> Response {
    let Some(ref code) = request.code else {
        return OAuthError::invalid_request("code is required").into_bad_request();
    };

    // Deleted on first read regardless of what follows.
    let Some(record) = state.oauth.consume_code(code).await else {
        return OAuthError::invalid_grant("invalid or expired authorization code").into_bad_request();
    };

    if !record.client_code_challenge.is_empty() {
        let verifier = request.code_verifier.as_deref().unwrap_or("");
        let verified = match record.client_code_challenge_method.as_str() {
            "S256" => pkce::verify_s256(verifier, &record.client_code_challenge),
            "plain" => pkce::verify_plain(verifier, &record.client_code_challenge),
            _ => false,
        };
        if !verified {
            return OAuthError::invalid_grant("PKCE verification failed").into_bad_request();
        }
    }

    tracing::info!(path = "/token", "Redeemed proxy authorization code");

    token_success(TokenResponse {
        access_token: record.access_token,
        token_type: "Bearer",
        expires_in: record.expires_in,
        refresh_token: record.refresh_token,
        scope: record.scope,
    })
}

async fn refresh_token_grant(state: &AppState, request: &TokenRequest) -> Response {
    let Some(ref refresh_token) = request.refresh_token else {
        return OAuthError::invalid_request("refresh_token is required").into_bad_request();
    };

    match state.idp.refresh(refresh_token, &state.config.composite_scope()).await {
        Ok(tokens) => token_success(TokenResponse {
            access_token: tokens.access_token,
            token_type: "Bearer",
            expires_in: tokens.expires_in,
            refresh_token: tokens.refresh_token,
            scope: tokens.scope,
        }),
        Err(IdpError::Rejected { error, description }) => {
            tracing::warn!(error = %error, path = "/token", "IdP rejected refresh");
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "error": error,
                    "error_description": description,
                })),
            )
                .into_response()
        }
        Err(err) => {
            let corr = crate::error::correlation_id();
            tracing::error!(correlation_id = %corr, error = %err, path = "/token", "IdP refresh failed");
            OAuthError::server_error(&corr).into_server_error()
        }
    }
}

/// Build a token response with required OAuth 2.0 cache headers (RFC 6749 §5.1).
fn token_success(body: TokenResponse) -> Response {
    let mut response = Json(body).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}
