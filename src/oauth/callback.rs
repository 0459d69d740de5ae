//! `GET /auth/callback`: the IdP-facing half of the bridge.
//!
//! The transaction is consumed before the IdP exchange so a replayed
//! callback can never redeem the same IdP code twice; failure after that
//! point surfaces an error to the user-agent and issues nothing.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::server::AppState;

use super::models::{AuthorizationCodeRecord, CallbackQuery, OAuthError};
use super::store::OAuthStore;

pub async fn callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    // The IdP reported a failure (user denied, policy, ...).
    if let Some(error) = query.error {
        tracing::warn!(error = %error, path = "/auth/callback", "IdP returned authorization error");
        return (
            StatusCode::BAD_REQUEST,
            axum::Json(serde_json::json!({
                "error": error,
                "error_description": query.error_description,
            })),
        )
            .into_response();
    }

    let (Some(code), Some(idp_state)) = (query.code.as_deref(), query.state.as_deref()) else {
        return OAuthError::invalid_request("code and state are required").into_bad_request();
    };

    // Single-use: exactly one of two racing callbacks gets the transaction.
    let Some(transaction) = state.oauth.consume_transaction(idp_state).await else {
        return OAuthError::invalid_state().into_bad_request();
    };

    let tokens = match state
        .idp
        .exchange_code(code, &state.config.callback_url(), &transaction.proxy_code_verifier)
        .await
    {
        Ok(tokens) => tokens,
        Err(err) if err.is_connectivity() => {
            let corr = crate::error::correlation_id();
            tracing::error!(correlation_id = %corr, error = %err, path = "/auth/callback", "IdP code exchange failed");
            return OAuthError::server_error(&corr).into_server_error();
        }
        Err(crate::error::IdpError::Rejected { error, description }) => {
            tracing::warn!(error = %error, path = "/auth/callback", "IdP rejected code exchange");
            return (
                StatusCode::BAD_REQUEST,
                axum::Json(serde_json::json!({
                    "error": error,
                    "error_description": description,
                })),
            )
                .into_response();
        }
        Err(err) => {
            let corr = crate::error::correlation_id();
            tracing::error!(correlation_id = %corr, error = %err, path = "/auth/callback", "Unreadable IdP token response");
            return OAuthError::server_error(&corr).into_server_error();
        }
    };

    let scope = if tokens.scope.is_empty() {
        transaction.requested_scope.clone()
    } else {
        tokens.scope.clone()
    };

    let proxy_code = OAuthStore::generate_token();
    state
        .oauth
        .insert_code(
            proxy_code.clone(),
            AuthorizationCodeRecord {
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
                expires_in: tokens.expires_in,
                scope,
                client_code_challenge: transaction.client_code_challenge,
                client_code_challenge_method: transaction.client_code_challenge_method,
                created_at: Instant::now(),
            },
        )
        .await;

    tracing::info!(client_id = %transaction.client_id, "Issued proxy authorization code");

    // Verbatim redirect: the registered URI untouched, code and state
    // appended as query parameters.
    let mut location = transaction.client_redirect_uri;
    push_query_pair(&mut location, "code", &proxy_code);
    if let Some(ref client_state) = transaction.client_state {
        push_query_pair(&mut location, "state", client_state);
    }

    (StatusCode::FOUND, [("Location", location)]).into_response()
}

/// Append one encoded `key=value` pair to a URL, without re-parsing or
/// normalizing what is already there.
fn push_query_pair(url: &mut String, key: &str, value: &str) {
    url.push(if url.contains('?') { '&' } else { '?' });
    let pair = url::form_urlencoded::Serializer::new(String::new())
        .append_pair(key, value)
        .finish();
    url.push_str(&pair);
}
