//! `GET /authorize`: the client-facing half of the dual PKCE bridge.
//!
//! The client's PKCE commitment is stored in the transaction and verified
//! later at `/token`; it is never forwarded to the IdP. The gateway mints
//! its own verifier for the IdP leg, always S256.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::server::AppState;

use super::models::{AuthTransaction, AuthorizeQuery, OAuthError};
use super::pkce;

pub async fn authorize(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuthorizeQuery>,
) -> Response {
    if query.response_type.as_deref() != Some("code") {
        return OAuthError::unsupported_response_type().into_bad_request();
    }

    let Some(client_id) = query.client_id.as_deref() else {
        return OAuthError::invalid_request("client_id is required").into_bad_request();
    };
    let Some(redirect_uri) = query.redirect_uri.as_deref() else {
        return OAuthError::invalid_request("redirect_uri is required").into_bad_request();
    };
    let Some(code_challenge) = query.code_challenge.as_deref() else {
        return OAuthError::invalid_request("code_challenge is required").into_bad_request();
    };

    let challenge_method = query.code_challenge_method.as_deref().unwrap_or("plain");
    if challenge_method != "S256" && challenge_method != "plain" {
        return OAuthError::invalid_request("code_challenge_method must be 'S256' or 'plain'")
            .into_bad_request();
    }

    let Some(client) = state.oauth.get_client(client_id).await else {
        return OAuthError::invalid_request("unknown client_id").into_bad_request();
    };

    // Registered URIs match verbatim.
    if !client.redirect_uris.iter().any(|uri| uri == redirect_uri) {
        return OAuthError::invalid_request("redirect_uri not registered for this client")
            .into_bad_request();
    }

    let requested_scope =
        query.scope.clone().unwrap_or_else(|| state.config.api_scope.clone());

    // Gateway-side PKCE for the IdP leg.
    let proxy_state = uuid::Uuid::new_v4().simple().to_string();
    let proxy_code_verifier = pkce::generate_verifier();
    let proxy_code_challenge = pkce::challenge_s256(&proxy_code_verifier);

    let transaction = AuthTransaction {
        client_id: client_id.to_owned(),
        client_redirect_uri: redirect_uri.to_owned(),
        client_state: query.state.clone(),
        client_code_challenge: code_challenge.to_owned(),
        client_code_challenge_method: challenge_method.to_owned(),
        proxy_code_verifier,
        requested_scope,
        created_at: Instant::now(),
    };
    state.oauth.insert_transaction(proxy_state.clone(), transaction).await;

    let idp_url = match build_idp_authorize_url(&state, &proxy_state, &proxy_code_challenge) {
        Ok(url) => url,
        Err(err) => {
            let corr = crate::error::correlation_id();
            tracing::error!(correlation_id = %corr, error = %err, path = "/authorize", "Failed to build IdP authorize URL");
            return OAuthError::server_error(&corr).into_server_error();
        }
    };

    tracing::info!(client_id = %client_id, "Redirecting authorization request to IdP");

    (StatusCode::FOUND, [("Location", idp_url)]).into_response()
}

fn build_idp_authorize_url(
    state: &AppState,
    proxy_state: &str,
    proxy_code_challenge: &str,
) -> Result<String, url::ParseError> {
    let mut url = url::Url::parse(&state.config.idp_authorize_endpoint())?;
    url.query_pairs_mut()
        .append_pair("client_id", &state.config.idp_client_id)
        .append_pair("response_type", "code")
        .append_pair("redirect_uri", &state.config.callback_url())
        .append_pair("scope", &state.config.composite_scope())
        .append_pair("state", proxy_state)
        .append_pair("code_challenge", proxy_code_challenge)
        .append_pair("code_challenge_method", "S256");
    Ok(url.into())
}
