//! OAuth discovery documents.
//!
//! The gateway advertises itself as the authorization server (the proxy
//! pattern): clients never talk to the IdP directly.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;

use crate::server::AppState;

/// `GET /.well-known/oauth-protected-resource`
///
/// Protected Resource Metadata (RFC 9728). Points clients at this
/// gateway's own authorization server.
pub async fn protected_resource_metadata(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "resource": state.config.mcp_resource_url(),
        "authorization_servers": [state.config.base_url],
        "scopes_supported": [state.config.api_scope],
        "bearer_methods_supported": ["header"]
    }))
}

/// `GET /.well-known/oauth-authorization-server`
///
/// Authorization Server Metadata (RFC 8414). Every capability listed here
/// is honored by the runtime endpoints; anything omitted is rejected.
pub async fn authorization_server_metadata(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let base = &state.config.base_url;
    Json(serde_json::json!({
        "issuer": base,
        "authorization_endpoint": format!("{base}/authorize"),
        "token_endpoint": format!("{base}/token"),
        "registration_endpoint": format!("{base}/register"),
        "revocation_endpoint": format!("{base}/revoke"),
        "scopes_supported": [state.config.api_scope],
        "response_types_supported": ["code"],
        "grant_types_supported": ["authorization_code", "refresh_token"],
        "token_endpoint_auth_methods_supported": ["none", "client_secret_post"],
        "code_challenge_methods_supported": ["S256", "plain"]
    }))
}
