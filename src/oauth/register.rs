//! Dynamic Client Registration (RFC 7591).

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::server::AppState;

use super::models::{OAuthError, RegisterRequest};

/// `POST /register`
///
/// Unauthenticated by design; production deployments can gate it
/// upstream. All fields except `redirect_uris` default.
pub async fn register_client(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Response {
    let redirect_uris = request.redirect_uris.unwrap_or_default();
    if redirect_uris.is_empty() {
        return OAuthError::invalid_request("redirect_uris is required").into_bad_request();
    }

    let grant_types = if request.grant_types.is_empty() {
        vec!["authorization_code".to_string(), "refresh_token".to_string()]
    } else {
        request.grant_types
    };
    let response_types = if request.response_types.is_empty() {
        vec!["code".to_string()]
    } else {
        request.response_types
    };
    let auth_method = request.token_endpoint_auth_method.unwrap_or_else(|| "none".to_string());

    let Some(registration) = state
        .oauth
        .register_client(request.client_name, redirect_uris, grant_types, response_types, auth_method)
        .await
    else {
        // Registry at capacity; see DESIGN.md.
        tracing::warn!("Client registration rejected: registry is full");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "error": "server_error",
                "error_description": "client registry is full"
            })),
        )
            .into_response();
    };

    tracing::info!(client_id = %registration.client_id, "Registered OAuth client");

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "client_id": registration.client_id,
            "client_id_issued_at": registration.issued_at,
            "client_name": registration.client_name,
            "redirect_uris": registration.redirect_uris,
            "grant_types": registration.grant_types,
            "response_types": registration.response_types,
            "token_endpoint_auth_method": registration.token_endpoint_auth_method
        })),
    )
        .into_response()
}
