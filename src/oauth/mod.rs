//! OAuth 2.1 authorization server endpoints.
//!
//! The gateway brokers between MCP clients (which expect Dynamic Client
//! Registration and PKCE) and an enterprise IdP that only recognizes
//! pre-registered applications:
//!
//! - RFC 9728: Protected Resource Metadata
//! - RFC 8414: Authorization Server Metadata
//! - RFC 7591: Dynamic Client Registration
//! - RFC 7636: PKCE (S256 and plain on the client leg, S256 to the IdP)
//! - RFC 6749: Authorization Code + Refresh Token grants
//! - RFC 7009: Revocation (no-op)

pub mod authorize;
pub mod callback;
pub mod metadata;
pub mod models;
pub mod pkce;
pub mod register;
pub mod store;
pub mod token;

pub use store::OAuthStore;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use crate::server::AppState;

/// Routes for the OAuth authorization-server surface.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/.well-known/oauth-protected-resource",
            get(metadata::protected_resource_metadata),
        )
        .route(
            "/.well-known/oauth-authorization-server",
            get(metadata::authorization_server_metadata),
        )
        .route("/register", post(register::register_client))
        .route("/authorize", get(authorize::authorize))
        .route("/auth/callback", get(callback::callback))
        .route("/token", post(token::token))
        .route("/revoke", post(token::revoke))
}
