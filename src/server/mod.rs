//! Gateway server assembly.
//!
//! Composes the OAuth authorization-server surface, the validated MCP
//! endpoints, and the health probes into one axum router. The route
//! table here is the single place where each protected endpoint's
//! validator variant (strict vs permissive) is chosen.

pub mod transport;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{self, AuthLayerState, TokenValidator};
use crate::config::Config;
use crate::idp::IdpClient;
use crate::oauth::{self, OAuthStore};
use crate::obo::DelegationHelper;
use crate::store::{InMemoryUserStore, UserDataStore};
use crate::tools::{self, McpTool, ToolContext};

/// Shared state for HTTP handlers.
pub struct AppState {
    pub config: Config,
    pub oauth: Arc<OAuthStore>,
    pub idp: IdpClient,
    pub tools: Vec<Box<dyn McpTool>>,
    pub tool_ctx: ToolContext,
}

/// The authenticating MCP gateway.
pub struct GatewayServer {
    state: Arc<AppState>,
    auth_state: Arc<AuthLayerState>,
}

impl GatewayServer {
    /// Create a gateway with the default in-memory user store.
    ///
    /// # Errors
    ///
    /// Returns error if outbound HTTP clients cannot be built.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        Self::with_user_store(config, Arc::new(InMemoryUserStore::new()))
    }

    /// Create a gateway with a caller-provided user data store.
    ///
    /// # Errors
    ///
    /// Returns error if outbound HTTP clients cannot be built.
    pub fn with_user_store(
        config: Config,
        user_store: Arc<dyn UserDataStore>,
    ) -> anyhow::Result<Self> {
        let oauth = Arc::new(OAuthStore::new(config.transaction_ttl, config.auth_code_ttl));
        let idp = IdpClient::new(&config)?;
        let validator = TokenValidator::new(&config)?;
        let delegation = Arc::new(DelegationHelper::new(config.clone()));
        let tool_ctx = ToolContext::new(user_store, delegation);

        let auth_state = Arc::new(AuthLayerState {
            validator,
            resource_metadata_url: config.resource_metadata_url(),
        });

        let state = Arc::new(AppState {
            config,
            oauth,
            idp,
            tools: tools::register_all_tools(),
            tool_ctx,
        });

        Ok(Self { state, auth_state })
    }

    /// Build the full router.
    #[must_use]
    pub fn router(&self) -> Router {
        let strict_mcp = Router::new()
            .route("/mcp", post(transport::handle_mcp_post))
            .route_layer(middleware::from_fn_with_state(
                Arc::clone(&self.auth_state),
                auth::require_bearer,
            ));

        let permissive_mcp = Router::new()
            .route("/mcp", get(transport::handle_mcp_get))
            .route_layer(middleware::from_fn_with_state(
                Arc::clone(&self.auth_state),
                auth::optional_bearer,
            ));

        Router::new()
            .route("/health", get(health_check))
            .route("/ready", get(readiness_check))
            .merge(oauth::router())
            .merge(strict_mcp)
            .merge(permissive_mcp)
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(&self.state))
    }

    /// Run the HTTP server until shutdown.
    ///
    /// # Errors
    ///
    /// Returns error on bind or serve failure.
    pub async fn run(self, port: u16) -> anyhow::Result<()> {
        Arc::clone(&self.state.oauth).start_sweeper();

        let router = self.router();
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        tracing::info!(
            base_url = %self.state.config.base_url,
            issuer = %self.state.config.issuer(),
            "Gateway listening on http://{addr}"
        );

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

        tracing::info!("Gateway shut down");
        Ok(())
    }
}

impl std::fmt::Debug for GatewayServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayServer").field("tools", &self.state.tools.len()).finish()
    }
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "mcp-auth-gateway",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn readiness_check(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ready",
        "service": "mcp-auth-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "registered_clients": state.oauth.client_count().await,
        "tools": state.tools.len()
    }))
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("Failed to install CTRL+C handler");
    tracing::info!("Received shutdown signal");
}
