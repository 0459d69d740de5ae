//! MCP Auth Gateway
//!
//! An authenticating gateway for a Model Context Protocol (MCP) server.
//! It brokers OAuth 2.1 authorization between MCP clients (which expect
//! Dynamic Client Registration and PKCE) and an enterprise identity
//! provider that only recognizes pre-registered applications, validates
//! IdP-issued tokens on every tool call, and performs On-Behalf-Of
//! exchange when tools reach downstream APIs.
//!
//! # Example
//!
//! ```no_run
//! use mcp_auth_gateway::{config::Config, server::GatewayServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let server = GatewayServer::new(config)?;
//!     server.run(8000).await
//! }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod idp;
pub mod oauth;
pub mod obo;
pub mod server;
pub mod store;
pub mod tools;

pub use auth::{TokenValidator, UserIdentity};
pub use config::Config;
pub use error::{AuthError, IdpError, OboError, ToolError};
pub use server::GatewayServer;
