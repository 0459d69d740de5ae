//! MCP tool handlers.
//!
//! The gateway treats tools as an arbitrary set of handlers invoked with
//! a validated user identity. Each tool receives the identity extracted
//! by the token validator plus a context holding the per-user data store
//! and the delegation helper.

use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::UserIdentity;
use crate::error::{ToolError, ToolResult};
use crate::obo::DelegationHelper;
use crate::store::UserDataStore;

/// Tool execution context.
pub struct ToolContext {
    /// Per-user data store, partitioned by `oid`.
    pub user_store: Arc<dyn UserDataStore>,

    /// On-Behalf-Of helper for tools that call downstream APIs.
    pub delegation: Arc<DelegationHelper>,
}

impl ToolContext {
    #[must_use]
    pub fn new(user_store: Arc<dyn UserDataStore>, delegation: Arc<DelegationHelper>) -> Self {
        Self { user_store, delegation }
    }
}

/// Trait for MCP tools.
#[async_trait]
pub trait McpTool: Send + Sync {
    /// Tool name (e.g., "whoami").
    fn name(&self) -> &'static str;

    /// Tool description for the client.
    fn description(&self) -> &'static str;

    /// JSON Schema for input parameters.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool for the authenticated user.
    async fn execute(
        &self,
        ctx: &ToolContext,
        identity: &UserIdentity,
        input: serde_json::Value,
    ) -> ToolResult<String>;
}

/// Register all tools.
#[must_use]
pub fn register_all_tools() -> Vec<Box<dyn McpTool>> {
    vec![Box::new(WhoAmITool), Box::new(DownstreamTokenTool)]
}

/// Reports the authenticated identity back to the caller.
pub struct WhoAmITool;

#[async_trait]
impl McpTool for WhoAmITool {
    fn name(&self) -> &'static str {
        "whoami"
    }

    fn description(&self) -> &'static str {
        "Show the authenticated user's identity and granted scopes"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(
        &self,
        _ctx: &ToolContext,
        identity: &UserIdentity,
        _input: serde_json::Value,
    ) -> ToolResult<String> {
        let body = serde_json::json!({
            "oid": identity.oid,
            "name": identity.display_name(),
            "scopes": identity.scopes,
            "tenant": identity.tid,
        });
        Ok(body.to_string())
    }
}

/// Acquires a downstream access token via On-Behalf-Of exchange.
///
/// Exists so operators can verify delegated consent end-to-end; the
/// token itself is not returned, only its acquisition outcome.
pub struct DownstreamTokenTool;

#[async_trait]
impl McpTool for DownstreamTokenTool {
    fn name(&self) -> &'static str {
        "check_downstream_access"
    }

    fn description(&self) -> &'static str {
        "Verify that a downstream API token can be acquired on behalf of the user"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "scopes": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Downstream scopes to request"
                }
            },
            "required": ["scopes"]
        })
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        identity: &UserIdentity,
        input: serde_json::Value,
    ) -> ToolResult<String> {
        let scopes: Vec<String> = input
            .get("scopes")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .ok_or_else(|| ToolError::validation("scopes", "must be an array of strings"))?;

        if scopes.is_empty() {
            return Err(ToolError::validation("scopes", "cannot be empty"));
        }

        let scope_refs: Vec<&str> = scopes.iter().map(String::as_str).collect();
        ctx.delegation.acquire_token(identity, &scope_refs).await?;

        Ok(serde_json::json!({
            "delegated": true,
            "scopes": scopes,
        })
        .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::InMemoryUserStore;

    fn test_identity() -> UserIdentity {
        UserIdentity {
            token: "JWT1".into(),
            client_id: "api://mcp-access".into(),
            scopes: vec!["mcp-access".into()],
            oid: "u1".into(),
            name: Some("Ada".into()),
            preferred_username: None,
            sub: None,
            tid: Some("tenant1".into()),
        }
    }

    fn test_context() -> ToolContext {
        let config = Config::for_testing("http://idp.localhost", "http://gw.localhost");
        ToolContext::new(
            Arc::new(InMemoryUserStore::new()),
            Arc::new(DelegationHelper::new(config)),
        )
    }

    #[tokio::test]
    async fn test_whoami_reports_identity() {
        let ctx = test_context();
        let output =
            WhoAmITool.execute(&ctx, &test_identity(), serde_json::json!({})).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(json["oid"], "u1");
        assert_eq!(json["name"], "Ada");
    }

    #[tokio::test]
    async fn test_downstream_tool_validates_scopes() {
        let ctx = test_context();
        let err = DownstreamTokenTool
            .execute(&ctx, &test_identity(), serde_json::json!({"scopes": []}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation { .. }));
    }

    #[test]
    fn test_registered_tool_names_unique() {
        let tools = register_all_tools();
        let mut names: Vec<_> = tools.iter().map(|t| t.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), tools.len());
    }
}
