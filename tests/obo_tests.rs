//! Integration tests for On-Behalf-Of delegation.

use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mcp_auth_gateway::auth::UserIdentity;
use mcp_auth_gateway::config::Config;
use mcp_auth_gateway::error::OboError;
use mcp_auth_gateway::obo::DelegationHelper;

fn test_identity() -> UserIdentity {
    UserIdentity {
        token: "JWT1".into(),
        client_id: "api://mcp-access".into(),
        scopes: vec!["mcp-access".into()],
        oid: "u1".into(),
        name: None,
        preferred_username: None,
        sub: None,
        tid: None,
    }
}

#[tokio::test]
async fn test_obo_exchange_returns_downstream_token() {
    let idp = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/test-tenant/oauth2/v2.0/token"))
        .and(body_string_contains("jwt-bearer"))
        .and(body_string_contains("assertion=JWT1"))
        .and(body_string_contains("requested_token_use=on_behalf_of"))
        .and(body_string_contains("User.Read"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "GRAPHJWT",
            "expires_in": 3600,
            "scope": "https://graph.microsoft.com/User.Read"
        })))
        .mount(&idp)
        .await;

    let config = Config::for_testing(&idp.uri(), "https://gateway.example.com");
    let helper = DelegationHelper::new(config);

    let token = helper
        .acquire_token(&test_identity(), &["https://graph.microsoft.com/User.Read"])
        .await
        .unwrap();

    assert_eq!(token, "GRAPHJWT");
}

#[tokio::test]
async fn test_obo_client_is_reused_across_calls() {
    let idp = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/test-tenant/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "GRAPHJWT",
            "expires_in": 3600
        })))
        .expect(2)
        .mount(&idp)
        .await;

    let config = Config::for_testing(&idp.uri(), "https://gateway.example.com");
    let helper = DelegationHelper::new(config);

    for _ in 0..2 {
        let token = helper.acquire_token(&test_identity(), &["scope.a"]).await.unwrap();
        assert_eq!(token, "GRAPHJWT");
    }
}

#[tokio::test]
async fn test_obo_rejection_surfaces_idp_error() {
    let idp = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/test-tenant/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "AADSTS65001: user has not consented"
        })))
        .mount(&idp)
        .await;

    let config = Config::for_testing(&idp.uri(), "https://gateway.example.com");
    let helper = DelegationHelper::new(config);

    let err = helper.acquire_token(&test_identity(), &["scope.a"]).await.unwrap_err();

    match err {
        OboError::Rejected { ref error, .. } => assert_eq!(error, "invalid_grant"),
        other => panic!("expected Rejected, got {other:?}"),
    }
    assert!(err.to_string().contains("invalid_grant"));
}

#[tokio::test]
async fn test_obo_without_credentials_is_config_error() {
    let mut config =
        Config::for_testing("http://idp.invalid", "https://gateway.example.com");
    config.idp_client_secret = None;
    let helper = DelegationHelper::new(config);

    let err = helper.acquire_token(&test_identity(), &["scope.a"]).await.unwrap_err();
    assert!(matches!(err, OboError::MissingCredentials));
}
