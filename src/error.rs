//! Error types for the gateway.
//!
//! Uses `thiserror` for structured error handling with automatic `From`
//! implementations.

/// Errors talking to the IdP token endpoint.
#[derive(thiserror::Error, Debug)]
pub enum IdpError {
    /// HTTP transport error (connection, DNS, TLS, timeout).
    #[error("IdP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The IdP returned an OAuth error payload.
    #[error("IdP rejected request: {error}")]
    Rejected {
        /// Stable OAuth error code from the IdP.
        error: String,
        /// Human-readable description, if the IdP sent one.
        description: Option<String>,
    },

    /// The IdP response body could not be parsed.
    #[error("Failed to parse IdP response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl IdpError {
    /// Create a rejection error from an IdP error payload.
    #[must_use]
    pub fn rejected(error: impl Into<String>, description: Option<String>) -> Self {
        Self::Rejected { error: error.into(), description }
    }

    /// Returns true for connectivity-class failures that map to HTTP 500.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}

/// Errors validating an inbound Bearer token.
///
/// The specific variant is logged server-side but never sent to the
/// client; all variants render as an undifferentiated 401.
#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    /// Authorization header absent or not a Bearer scheme.
    #[error("missing bearer token")]
    MissingToken,

    /// JWT header could not be parsed or carries no `kid`.
    #[error("malformed token header")]
    MalformedHeader,

    /// No signing key matches the token's `kid`.
    #[error("unknown signing key: {kid}")]
    UnknownKey {
        /// The `kid` the token named.
        kid: String,
    },

    /// Signature, issuer, audience, or lifetime check failed.
    #[error("token validation failed: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    /// Token verified but carries no `oid` claim.
    #[error("token missing oid claim")]
    MissingOid,

    /// JWKS could not be fetched or decoded.
    #[error("signing key fetch failed: {0}")]
    Jwks(String),
}

/// Errors from On-Behalf-Of delegation.
///
/// These are tool-level failures: the user is authenticated to the
/// gateway, so they never render as a gateway 401.
#[derive(thiserror::Error, Debug)]
pub enum OboError {
    /// The gateway has no confidential credentials configured.
    #[error("on-behalf-of exchange requires IDP_CLIENT_SECRET to be configured")]
    MissingCredentials,

    /// The IdP refused the exchange (e.g. missing delegated consent).
    #[error("on-behalf-of exchange rejected: {error}")]
    Rejected {
        /// Stable OAuth error code from the IdP.
        error: String,
        /// Human-readable description, if the IdP sent one.
        description: Option<String>,
    },

    /// Transport failure reaching the IdP.
    #[error("on-behalf-of request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The exchange succeeded but the response carried no access token.
    #[error("on-behalf-of response missing access_token")]
    MissingAccessToken,
}

impl From<IdpError> for OboError {
    fn from(err: IdpError) -> Self {
        match err {
            IdpError::Rejected { error, description } => Self::Rejected { error, description },
            IdpError::Http(e) => Self::Http(e),
            IdpError::Parse(_) => Self::MissingAccessToken,
        }
    }
}

/// Errors from MCP tool execution.
#[derive(thiserror::Error, Debug)]
pub enum ToolError {
    /// Input validation failed.
    #[error("Validation error: {message}")]
    Validation {
        /// Field that failed validation.
        field: String,
        /// Validation error message.
        message: String,
    },

    /// Delegated token acquisition failed.
    #[error("Delegation error: {0}")]
    Delegation(#[from] OboError),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal tool logic error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ToolError {
    /// Create a validation error.
    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), message: message.into() }
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

/// Result type alias for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// A short correlation identifier for server-error log records.
#[must_use]
pub fn correlation_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idp_rejected_display() {
        let err = IdpError::rejected("invalid_grant", Some("code expired".into()));
        assert!(err.to_string().contains("invalid_grant"));
        assert!(!err.is_connectivity());
    }

    #[test]
    fn test_obo_from_idp_rejection() {
        let obo: OboError = IdpError::rejected("invalid_grant", None).into();
        assert!(obo.to_string().contains("invalid_grant"));
    }

    #[test]
    fn test_correlation_id_shape() {
        let id = correlation_id();
        assert_eq!(id.len(), 12);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
