//! In-memory OAuth state store.
//!
//! Three maps with distinct lifecycles: client registrations live for the
//! process, transactions and proxy codes are single-use with short TTLs.
//! Lookup-then-delete is a single `remove` under the write lock, so two
//! racing consumers can never both succeed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::RwLock;

use crate::config::defaults;

use super::models::{AuthTransaction, AuthorizationCodeRecord, ClientRegistration};

/// In-memory store for registrations, transactions, and proxy codes.
#[derive(Clone)]
pub struct OAuthStore {
    clients: Arc<RwLock<HashMap<String, ClientRegistration>>>,
    transactions: Arc<RwLock<HashMap<String, AuthTransaction>>>,
    codes: Arc<RwLock<HashMap<String, AuthorizationCodeRecord>>>,
    transaction_ttl: Duration,
    code_ttl: Duration,
}

impl OAuthStore {
    #[must_use]
    pub fn new(transaction_ttl: Duration, code_ttl: Duration) -> Self {
        Self {
            clients: Arc::new(RwLock::new(HashMap::new())),
            transactions: Arc::new(RwLock::new(HashMap::new())),
            codes: Arc::new(RwLock::new(HashMap::new())),
            transaction_ttl,
            code_ttl,
        }
    }

    /// Generate an opaque token from two UUIDs (256 bits).
    #[must_use]
    pub fn generate_token() -> String {
        format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple())
    }

    /// Register a new client (Dynamic Client Registration).
    ///
    /// Returns `None` when the registry is at capacity.
    pub async fn register_client(
        &self,
        client_name: Option<String>,
        redirect_uris: Vec<String>,
        grant_types: Vec<String>,
        response_types: Vec<String>,
        token_endpoint_auth_method: String,
    ) -> Option<ClientRegistration> {
        let mut clients = self.clients.write().await;
        if clients.len() >= defaults::MAX_REGISTRATIONS {
            return None;
        }

        let client_id = uuid::Uuid::new_v4().simple().to_string();
        let issued_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let registration = ClientRegistration {
            client_id: client_id.clone(),
            client_name,
            redirect_uris,
            grant_types,
            response_types,
            token_endpoint_auth_method,
            created_at: Instant::now(),
            issued_at,
        };

        clients.insert(client_id, registration.clone());
        Some(registration)
    }

    /// Look up a registration by client ID.
    pub async fn get_client(&self, client_id: &str) -> Option<ClientRegistration> {
        self.clients.read().await.get(client_id).cloned()
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Persist a pending transaction keyed by its proxy state.
    pub async fn insert_transaction(&self, proxy_state: String, transaction: AuthTransaction) {
        self.transactions.write().await.insert(proxy_state, transaction);
    }

    /// Consume a transaction (single-use).
    ///
    /// Removes the entry regardless of expiry, so a replayed state can
    /// never be redeemed twice.
    pub async fn consume_transaction(&self, proxy_state: &str) -> Option<AuthTransaction> {
        let transaction = self.transactions.write().await.remove(proxy_state)?;
        if transaction.is_expired(self.transaction_ttl) {
            return None;
        }
        Some(transaction)
    }

    /// Persist a proxy code record.
    pub async fn insert_code(&self, proxy_code: String, record: AuthorizationCodeRecord) {
        self.codes.write().await.insert(proxy_code, record);
    }

    /// Consume a proxy code (single-use, deleted even if expired).
    pub async fn consume_code(&self, proxy_code: &str) -> Option<AuthorizationCodeRecord> {
        let record = self.codes.write().await.remove(proxy_code)?;
        if record.is_expired(self.code_ttl) {
            return None;
        }
        Some(record)
    }

    /// Start the background sweeper for expired transactions and codes.
    pub fn start_sweeper(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(defaults::SWEEP_INTERVAL);
            interval.tick().await;
            loop {
                interval.tick().await;
                self.sweep_expired().await;
            }
        });
    }

    async fn sweep_expired(&self) {
        {
            let mut transactions = self.transactions.write().await;
            let before = transactions.len();
            transactions.retain(|_, tx| !tx.is_expired(self.transaction_ttl));
            let removed = before - transactions.len();
            if removed > 0 {
                tracing::debug!(count = removed, "Swept expired auth transactions");
            }
        }
        {
            let mut codes = self.codes.write().await;
            let before = codes.len();
            codes.retain(|_, record| !record.is_expired(self.code_ttl));
            let removed = before - codes.len();
            if removed > 0 {
                tracing::debug!(count = removed, "Swept expired authorization codes");
            }
        }
    }
}

impl Default for OAuthStore {
    fn default() -> Self {
        Self::new(defaults::TRANSACTION_TTL, defaults::AUTH_CODE_TTL)
    }
}

impl std::fmt::Debug for OAuthStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthStore").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_transaction() -> AuthTransaction {
        AuthTransaction {
            client_id: "client1".into(),
            client_redirect_uri: "https://app/cb".into(),
            client_state: Some("s1".into()),
            client_code_challenge: "challenge".into(),
            client_code_challenge_method: "S256".into(),
            proxy_code_verifier: "verifier".into(),
            requested_scope: "api://mcp-access".into(),
            created_at: Instant::now(),
        }
    }

    fn sample_code() -> AuthorizationCodeRecord {
        AuthorizationCodeRecord {
            access_token: "JWT1".into(),
            refresh_token: Some("R1".into()),
            expires_in: 3600,
            scope: "api://mcp-access".into(),
            client_code_challenge: "challenge".into(),
            client_code_challenge_method: "S256".into(),
            created_at: Instant::now(),
        }
    }

    #[tokio::test]
    async fn test_client_registration() {
        let store = OAuthStore::default();
        let client = store
            .register_client(
                Some("Test App".into()),
                vec!["http://localhost/callback".into()],
                vec!["authorization_code".into()],
                vec!["code".into()],
                "none".into(),
            )
            .await
            .unwrap();

        assert!(!client.client_id.is_empty());

        let found = store.get_client(&client.client_id).await.unwrap();
        assert_eq!(found.client_name.as_deref(), Some("Test App"));
        assert_eq!(found.redirect_uris, vec!["http://localhost/callback"]);
    }

    #[tokio::test]
    async fn test_transaction_single_use() {
        let store = OAuthStore::default();
        store.insert_transaction("state1".into(), sample_transaction()).await;

        assert!(store.consume_transaction("state1").await.is_some());
        assert!(store.consume_transaction("state1").await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_state_rejected() {
        let store = OAuthStore::default();
        assert!(store.consume_transaction("never-issued").await.is_none());
    }

    #[tokio::test]
    async fn test_expired_transaction_rejected_before_sweep() {
        let store = OAuthStore::new(Duration::ZERO, defaults::AUTH_CODE_TTL);
        store.insert_transaction("state1".into(), sample_transaction()).await;

        // TTL of zero: the entry is expired the instant it is read.
        assert!(store.consume_transaction("state1").await.is_none());
    }

    #[tokio::test]
    async fn test_code_single_use() {
        let store = OAuthStore::default();
        store.insert_code("code1".into(), sample_code()).await;

        let record = store.consume_code("code1").await.unwrap();
        assert_eq!(record.access_token, "JWT1");
        assert!(store.consume_code("code1").await.is_none());
    }

    #[tokio::test]
    async fn test_expired_code_rejected() {
        let store = OAuthStore::new(defaults::TRANSACTION_TTL, Duration::ZERO);
        store.insert_code("code1".into(), sample_code()).await;
        assert!(store.consume_code("code1").await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_consume_exactly_one_winner() {
        let store = Arc::new(OAuthStore::default());
        store.insert_transaction("state1".into(), sample_transaction()).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.consume_transaction("state1").await.is_some()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_entries() {
        let store = OAuthStore::new(Duration::ZERO, Duration::ZERO);
        store.insert_transaction("state1".into(), sample_transaction()).await;
        store.insert_code("code1".into(), sample_code()).await;

        store.sweep_expired().await;

        assert!(store.transactions.read().await.is_empty());
        assert!(store.codes.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_generated_tokens_unique_and_opaque() {
        let a = OAuthStore::generate_token();
        let b = OAuthStore::generate_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }
}
