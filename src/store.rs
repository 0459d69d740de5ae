//! Per-user data storage, partitioned by the `oid` claim.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

/// Storage for per-user tool data, keyed by the stable user identifier.
///
/// Tool handlers only ever see the partition belonging to the validated
/// identity on the current request.
#[async_trait]
pub trait UserDataStore: Send + Sync {
    /// Read a value from a user's partition.
    async fn get(&self, oid: &str, key: &str) -> Option<serde_json::Value>;

    /// Write a value into a user's partition.
    async fn put(&self, oid: &str, key: &str, value: serde_json::Value);

    /// List all keys in a user's partition.
    async fn keys(&self, oid: &str) -> Vec<String>;
}

/// In-memory store; swap for a persistent backend in production.
#[derive(Default)]
pub struct InMemoryUserStore {
    data: RwLock<HashMap<String, HashMap<String, serde_json::Value>>>,
}

impl InMemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDataStore for InMemoryUserStore {
    async fn get(&self, oid: &str, key: &str) -> Option<serde_json::Value> {
        self.data.read().await.get(oid)?.get(key).cloned()
    }

    async fn put(&self, oid: &str, key: &str, value: serde_json::Value) {
        self.data
            .write()
            .await
            .entry(oid.to_owned())
            .or_default()
            .insert(key.to_owned(), value);
    }

    async fn keys(&self, oid: &str) -> Vec<String> {
        self.data
            .read()
            .await
            .get(oid)
            .map(|partition| partition.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_partitions_are_isolated() {
        let store = InMemoryUserStore::new();
        store.put("user1", "notes", serde_json::json!("alpha")).await;
        store.put("user2", "notes", serde_json::json!("beta")).await;

        assert_eq!(store.get("user1", "notes").await, Some(serde_json::json!("alpha")));
        assert_eq!(store.get("user2", "notes").await, Some(serde_json::json!("beta")));
        assert!(store.get("user3", "notes").await.is_none());
    }

    #[tokio::test]
    async fn test_keys_listing() {
        let store = InMemoryUserStore::new();
        store.put("user1", "a", serde_json::json!(1)).await;
        store.put("user1", "b", serde_json::json!(2)).await;

        let mut keys = store.keys("user1").await;
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);
        assert!(store.keys("user2").await.is_empty());
    }
}
