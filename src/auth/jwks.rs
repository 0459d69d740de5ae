//! JWKS fetching and caching.
//!
//! Cache entries are whole key sets keyed by JWKS URI, with a short TTL
//! and a small capacity bound. Concurrent misses coalesce into a single
//! outbound fetch, and outbound fetches are rate limited so a burst of
//! unknown-`kid` traffic cannot stampede the IdP.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::JwkSet;
use moka::future::Cache;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use tokio::sync::Mutex;

use crate::config::defaults;
use crate::error::AuthError;

/// Caching JWKS client.
#[derive(Clone)]
pub struct JwksCache {
    cache: Cache<String, Arc<JwkSet>>,
    http: ClientWithMiddleware,
    fetch_log: Arc<Mutex<VecDeque<Instant>>>,
    fetch_limit: usize,
}

impl JwksCache {
    /// Create a new cache with the default TTL and capacity bounds.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(timeout: Duration, connect_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()?;

        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(Duration::from_millis(200), Duration::from_secs(2))
            .build_with_max_retries(2);

        let http = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        let cache = Cache::builder()
            .max_capacity(defaults::JWKS_CACHE_CAPACITY)
            .time_to_live(defaults::JWKS_CACHE_TTL)
            .build();

        Ok(Self {
            cache,
            http,
            fetch_log: Arc::new(Mutex::new(VecDeque::new())),
            fetch_limit: defaults::JWKS_FETCH_PER_MINUTE,
        })
    }

    /// Get the key set for a JWKS URI, fetching on cache miss.
    ///
    /// Concurrent callers missing on the same URI share one fetch.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Jwks`] on fetch failure or rate exhaustion.
    pub async fn get(&self, jwks_uri: &str) -> Result<Arc<JwkSet>, AuthError> {
        self.cache
            .try_get_with(jwks_uri.to_owned(), self.fetch(jwks_uri))
            .await
            .map_err(|err: Arc<AuthError>| AuthError::Jwks(err.to_string()))
    }

    async fn fetch(&self, jwks_uri: &str) -> Result<Arc<JwkSet>, AuthError> {
        self.acquire_fetch_slot().await?;

        tracing::debug!(jwks_uri = %jwks_uri, "Fetching JWKS");

        let response = self
            .http
            .get(jwks_uri)
            .send()
            .await
            .map_err(|e| AuthError::Jwks(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::Jwks(format!(
                "JWKS endpoint returned HTTP {}",
                response.status()
            )));
        }

        let jwks: JwkSet =
            response.json().await.map_err(|e| AuthError::Jwks(e.to_string()))?;

        Ok(Arc::new(jwks))
    }

    /// Sliding-window rate limit on outbound fetches.
    async fn acquire_fetch_slot(&self) -> Result<(), AuthError> {
        let mut log = self.fetch_log.lock().await;
        let now = Instant::now();
        while let Some(front) = log.front() {
            if now.duration_since(*front) > Duration::from_secs(60) {
                log.pop_front();
            } else {
                break;
            }
        }
        if log.len() >= self.fetch_limit {
            return Err(AuthError::Jwks("JWKS fetch rate limit exceeded".into()));
        }
        log.push_back(now);
        Ok(())
    }
}

impl std::fmt::Debug for JwksCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksCache").field("fetch_limit", &self.fetch_limit).finish()
    }
}
