use std::future::Future;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::error::BotwitError;

/// In-memory bearer token store shared by API clients.
///
/// A stored token is served until `ttl` has elapsed since it was obtained.
/// On a miss the caller's exchange runs under the write lock, so clients
/// sharing one cache never run it twice for the same expiry. `invalidate`
/// forces the next caller to refresh, e.g. after the server rejected the token.
#[derive(Debug)]
pub struct TokenCache {
    ttl: Duration,
    cached: RwLock<Option<CachedToken>>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    obtained_at: Instant,
}

impl CachedToken {
    fn fresh(&self, ttl: Duration) -> Option<String> {
        (self.obtained_at.elapsed() < ttl).then(|| self.token.clone())
    }
}

impl TokenCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            cached: RwLock::new(None),
        }
    }

    /// The cached token, if one is stored and younger than the TTL.
    pub async fn get(&self) -> Option<String> {
        let guard = self.cached.read().await;
        guard.as_ref().and_then(|cached| cached.fresh(self.ttl))
    }

    /// The cached token, or the result of `exchange` which is then cached.
    ///
    /// An empty token from `exchange` is an error and is not cached.
    pub async fn get_or_refresh<F, Fut>(&self, exchange: F) -> Result<String, BotwitError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, BotwitError>>,
    {
        // Fast path: read lock
        if let Some(token) = self.get().await {
            return Ok(token);
        }

        // Slow path: write lock, check again, exchange
        let mut guard = self.cached.write().await;
        if let Some(token) = guard.as_ref().and_then(|cached| cached.fresh(self.ttl)) {
            return Ok(token);
        }

        let token = exchange().await?;
        if token.is_empty() {
            return Err(BotwitError::Auth("received an empty bearer token".into()));
        }
        *guard = Some(CachedToken {
            token: token.clone(),
            obtained_at: Instant::now(),
        });
        Ok(token)
    }

    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(24 * 60 * 60))
    }
}
