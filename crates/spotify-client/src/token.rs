//! OAuth token lifecycle.
//!
//! A [`TokenManager`] is built per turn from the token stored in user data.
//! It hands out a valid access token, refreshing it once it is past its
//! expiry, and reports whether a refresh happened so the caller can persist
//! the new token.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::SpotifyError;

/// Stored OAuth credentials for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenData {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry as epoch seconds.
    pub expiry: i64,
}

impl TokenData {
    /// Whether the access token is still usable at `now` (epoch seconds).
    pub fn is_valid_at(&self, now: i64) -> bool {
        now < self.expiry
    }

    /// Whether all fields are populated.
    pub fn is_well_formed(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }

    /// Build stored credentials from a grant received at `now`.
    ///
    /// A refresh grant may omit the refresh token; the previous one is kept.
    pub fn from_grant(grant: TokenGrant, previous_refresh: Option<&str>, now: i64) -> Self {
        let refresh_token = grant
            .refresh_token
            .or_else(|| previous_refresh.map(str::to_string))
            .unwrap_or_default();

        Self {
            access_token: grant.access_token,
            refresh_token,
            expiry: now + grant.expires_in,
        }
    }
}

/// Token endpoint response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds.
    pub expires_in: i64,
}

/// Authorization-server grants.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Exchange an authorization code for tokens.
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, SpotifyError>;

    /// Refresh an access token.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, SpotifyError>;
}

/// Hands out valid access tokens for one user.
pub struct TokenManager {
    exchange: Arc<dyn TokenExchange>,
    token: Mutex<Option<TokenData>>,
    refreshed: AtomicBool,
}

impl TokenManager {
    /// Create a manager around the user's stored token, if any.
    pub fn new(exchange: Arc<dyn TokenExchange>, token: Option<TokenData>) -> Self {
        Self {
            exchange,
            token: Mutex::new(token),
            refreshed: AtomicBool::new(false),
        }
    }

    /// Exchange an authorization code and return a manager holding the
    /// resulting token.
    pub async fn authorize(
        exchange: Arc<dyn TokenExchange>,
        code: &str,
    ) -> Result<Self, SpotifyError> {
        let grant = exchange.exchange_code(code).await?;
        let token = TokenData::from_grant(grant, None, now());
        debug!("Authorization code exchanged");

        let manager = Self::new(exchange, Some(token));
        manager.refreshed.store(true, Ordering::SeqCst);
        Ok(manager)
    }

    /// Return a usable access token.
    ///
    /// No token at all yields [`SpotifyError::AuthExpired`]. An unexpired
    /// token is returned as is. An expired one is refreshed; any failure
    /// there yields [`SpotifyError::AuthRefreshFailed`].
    pub async fn valid_token(&self) -> Result<String, SpotifyError> {
        let mut guard = self.token.lock().await;
        let current = guard.as_ref().ok_or(SpotifyError::AuthExpired)?;

        let now = now();
        if current.is_valid_at(now) {
            return Ok(current.access_token.clone());
        }

        debug!("Access token expired, refreshing");
        let grant = self
            .exchange
            .refresh(&current.refresh_token)
            .await
            .map_err(|e| {
                warn!("Token refresh failed: {}", e);
                match e {
                    SpotifyError::AuthRefreshFailed(msg) => SpotifyError::AuthRefreshFailed(msg),
                    other => SpotifyError::AuthRefreshFailed(other.to_string()),
                }
            })?;

        let refreshed = TokenData::from_grant(grant, Some(&current.refresh_token), now);
        let access = refreshed.access_token.clone();
        *guard = Some(refreshed);
        self.refreshed.store(true, Ordering::SeqCst);

        Ok(access)
    }

    /// The currently held token.
    pub async fn current(&self) -> Option<TokenData> {
        self.token.lock().await.clone()
    }

    /// Whether the held token changed since construction.
    pub fn was_refreshed(&self) -> bool {
        self.refreshed.load(Ordering::SeqCst)
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingExchange {
        refreshes: AtomicUsize,
        fail: bool,
        rotate_refresh: bool,
    }

    impl CountingExchange {
        fn new(fail: bool, rotate_refresh: bool) -> Arc<Self> {
            Arc::new(Self {
                refreshes: AtomicUsize::new(0),
                fail,
                rotate_refresh,
            })
        }
    }

    #[async_trait]
    impl TokenExchange for CountingExchange {
        async fn exchange_code(&self, code: &str) -> Result<TokenGrant, SpotifyError> {
            Ok(TokenGrant {
                access_token: format!("access-{}", code),
                refresh_token: Some("refresh-1".to_string()),
                expires_in: 3600,
            })
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant, SpotifyError> {
            let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                return Err(SpotifyError::Upstream {
                    status: 400,
                    message: "invalid_grant".to_string(),
                });
            }
            Ok(TokenGrant {
                access_token: format!("access-r{}", n),
                refresh_token: self.rotate_refresh.then(|| format!("refresh-r{}", n)),
                expires_in: 3600,
            })
        }
    }

    fn token(expiry: i64) -> TokenData {
        TokenData {
            access_token: "access-0".to_string(),
            refresh_token: "refresh-0".to_string(),
            expiry,
        }
    }

    #[tokio::test]
    async fn test_valid_token_without_refresh() {
        let exchange = CountingExchange::new(false, false);
        let manager = TokenManager::new(exchange.clone(), Some(token(now() + 600)));

        assert_eq!(manager.valid_token().await.unwrap(), "access-0");
        assert_eq!(manager.valid_token().await.unwrap(), "access-0");
        assert_eq!(exchange.refreshes.load(Ordering::SeqCst), 0);
        assert!(!manager.was_refreshed());
    }

    #[tokio::test]
    async fn test_expired_token_refreshes_once() {
        let exchange = CountingExchange::new(false, false);
        let manager = TokenManager::new(exchange.clone(), Some(token(now() - 1)));

        assert_eq!(manager.valid_token().await.unwrap(), "access-r1");
        assert_eq!(manager.valid_token().await.unwrap(), "access-r1");
        assert_eq!(exchange.refreshes.load(Ordering::SeqCst), 1);
        assert!(manager.was_refreshed());

        let stored = manager.current().await.unwrap();
        assert_eq!(stored.refresh_token, "refresh-0");
        assert!(stored.expiry > now());
    }

    #[tokio::test]
    async fn test_refresh_rotates_refresh_token() {
        let exchange = CountingExchange::new(false, true);
        let manager = TokenManager::new(exchange, Some(token(now() - 1)));

        manager.valid_token().await.unwrap();
        assert_eq!(manager.current().await.unwrap().refresh_token, "refresh-r1");
    }

    #[tokio::test]
    async fn test_missing_token_is_auth_expired() {
        let manager = TokenManager::new(CountingExchange::new(false, false), None);
        assert!(matches!(
            manager.valid_token().await,
            Err(SpotifyError::AuthExpired)
        ));
    }

    #[tokio::test]
    async fn test_refresh_failure() {
        let manager = TokenManager::new(CountingExchange::new(true, false), Some(token(now() - 1)));
        let err = manager.valid_token().await.unwrap_err();
        assert!(matches!(err, SpotifyError::AuthRefreshFailed(_)));
        assert!(err.requires_authorization());
        assert!(!manager.was_refreshed());
    }

    #[tokio::test]
    async fn test_authorize_exchanges_code() {
        let manager = TokenManager::authorize(CountingExchange::new(false, false), "abc")
            .await
            .unwrap();
        assert_eq!(manager.valid_token().await.unwrap(), "access-abc");
        assert!(manager.was_refreshed());
    }
}
