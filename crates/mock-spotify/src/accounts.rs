//! Fake authorization server.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use spotify_client::{SpotifyError, TokenExchange, TokenGrant};

/// A [`TokenExchange`] minting `access-{n}` / `refresh-{n}` tokens.
pub struct FakeAccounts {
    exchanges: AtomicUsize,
    refreshes: AtomicUsize,
    reject_codes: AtomicBool,
    reject_refresh: AtomicBool,
    expires_in: AtomicI64,
}

impl Default for FakeAccounts {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeAccounts {
    /// Accounts service granting hour-long tokens.
    pub fn new() -> Self {
        Self {
            exchanges: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
            reject_codes: AtomicBool::new(false),
            reject_refresh: AtomicBool::new(false),
            expires_in: AtomicI64::new(3600),
        }
    }

    /// Lifetime, in seconds, of granted access tokens.
    pub fn with_expires_in(self, seconds: i64) -> Self {
        self.expires_in.store(seconds, Ordering::SeqCst);
        self
    }

    /// Reject every authorization code from now on.
    pub fn reject_codes(&self) {
        self.reject_codes.store(true, Ordering::SeqCst);
    }

    /// Reject every refresh from now on.
    pub fn reject_refresh(&self) {
        self.reject_refresh.store(true, Ordering::SeqCst);
    }

    /// Number of code exchanges performed.
    pub fn exchange_count(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    /// Number of refreshes performed.
    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenExchange for FakeAccounts {
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, SpotifyError> {
        if self.reject_codes.load(Ordering::SeqCst) || code.is_empty() {
            return Err(SpotifyError::Upstream {
                status: 400,
                message: "invalid_grant".to_string(),
            });
        }

        let n = self.exchanges.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(TokenGrant {
            access_token: format!("access-{}", n),
            refresh_token: Some(format!("refresh-{}", n)),
            expires_in: self.expires_in.load(Ordering::SeqCst),
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, SpotifyError> {
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        if self.reject_refresh.load(Ordering::SeqCst) {
            return Err(SpotifyError::AuthRefreshFailed(format!(
                "refresh token {} revoked",
                refresh_token
            )));
        }

        Ok(TokenGrant {
            access_token: format!("access-refreshed-{}", n),
            refresh_token: None,
            expires_in: self.expires_in.load(Ordering::SeqCst),
        })
    }
}
