//! Single-flight token refresh. Any number of requests that observe a 401
//! while a refresh is outstanding park on the same in-flight operation; at
//! most one `POST /auth/refresh` is ever on the wire.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use reqwest::Url;
use tokio::sync::oneshot;

use crate::error::{normalize_response, transport_from, ApiError, ApiResult};
use crate::tokens::{SharedTokenStore, TokenStore};

pub const REFRESH_PATH: &str = "/auth/refresh";

/// Callback fired when the session is terminally dead (refresh failed or was
/// impossible). `SessionManager` installs itself here so token-level failures
/// clear the cached user without the HTTP layer knowing about session state.
#[derive(Clone, Default)]
pub struct ExpiryHook {
    inner: Arc<RwLock<Option<Box<dyn Fn() + Send + Sync>>>>,
}

impl ExpiryHook {
    pub fn set<F: Fn() + Send + Sync + 'static>(&self, f: F) {
        *self.inner.write() = Some(Box::new(f));
    }

    pub fn notify(&self) {
        if let Some(f) = self.inner.read().as_ref() {
            f();
        }
    }
}

enum RefreshState {
    Idle,
    /// Waiters appended while a refresh is on the wire; all receive the same outcome.
    Refreshing(Vec<oneshot::Sender<ApiResult<String>>>),
}

pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
    tokens: SharedTokenStore,
    http: reqwest::Client,
    refresh_url: Url,
    expiry: ExpiryHook,
}

impl RefreshCoordinator {
    pub fn new(tokens: SharedTokenStore, http: reqwest::Client, base: &Url, expiry: ExpiryHook) -> anyhow::Result<Self> {
        let refresh_url = base.join(REFRESH_PATH)?;
        Ok(Self { state: Mutex::new(RefreshState::Idle), tokens, http, refresh_url, expiry })
    }

    /// Obtain a fresh access token. The first caller drives the network call;
    /// concurrent callers await the shared outcome. On success the store holds
    /// the new token pair. On failure the store is cleared and the expiry hook
    /// fires — the session is over.
    pub async fn refresh(&self) -> ApiResult<String> {
        // Lock is never held across an await: either we enqueue and drop it,
        // or we take ownership of the refresh and drop it.
        let waiter = {
            let mut st = self.state.lock();
            match &mut *st {
                RefreshState::Refreshing(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Some(rx)
                }
                RefreshState::Idle => {
                    *st = RefreshState::Refreshing(Vec::new());
                    None
                }
            }
        };

        if let Some(rx) = waiter {
            return match rx.await {
                Ok(outcome) => outcome,
                Err(_) => Err(ApiError::transport("refresh coordinator dropped", 500, REFRESH_PATH)),
            };
        }

        // If the driving future is dropped mid-refresh the guard settles the
        // waiters and returns the state to Idle; nobody is left parked.
        let mut guard = SettleOnDrop { coord: self, armed: true };
        let outcome = self.perform_refresh().await;
        guard.armed = false;
        drop(guard);
        self.settle(outcome.clone());
        outcome
    }

    fn settle(&self, outcome: ApiResult<String>) {
        let waiters = {
            let mut st = self.state.lock();
            match std::mem::replace(&mut *st, RefreshState::Idle) {
                RefreshState::Refreshing(w) => w,
                RefreshState::Idle => Vec::new(),
            }
        };
        tracing::debug!("refresh.settle waiters={} ok={}", waiters.len(), outcome.is_ok());
        for tx in waiters {
            let _ = tx.send(outcome.clone());
        }
    }

    async fn perform_refresh(&self) -> ApiResult<String> {
        let Some(refresh_token) = self.tokens.refresh_token() else {
            // No token, no network call: the session cannot be recovered.
            tracing::warn!("refresh.abort no refresh token stored");
            self.fail_terminally();
            return Err(ApiError::auth("no refresh token available", 401, REFRESH_PATH));
        };

        let send = self
            .http
            .post(self.refresh_url.clone())
            .json(&serde_json::json!({ "refreshToken": refresh_token }))
            .send()
            .await;

        let resp = match send {
            Ok(r) => r,
            Err(e) => {
                let err = transport_from(&e, REFRESH_PATH);
                tracing::warn!("refresh.transport_error {}", err);
                self.fail_terminally();
                return Err(err);
            }
        };

        if !resp.status().is_success() {
            let err = normalize_response(resp, REFRESH_PATH).await;
            tracing::warn!("refresh.rejected status={}", err.status_code());
            self.fail_terminally();
            return Err(err);
        }

        let pair: crate::models::RefreshResponse = match resp.json().await {
            Ok(p) => p,
            Err(e) => {
                let err = transport_from(&e, REFRESH_PATH);
                self.fail_terminally();
                return Err(err);
            }
        };

        self.tokens.set_access_token(&pair.access_token);
        self.tokens.set_refresh_token(&pair.refresh_token);
        tracing::info!("refresh.ok new token pair stored");
        Ok(pair.access_token)
    }

    fn fail_terminally(&self) {
        self.tokens.clear();
        self.expiry.notify();
    }
}

/// Held by the caller that owns the in-flight refresh. While armed, dropping
/// it settles the waiters with a transport error and resets the state to
/// Idle, so an abandoned leader cannot strand waiters in `Refreshing`.
struct SettleOnDrop<'a> {
    coord: &'a RefreshCoordinator,
    armed: bool,
}

impl Drop for SettleOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!("refresh.abandoned leader dropped mid-flight");
            self.coord
                .settle(Err(ApiError::transport("refresh abandoned", 500, REFRESH_PATH)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::{MemoryTokenStore, TokenStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn missing_refresh_token_fails_without_network() {
        // Base URL points at a port nothing listens on; a network attempt
        // would surface as a transport error instead of the auth error below.
        let tokens: SharedTokenStore = Arc::new(MemoryTokenStore::new());
        tokens.set_access_token("stale");
        let hook = ExpiryHook::default();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = fired.clone();
        hook.set(move || {
            fired2.fetch_add(1, Ordering::SeqCst);
        });
        let base = Url::parse("http://127.0.0.1:1").unwrap();
        let coord = RefreshCoordinator::new(tokens.clone(), reqwest::Client::new(), &base, hook).unwrap();

        let err = coord.refresh().await.unwrap_err();
        assert!(err.is_auth());
        assert_eq!(err.path(), REFRESH_PATH);
        assert!(!tokens.has_token(), "store must be cleared on terminal failure");
        assert_eq!(fired.load(Ordering::SeqCst), 1, "expiry hook must fire once");
    }

    #[tokio::test]
    async fn expiry_hook_is_optional() {
        let tokens: SharedTokenStore = Arc::new(MemoryTokenStore::new());
        let base = Url::parse("http://127.0.0.1:1").unwrap();
        let coord =
            RefreshCoordinator::new(tokens, reqwest::Client::new(), &base, ExpiryHook::default()).unwrap();
        // No hook installed: still fails cleanly
        assert!(coord.refresh().await.is_err());
    }
}
