//! Session lifecycle: the single source of truth for "is a session active".
//! Authentication is optimistic: once a profile has been fetched the user
//! stays logged in until a refresh or profile fetch definitively fails.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::ClientConfig;
use crate::error::ApiResult;
use crate::gate::SessionSnapshot;
use crate::http::ApiClient;
use crate::models::{AuthResponse, LoginCredentials, RegisterCredentials, Role, User, UserUpdate};
use crate::roles;
use crate::tokens::{FileTokenStore, MemoryTokenStore, SharedTokenStore, TokenStore};

struct SessionState {
    user: Option<User>,
    /// True from construction until `bootstrap` completes, and for the
    /// duration of login/register calls.
    loading: bool,
}

pub struct SessionManager {
    api: Arc<ApiClient>,
    tokens: SharedTokenStore,
    state: Arc<RwLock<SessionState>>,
}

impl SessionManager {
    /// Build with the store selected by the config: file-backed when a token
    /// path is set, in-memory otherwise.
    pub fn new(cfg: ClientConfig) -> anyhow::Result<Self> {
        let tokens: SharedTokenStore = match &cfg.token_path {
            Some(path) => Arc::new(FileTokenStore::load_or_default(path)),
            None => Arc::new(MemoryTokenStore::new()),
        };
        Self::with_store(cfg, tokens)
    }

    pub fn with_store(cfg: ClientConfig, tokens: SharedTokenStore) -> anyhow::Result<Self> {
        let api = Arc::new(ApiClient::new(&cfg, tokens.clone())?);
        let state = Arc::new(RwLock::new(SessionState { user: None, loading: true }));
        // Terminal auth failures anywhere in the client clear the cached user.
        // Weak so the hook does not keep the state alive on its own.
        let weak = Arc::downgrade(&state);
        api.expiry_hook().set(move || {
            if let Some(st) = weak.upgrade() {
                st.write().user = None;
                tracing::info!("session.expired current user cleared");
            }
        });
        Ok(Self { api, tokens, state })
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Startup rehydration: with a persisted token, try to fetch the profile;
    /// any failure clears tokens and leaves the session unauthenticated. The
    /// loading flag is cleared on every exit path.
    pub async fn bootstrap(&self) {
        if self.tokens.has_token() {
            match self.api.get_profile().await {
                Ok(user) => {
                    tracing::info!("session.bootstrap restored user={}", user.email);
                    self.tokens.set_cached_user(&user);
                    self.state.write().user = Some(user);
                }
                Err(e) => {
                    tracing::warn!("session.bootstrap profile fetch failed: {}", e);
                    self.tokens.clear();
                    self.state.write().user = None;
                }
            }
        }
        self.state.write().loading = false;
    }

    /// Expected failures (bad credentials, validation) resolve to `false`;
    /// the session is left untouched and the error is surfaced in the log.
    pub async fn login(&self, creds: &LoginCredentials) -> bool {
        self.state.write().loading = true;
        let outcome = self.api.login(creds).await;
        let ok = match outcome {
            Ok(resp) => {
                self.adopt(resp);
                true
            }
            Err(e) => {
                tracing::warn!("session.login failed: {}", e);
                false
            }
        };
        self.state.write().loading = false;
        ok
    }

    /// Same contract as `login`, against the registration endpoint.
    pub async fn register(&self, creds: &RegisterCredentials) -> bool {
        self.state.write().loading = true;
        let outcome = self.api.register(creds).await;
        let ok = match outcome {
            Ok(resp) => {
                self.adopt(resp);
                true
            }
            Err(e) => {
                tracing::warn!("session.register failed: {}", e);
                false
            }
        };
        self.state.write().loading = false;
        ok
    }

    fn adopt(&self, resp: AuthResponse) {
        self.tokens.set_access_token(&resp.access_token);
        if let Some(rt) = &resp.refresh_token {
            self.tokens.set_refresh_token(rt);
        }
        self.tokens.set_cached_user(&resp.user);
        tracing::info!("session.active user={} id={}", resp.user.email, resp.user.id);
        self.state.write().user = Some(resp.user);
    }

    /// Best-effort remote notification; local session and tokens are cleared
    /// regardless of the remote outcome.
    pub async fn logout(&self) {
        if let Err(e) = self.api.logout_remote().await {
            tracing::warn!("session.logout remote notify failed: {}", e);
        }
        self.force_logout();
        tracing::info!("session.logout local state cleared");
    }

    /// Local-only teardown. Also the target of the client's expiry hook via
    /// the token store clear performed at the failure site.
    pub fn force_logout(&self) {
        self.tokens.clear();
        self.state.write().user = None;
    }

    /// Re-fetch the current user. Failure is terminal: the session is forced
    /// to logout and the error propagates.
    pub async fn refresh_profile(&self) -> ApiResult<User> {
        match self.api.get_profile().await {
            Ok(user) => {
                self.tokens.set_cached_user(&user);
                self.state.write().user = Some(user.clone());
                Ok(user)
            }
            Err(e) => {
                tracing::warn!("session.refresh_profile failed, logging out: {}", e);
                self.force_logout();
                Err(e)
            }
        }
    }

    // --- pure reads ---

    pub fn is_authenticated(&self) -> bool {
        self.state.read().user.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().loading
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.read().user.clone()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.state
            .read()
            .user
            .as_ref()
            .map(|u| roles::has_role(&u.roles, role))
            .unwrap_or(false)
    }

    pub fn is_admin(&self) -> bool {
        self.state.read().user.as_ref().map(|u| roles::is_admin(&u.roles)).unwrap_or(false)
    }

    pub fn is_super_admin(&self) -> bool {
        self.state
            .read()
            .user
            .as_ref()
            .map(|u| roles::is_super_admin(&u.roles))
            .unwrap_or(false)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let st = self.state.read();
        SessionSnapshot {
            is_authenticated: st.user.is_some(),
            is_loading: st.loading,
            user: st.user.clone(),
        }
    }

    // --- user management passthroughs ---

    pub async fn update_user_roles(&self, user_id: i64, new_roles: &[Role]) -> ApiResult<User> {
        self.api.update_user_roles(user_id, new_roles).await
    }

    pub async fn list_users(&self) -> ApiResult<Vec<User>> {
        self.api.list_users().await
    }

    pub async fn get_user(&self, id: i64) -> ApiResult<User> {
        self.api.get_user(id).await
    }

    pub async fn update_user(&self, id: i64, patch: &UserUpdate) -> ApiResult<User> {
        self.api.update_user(id, patch).await
    }

    pub async fn delete_user(&self, id: i64) -> ApiResult<()> {
        self.api.delete_user(id).await
    }

    #[cfg(test)]
    pub(crate) fn set_user_for_test(&self, user: Option<User>) {
        let mut st = self.state.write();
        st.user = user;
        st.loading = false;
    }
}
