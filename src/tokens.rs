//! Token persistence. Tokens are opaque strings: no expiry inspection, no
//! validation, just durable key/value storage that survives a process restart.
//! Only `SessionManager` and the refresh coordinator write through this trait.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::models::User;

pub const KEY_ACCESS: &str = "access_token";
pub const KEY_REFRESH: &str = "refresh_token";
pub const KEY_USER: &str = "user";

pub trait TokenStore: Send + Sync {
    fn access_token(&self) -> Option<String>;
    fn set_access_token(&self, token: &str);
    fn refresh_token(&self) -> Option<String>;
    fn set_refresh_token(&self, token: &str);
    fn cached_user(&self) -> Option<User>;
    fn set_cached_user(&self, user: &User);
    /// Remove both tokens and the cached user record. Idempotent.
    fn clear(&self);
    fn has_token(&self) -> bool {
        self.access_token().is_some()
    }
}

pub type SharedTokenStore = Arc<dyn TokenStore>;

/// In-memory store for tests and short-lived embeddings.
#[derive(Default)]
pub struct MemoryTokenStore {
    map: RwLock<HashMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, key: &str) -> Option<String> {
        self.map.read().get(key).cloned()
    }

    fn put(&self, key: &str, value: String) {
        self.map.write().insert(key.to_string(), value);
    }
}

impl TokenStore for MemoryTokenStore {
    fn access_token(&self) -> Option<String> {
        self.get(KEY_ACCESS)
    }
    fn set_access_token(&self, token: &str) {
        self.put(KEY_ACCESS, token.to_string());
    }
    fn refresh_token(&self) -> Option<String> {
        self.get(KEY_REFRESH)
    }
    fn set_refresh_token(&self, token: &str) {
        self.put(KEY_REFRESH, token.to_string());
    }
    fn cached_user(&self) -> Option<User> {
        self.get(KEY_USER).and_then(|s| serde_json::from_str(&s).ok())
    }
    fn set_cached_user(&self, user: &User) {
        if let Ok(s) = serde_json::to_string(user) {
            self.put(KEY_USER, s);
        }
    }
    fn clear(&self) {
        let mut m = self.map.write();
        m.remove(KEY_ACCESS);
        m.remove(KEY_REFRESH);
        m.remove(KEY_USER);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TokenFile {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    user: Option<User>,
}

/// File-backed store: a single JSON document, read once at construction and
/// written through on every mutation. Write failures are logged and do not
/// break the in-memory view.
pub struct FileTokenStore {
    path: PathBuf,
    state: RwLock<TokenFile>,
}

impl FileTokenStore {
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut state = TokenFile::default();
        if let Ok(bytes) = std::fs::read(&path) {
            match serde_json::from_slice::<TokenFile>(&bytes) {
                Ok(s) => state = s,
                Err(e) => tracing::warn!("tokens.load path={} unreadable: {}", path.display(), e),
            }
        }
        Self { path, state: RwLock::new(state) }
    }

    fn persist(&self, state: &TokenFile) {
        if let Some(dir) = self.path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        match serde_json::to_vec_pretty(state) {
            Ok(bytes) => {
                if let Err(e) = std::fs::write(&self.path, bytes) {
                    tracing::warn!("tokens.persist path={} failed: {}", self.path.display(), e);
                }
            }
            Err(e) => tracing::warn!("tokens.persist encode failed: {}", e),
        }
    }

    fn mutate<F: FnOnce(&mut TokenFile)>(&self, f: F) {
        let mut st = self.state.write();
        f(&mut st);
        self.persist(&st);
    }
}

impl TokenStore for FileTokenStore {
    fn access_token(&self) -> Option<String> {
        self.state.read().access_token.clone()
    }
    fn set_access_token(&self, token: &str) {
        self.mutate(|s| s.access_token = Some(token.to_string()));
    }
    fn refresh_token(&self) -> Option<String> {
        self.state.read().refresh_token.clone()
    }
    fn set_refresh_token(&self, token: &str) {
        self.mutate(|s| s.refresh_token = Some(token.to_string()));
    }
    fn cached_user(&self) -> Option<User> {
        self.state.read().user.clone()
    }
    fn set_cached_user(&self, user: &User) {
        self.mutate(|s| s.user = Some(user.clone()));
    }
    fn clear(&self) {
        self.mutate(|s| *s = TokenFile::default());
    }
}
