//! Client configuration. Defaults favor local development; every field can be
//! overridden from the environment so the CLI and embedders share one setup path.

use std::path::PathBuf;
use std::time::Duration;

pub const ENV_API_URL: &str = "MENTORLINK_API_URL";
pub const ENV_TIMEOUT_MS: &str = "MENTORLINK_TIMEOUT_MS";
pub const ENV_TOKEN_FILE: &str = "MENTORLINK_TOKEN_FILE";

const DEFAULT_API_URL: &str = "http://localhost:3000";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the remote user-management API.
    pub base_url: String,
    /// Transport timeout applied to every request; converts hangs into
    /// normalized transport errors.
    pub timeout: Duration,
    /// Where the file-backed token store lives. None keeps tokens in memory only.
    pub token_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            token_path: None,
        }
    }
}

fn parse_ms_env(name: &str) -> Option<u64> {
    match std::env::var(name) {
        Ok(val) => val.parse::<u64>().ok(),
        Err(_) => None,
    }
}

/// Default on-disk token store location, anchored under the home directory so
/// every invocation sees the same session regardless of working directory.
/// Falls back to a relative path when HOME is unset.
pub fn default_token_path() -> PathBuf {
    match std::env::var("HOME") {
        Ok(home) if !home.is_empty() => PathBuf::from(home).join(".mentorlink").join("tokens.json"),
        _ => PathBuf::from(".mentorlink/tokens.json"),
    }
}

impl ClientConfig {
    /// Defaults overlaid with `MENTORLINK_*` environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(url) = std::env::var(ENV_API_URL) {
            if !url.is_empty() {
                cfg.base_url = url;
            }
        }
        if let Some(ms) = parse_ms_env(ENV_TIMEOUT_MS) {
            cfg.timeout = Duration::from_millis(ms);
        }
        if let Ok(p) = std::env::var(ENV_TOKEN_FILE) {
            if !p.is_empty() {
                cfg.token_path = Some(PathBuf::from(p));
            }
        }
        cfg
    }

    pub fn with_base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_token_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.token_path = Some(path.into());
        self
    }
}
