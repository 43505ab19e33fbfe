pub mod config;
pub mod error;
pub mod gate;
pub mod http;
pub mod models;
pub mod refresh;
pub mod roles;
pub mod session;
pub mod tokens;

pub use config::ClientConfig;
pub use error::{ApiError, ApiResult};
pub use gate::{Access, RouteGuard, SessionSnapshot};
pub use http::ApiClient;
pub use models::{AuthResponse, LoginCredentials, RegisterCredentials, Role, User, UserUpdate};
pub use session::SessionManager;
pub use tokens::{FileTokenStore, MemoryTokenStore, TokenStore};

// Test-only printing helper: expands to eprintln! during tests and is absent otherwise.
// Usage in tests: tprintln!("debug: {}", value);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In non-test builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        // Preserve formatting checks in release without producing code
        if false { let _ = format!($($arg)*); }
    });
}
