//! Authenticated HTTP client for the Mentorlink API. Wraps every outbound
//! request with bearer injection and a single 401-driven refresh-and-retry.
//! A request is never retried more than once regardless of nested 401s.

use std::sync::Arc;

use reqwest::{Method, Url};
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::error::{normalize_response, transport_from, ApiError, ApiResult};
use crate::models::{AuthResponse, LoginCredentials, RegisterCredentials, Role, User, UserUpdate};
use crate::refresh::{ExpiryHook, RefreshCoordinator};
use crate::tokens::{SharedTokenStore, TokenStore};

pub struct ApiClient {
    base: Url,
    http: reqwest::Client,
    tokens: SharedTokenStore,
    refresher: RefreshCoordinator,
    expiry: ExpiryHook,
}

impl ApiClient {
    pub fn new(cfg: &ClientConfig, tokens: SharedTokenStore) -> anyhow::Result<Self> {
        use anyhow::Context;
        let base = Url::parse(&cfg.base_url).context("invalid base URL")?;
        let http = reqwest::Client::builder().timeout(cfg.timeout).build()?;
        let expiry = ExpiryHook::default();
        let refresher = RefreshCoordinator::new(tokens.clone(), http.clone(), &base, expiry.clone())?;
        Ok(Self { base, http, tokens, refresher, expiry })
    }

    /// Hook fired on terminal auth failure (refresh impossible or rejected,
    /// or a 401 straight after a successful refresh).
    pub fn expiry_hook(&self) -> &ExpiryHook {
        &self.expiry
    }

    pub fn token_store(&self) -> SharedTokenStore {
        Arc::clone(&self.tokens)
    }

    /// Single send with at most one refresh-driven retry. `retry_on_auth` is
    /// false for credential endpoints: a 401 from login must surface directly
    /// and leave any existing session untouched.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        retry_on_auth: bool,
    ) -> ApiResult<reqwest::Response> {
        let url = self
            .base
            .join(path)
            .map_err(|e| ApiError::transport(e.to_string(), 500, path.to_string()))?;

        let mut retried = false;
        let mut bearer = self.tokens.access_token();
        loop {
            let mut req = self.http.request(method.clone(), url.clone());
            if let Some(b) = &body {
                req = req.json(b);
            }
            if let Some(tok) = &bearer {
                req = req.bearer_auth(tok);
            }
            let resp = req.send().await.map_err(|e| transport_from(&e, path))?;
            let status = resp.status();
            if status.is_success() {
                return Ok(resp);
            }

            if status.as_u16() == 401 && retry_on_auth {
                if retried {
                    // Second 401 after a successful refresh: the session is dead.
                    let err = normalize_response(resp, path).await;
                    tracing::warn!("http.auth_failed_after_retry path={}", path);
                    self.tokens.clear();
                    self.expiry.notify();
                    return Err(err);
                }
                tracing::debug!("http.unauthorized path={} driving refresh", path);
                match self.refresher.refresh().await {
                    Ok(token) => {
                        retried = true;
                        bearer = Some(token);
                        continue;
                    }
                    Err(e) => {
                        // Coordinator already cleared the store and fired the hook.
                        return Err(ApiError::auth(e.message().to_string(), 401, path.to_string()));
                    }
                }
            }

            return Err(normalize_response(resp, path).await);
        }
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response, path: &str) -> ApiResult<T> {
        resp.json::<T>().await.map_err(|e| transport_from(&e, path))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let resp = self.execute(Method::GET, path, None, true).await?;
        Self::decode(resp, path).await
    }

    async fn patch_json<T: DeserializeOwned>(&self, path: &str, body: serde_json::Value) -> ApiResult<T> {
        let resp = self.execute(Method::PATCH, path, Some(body), true).await?;
        Self::decode(resp, path).await
    }

    // --- auth endpoints ---

    pub async fn login(&self, creds: &LoginCredentials) -> ApiResult<AuthResponse> {
        let path = "/auth/login";
        let body = serde_json::to_value(creds).map_err(|e| ApiError::transport(e.to_string(), 500, path.to_string()))?;
        let resp = self.execute(Method::POST, path, Some(body), false).await?;
        Self::decode(resp, path).await
    }

    pub async fn register(&self, creds: &RegisterCredentials) -> ApiResult<AuthResponse> {
        let path = "/auth/register";
        let body = serde_json::to_value(creds).map_err(|e| ApiError::transport(e.to_string(), 500, path.to_string()))?;
        let resp = self.execute(Method::POST, path, Some(body), false).await?;
        Self::decode(resp, path).await
    }

    pub async fn get_profile(&self) -> ApiResult<User> {
        self.get_json("/auth/profile").await
    }

    /// Best-effort server-side logout notification. Non-retryable; callers
    /// clear local state regardless of the outcome.
    pub async fn logout_remote(&self) -> ApiResult<()> {
        let path = "/auth/logout";
        self.execute(Method::POST, path, None, false).await?;
        Ok(())
    }

    pub async fn update_user_roles(&self, user_id: i64, roles: &[Role]) -> ApiResult<User> {
        let path = format!("/auth/users/{}/roles", user_id);
        self.patch_json(&path, serde_json::json!({ "roles": roles })).await
    }

    // --- user management endpoints ---

    pub async fn list_users(&self) -> ApiResult<Vec<User>> {
        self.get_json("/user").await
    }

    pub async fn get_user(&self, id: i64) -> ApiResult<User> {
        self.get_json(&format!("/user/{}", id)).await
    }

    pub async fn update_user(&self, id: i64, patch: &UserUpdate) -> ApiResult<User> {
        let path = format!("/user/{}", id);
        let body = serde_json::to_value(patch).map_err(|e| ApiError::transport(e.to_string(), 500, path.clone()))?;
        self.patch_json(&path, body).await
    }

    pub async fn delete_user(&self, id: i64) -> ApiResult<()> {
        let path = format!("/user/{}", id);
        self.execute(Method::DELETE, &path, None, true).await?;
        Ok(())
    }
}
