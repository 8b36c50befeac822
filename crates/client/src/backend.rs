//! Application backend contract and its HTTP implementation.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use idbridge_auth::SyncRole;

use crate::config::ClientConfig;
use crate::error::BackendError;
use crate::models::{ClientProfile, ContractorProfile};
use crate::provider::IdentityProvider;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Register the authenticated principal with the backend, optionally
    /// asking for `role_hint` to be assigned. Assumed idempotent server-side.
    async fn sync_current_user(&self, role_hint: Option<SyncRole>) -> Result<String, BackendError>;

    async fn fetch_contractor_profile(&self) -> Result<ContractorProfile, BackendError>;

    async fn fetch_client_profile(&self) -> Result<ClientProfile, BackendError>;
}

/// Supplies the bearer token attached to outgoing backend requests.
pub trait TokenSource: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

impl<P: IdentityProvider + ?Sized> TokenSource for P {
    fn bearer_token(&self) -> Option<String> {
        self.token().filter(|t| !t.is_empty())
    }
}

/// reqwest-backed [`Backend`].
///
/// Every request carries `Authorization: Bearer <token>` when the token
/// source currently has one.
pub struct HttpBackend {
    http: reqwest::Client,
    api_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig, tokens: Arc<dyn TokenSource>) -> Self {
        Self::with_client(reqwest::Client::new(), config, tokens)
    }

    pub fn with_client(http: reqwest::Client, config: &ClientConfig, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.api_url, path);
        let mut req = self.http.get(&url);

        if let Some(token) = self.tokens.bearer_token() {
            req = req.bearer_auth(token);
        }

        req
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, BackendError> {
        let resp = req
            .send()
            .await
            .map_err(|e| BackendError::transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::debug!(status = status.as_u16(), "backend returned an error status");
            return Err(BackendError::from_status(status.as_u16(), &body));
        }

        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let resp = self.send(self.get(path)).await?;
        let status = resp.status().as_u16();
        resp.json::<T>()
            .await
            .map_err(|e| BackendError::decode(status, e.to_string()))
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn sync_current_user(&self, role_hint: Option<SyncRole>) -> Result<String, BackendError> {
        let mut req = self.get("/api/users/sync");
        if let Some(role) = role_hint {
            req = req.query(&[("role", role.as_str())]);
        }

        let resp = self.send(req).await?;
        let status = resp.status().as_u16();
        resp.text()
            .await
            .map_err(|e| BackendError::decode(status, e.to_string()))
    }

    async fn fetch_contractor_profile(&self) -> Result<ContractorProfile, BackendError> {
        self.get_json("/api/contractors/me").await
    }

    async fn fetch_client_profile(&self) -> Result<ClientProfile, BackendError> {
        self.get_json("/api/clients/me").await
    }
}
