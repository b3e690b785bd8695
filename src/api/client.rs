//! Authenticated HTTP client for Graph and Key Vault
//!
//! Wraps reqwest::Client; every call asks the broker for a token scoped to
//! the target API before the request goes out.

use std::sync::Arc;

use super::ApiError;
use crate::auth::CredentialBroker;
use crate::config::Settings;

const GRAPH_BASE: &str = "https://graph.microsoft.com/beta";

pub struct ApiClient {
    http: reqwest::Client,
    broker: Arc<CredentialBroker>,
    graph_base: String,
    vault_base: String,
    graph_scopes: Vec<String>,
    vault_scopes: Vec<String>,
}

impl ApiClient {
    pub fn new(broker: Arc<CredentialBroker>, settings: &Settings) -> Self {
        Self::with_base_urls(
            broker,
            GRAPH_BASE,
            &settings.vault_url(),
            &settings.graph_scope,
            &settings.vault_scope,
        )
    }

    /// Constructor with explicit endpoints, for tests against a mock server.
    pub fn with_base_urls(
        broker: Arc<CredentialBroker>,
        graph_base: &str,
        vault_base: &str,
        graph_scope: &str,
        vault_scope: &str,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            broker,
            graph_base: graph_base.to_string(),
            vault_base: vault_base.to_string(),
            graph_scopes: vec![graph_scope.to_string()],
            vault_scopes: vec![vault_scope.to_string()],
        }
    }

    async fn graph_token(&self) -> Result<String, ApiError> {
        Ok(self.broker.acquire_token(&self.graph_scopes).await?)
    }

    async fn vault_token(&self) -> Result<String, ApiError> {
        Ok(self.broker.acquire_token(&self.vault_scopes).await?)
    }

    /// GET against the Graph API (path relative to the Graph base).
    pub async fn graph_get(&self, path: &str) -> Result<reqwest::Response, ApiError> {
        let url = format!("{}{}", self.graph_base, path);
        self.graph_get_url(&url).await
    }

    /// GET against an absolute Graph URL (continuation links).
    pub async fn graph_get_url(&self, url: &str) -> Result<reqwest::Response, ApiError> {
        let token = self.graph_token().await?;
        tracing::debug!("Graph GET {}", url);

        let resp = self
            .http
            .get(url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(ApiError::Network)?;

        check_response(resp, url).await
    }

    /// POST against the Graph API with a JSON body.
    pub async fn graph_post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, ApiError> {
        let token = self.graph_token().await?;
        let url = format!("{}{}", self.graph_base, path);
        tracing::debug!("Graph POST {}", url);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(body)
            .send()
            .await
            .map_err(ApiError::Network)?;

        check_response(resp, &url).await
    }

    /// GET against the Key Vault.
    pub async fn vault_get(&self, path: &str) -> Result<reqwest::Response, ApiError> {
        let token = self.vault_token().await?;
        let url = format!("{}{}", self.vault_base, path);
        tracing::debug!("Vault GET {}", url);

        let resp = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(ApiError::Network)?;

        check_response(resp, &url).await
    }

    /// PUT against the Key Vault with a pre-encoded JSON body.
    pub async fn vault_put(
        &self,
        path: &str,
        body: Vec<u8>,
    ) -> Result<reqwest::Response, ApiError> {
        let token = self.vault_token().await?;
        let url = format!("{}{}", self.vault_base, path);
        tracing::debug!("Vault PUT {}", url);

        let resp = self
            .http
            .put(&url)
            .bearer_auth(&token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(ApiError::Network)?;

        check_response(resp, &url).await
    }
}

/// Map any non-2xx status to the error taxonomy, logging the body for
/// diagnosis since the caller only sees the status.
async fn check_response(
    resp: reqwest::Response,
    url: &str,
) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        if body.is_empty() {
            tracing::debug!("HTTP {} for {}", status.as_u16(), url);
        } else {
            tracing::debug!("HTTP {} for {}: {}", status.as_u16(), url, body);
        }
        return Err(ApiError::Http(status.as_u16()));
    }
    Ok(resp)
}
