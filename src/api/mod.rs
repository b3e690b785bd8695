//! REST clients for Microsoft Graph (device directory) and Azure Key Vault

pub mod client;
pub mod devices;
pub mod vault;

pub use client::ApiClient;

use thiserror::Error;

use crate::auth::AuthError;

/// Failure taxonomy for Graph and Key Vault calls. Every operation returns
/// one of these to its caller; nothing is raised across the async boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("HTTP {0}")]
    Http(u16),
    #[error("failed to decode response: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("response body missing expected fields")]
    InvalidResponse,
    #[error("failed to encode request body: {0}")]
    Encoding(#[source] serde_json::Error),
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use futures::future::BoxFuture;

    use super::ApiClient;
    use crate::auth::{AuthError, CredentialBroker, ProviderGrant, TokenProvider};
    use crate::config::CredentialCache;

    /// Provider that always grants the same token, so client tests exercise
    /// only the HTTP layer.
    pub struct StaticProvider;

    impl TokenProvider for StaticProvider {
        fn acquire_silent<'a>(
            &'a self,
            _refresh_token: Option<&'a str>,
            _scopes: &'a [String],
        ) -> BoxFuture<'a, Result<ProviderGrant, AuthError>> {
            Box::pin(async { Err(AuthError::NoAccount) })
        }

        fn acquire_interactive<'a>(
            &'a self,
            _scopes: &'a [String],
        ) -> BoxFuture<'a, Result<ProviderGrant, AuthError>> {
            Box::pin(async {
                Ok(ProviderGrant {
                    access_token: "test-token".to_string(),
                    expires_in: Some(3600),
                    refresh_token: None,
                    account: None,
                })
            })
        }
    }

    pub fn test_client(base_url: &str) -> ApiClient {
        let broker = Arc::new(CredentialBroker::new(
            Box::new(StaticProvider),
            CredentialCache::default(),
        ));
        ApiClient::with_base_urls(
            broker,
            base_url,
            base_url,
            "https://graph.microsoft.com/.default",
            "https://vault.azure.net/.default",
        )
    }
}
