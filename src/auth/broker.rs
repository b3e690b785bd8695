//! Credential broker: cached, silent, then interactive acquisition
//!
//! Owns the current session. All failures come back as values; the only
//! fallback is the single silent-to-interactive step, with no retries or
//! backoff on top.

use std::sync::{Mutex, MutexGuard};

use super::provider::{ProviderGrant, TokenProvider};
use super::tokens::{scope_key, CachedAccount, TokenStore};
use super::AuthError;
use crate::config::CredentialCache;

pub struct CredentialBroker {
    provider: Box<dyn TokenProvider>,
    cache: Mutex<CredentialCache>,
}

impl CredentialBroker {
    pub fn new(provider: Box<dyn TokenProvider>, cache: CredentialCache) -> Self {
        Self {
            provider,
            cache: Mutex::new(cache),
        }
    }

    // The lock is only ever held between suspension points, never across one.
    fn lock(&self) -> MutexGuard<'_, CredentialCache> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Produce a valid bearer token for `scopes`, prompting the user only if
    /// every non-interactive path fails.
    pub async fn acquire_token(&self, scopes: &[String]) -> Result<String, AuthError> {
        let key = scope_key(scopes);

        // Fresh cached token for this scope set wins outright.
        {
            let cache = self.lock();
            if let Some(stored) = cache.get_token(&key) {
                if !stored.is_expired() {
                    tracing::debug!("using cached token for [{key}]");
                    return Ok(stored.token);
                }
            }
        }

        let (account, refresh_token) = {
            let cache = self.lock();
            (cache.get_account(), cache.get_refresh_token())
        };

        if account.is_some() {
            tracing::debug!("attempting silent token acquisition for [{key}]");
            match self
                .provider
                .acquire_silent(refresh_token.as_deref(), scopes)
                .await
            {
                Ok(grant) => return self.store_grant(&key, grant, false),
                Err(e) => {
                    tracing::debug!("silent acquisition failed: {e:#}; falling back to interactive")
                }
            }
        } else {
            tracing::debug!("no cached account; going straight to interactive");
        }

        let grant = self.provider.acquire_interactive(scopes).await?;
        self.store_grant(&key, grant, true)
    }

    fn store_grant(
        &self,
        key: &str,
        grant: ProviderGrant,
        interactive: bool,
    ) -> Result<String, AuthError> {
        if grant.access_token.is_empty() {
            return Err(AuthError::NoToken);
        }

        let mut cache = self.lock();
        cache.set_token(key, grant.access_token.clone(), grant.expires_in);
        if let Some(rt) = grant.refresh_token {
            cache.set_refresh_token(rt);
        }
        if let Some(account) = grant.account {
            if interactive || cache.get_account().is_none() {
                cache.set_account(account);
            }
        }
        if let Err(e) = cache.save() {
            tracing::warn!("failed to persist credential cache: {e:#}");
        }

        Ok(grant.access_token)
    }

    /// Best-effort sign-out: removes every cached credential entry and clears
    /// the account. Partial failures are logged, never propagated.
    pub fn sign_out(&self) {
        let mut cache = self.lock();
        tracing::info!(
            "signing out; removing {} cached token entries",
            cache.tokens.len()
        );
        cache.clear();
        if let Err(e) = cache.save() {
            tracing::warn!("failed to persist credential cache: {e:#}");
        }
    }

    /// The signed-in account, if any.
    pub fn account(&self) -> Option<CachedAccount> {
        self.lock().get_account()
    }

    /// Read-only copy of the session material, for status display.
    pub fn cache_snapshot(&self) -> CredentialCache {
        self.lock().clone()
    }
}
