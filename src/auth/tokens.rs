//! Token and account storage primitives

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A cached bearer token for one scope set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub token: String,
    pub expires_at: Option<u64>,
}

impl StoredToken {
    pub fn new(token: String, expires_in_secs: Option<u64>) -> Self {
        let expires_at = expires_in_secs.map(|secs| unix_now() + secs);
        Self { token, expires_at }
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            // Consider expired if less than 5 minutes remaining
            Some(exp) => unix_now() + 300 >= exp,
            None => false,
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// The signed-in identity: an opaque directory object id plus a display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedAccount {
    pub id: String,
    pub username: Option<String>,
}

/// Cache key for a scope set. Token validity is per scope set, not global.
pub fn scope_key(scopes: &[String]) -> String {
    scopes.join(" ")
}

/// Credential store backing the broker: per-scope tokens, the refresh token,
/// and the cached account.
pub trait TokenStore {
    fn get_token(&self, scope_key: &str) -> Option<StoredToken>;
    fn set_token(&mut self, scope_key: &str, token: String, expires_in: Option<u64>);
    fn get_refresh_token(&self) -> Option<String>;
    fn set_refresh_token(&mut self, token: String);
    fn get_account(&self) -> Option<CachedAccount>;
    fn set_account(&mut self, account: CachedAccount);
    fn clear(&mut self);
}
