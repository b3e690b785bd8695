//! Settings and credential storage
//!
//! `Settings` holds the externally supplied values the console cannot run
//! without; it is read once at startup and immutable afterwards. The
//! `CredentialCache` holds the mutable session material (account, refresh
//! token, per-scope tokens) and persists it with restrictive permissions.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

use crate::auth::{CachedAccount, StoredToken, TokenStore};

/// Startup-fatal: one or more required settings are absent.
#[derive(Debug, Error)]
#[error("missing required settings: {}", .0.join(", "))]
pub struct ConfigurationMissing(pub Vec<&'static str>);

/// Required, immutable application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub tenant_id: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub graph_scope: String,
    pub vault_scope: String,
    pub vault_name: String,
    pub script_policy_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    tenant_id: Option<String>,
    client_id: Option<String>,
    redirect_uri: Option<String>,
    graph_scope: Option<String>,
    vault_scope: Option<String>,
    vault_name: Option<String>,
    script_policy_id: Option<String>,
}

fn require(
    value: Option<String>,
    key: &'static str,
    missing: &mut Vec<&'static str>,
) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => {
            missing.push(key);
            String::new()
        }
    }
}

impl Settings {
    /// Load settings from disk. Every key is required; any absence is a
    /// non-recoverable startup error.
    pub fn load() -> Result<Self> {
        let path = Self::settings_path()?;
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a settings document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let raw: RawSettings = toml::from_str(content).context("failed to parse settings")?;

        let mut missing = Vec::new();
        let settings = Settings {
            tenant_id: require(raw.tenant_id, "tenant_id", &mut missing),
            client_id: require(raw.client_id, "client_id", &mut missing),
            redirect_uri: require(raw.redirect_uri, "redirect_uri", &mut missing),
            graph_scope: require(raw.graph_scope, "graph_scope", &mut missing),
            vault_scope: require(raw.vault_scope, "vault_scope", &mut missing),
            vault_name: require(raw.vault_name, "vault_name", &mut missing),
            script_policy_id: require(raw.script_policy_id, "script_policy_id", &mut missing),
        };

        if !missing.is_empty() {
            return Err(ConfigurationMissing(missing).into());
        }
        Ok(settings)
    }

    /// Key Vault base URL derived from the vault name.
    pub fn vault_url(&self) -> String {
        format!("https://{}.vault.azure.net", self.vault_name)
    }

    fn settings_path() -> Result<PathBuf> {
        Ok(config_dir()?.join("settings.toml"))
    }
}

fn config_dir() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("com", "laps-cli", "laps-cli")
        .context("Could not determine config directory")?;
    Ok(proj_dirs.config_dir().to_path_buf())
}

/// Cached session material. Loaded from disk at startup; `save` is a no-op
/// for caches that were never given a backing path (tests, ephemeral runs).
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CredentialCache {
    pub account: Option<CachedAccount>,
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub tokens: HashMap<String, StoredToken>,
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl CredentialCache {
    /// Load the credential cache from disk, defaulting to empty.
    pub fn load() -> Result<Self> {
        let path = config_dir()?.join("credentials.toml");

        if !path.exists() {
            return Ok(Self {
                path: Some(path),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&path).context("Failed to read credential cache")?;
        let mut cache: Self =
            toml::from_str(&content).context("Failed to parse credential cache")?;
        cache.path = Some(path);
        Ok(cache)
    }

    /// Persist the cache with owner-only permissions (it holds tokens).
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize credentials")?;
        fs::write(path, content).context("Failed to write credential cache")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(path, perms).context("Failed to set cache permissions")?;
        }

        Ok(())
    }
}

impl TokenStore for CredentialCache {
    fn get_token(&self, scope_key: &str) -> Option<StoredToken> {
        self.tokens.get(scope_key).cloned()
    }

    fn set_token(&mut self, scope_key: &str, token: String, expires_in: Option<u64>) {
        self.tokens
            .insert(scope_key.to_string(), StoredToken::new(token, expires_in));
    }

    fn get_refresh_token(&self) -> Option<String> {
        self.refresh_token.clone()
    }

    fn set_refresh_token(&mut self, token: String) {
        self.refresh_token = Some(token);
    }

    fn get_account(&self) -> Option<CachedAccount> {
        self.account.clone()
    }

    fn set_account(&mut self, account: CachedAccount) {
        self.account = Some(account);
    }

    fn clear(&mut self) {
        self.account = None;
        self.refresh_token = None;
        self.tokens.clear();
    }
}
