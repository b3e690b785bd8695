//! Authentication against Azure AD
//!
//! The credential broker hands out bearer tokens for a requested scope set,
//! trying a cached token, then a silent refresh-token grant, then the
//! interactive device-code flow, in that order.

pub mod broker;
pub mod provider;
pub mod tokens;

pub use broker::CredentialBroker;
pub use provider::{AzureAdProvider, ProviderGrant, TokenProvider};
pub use tokens::{CachedAccount, StoredToken, TokenStore};

use thiserror::Error;

/// Token acquisition failures.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Silent acquisition was requested without a cached session.
    #[error("no signed-in account")]
    NoAccount,
    /// The identity provider rejected or failed the request.
    #[error("identity provider error: {0}")]
    Provider(anyhow::Error),
    /// The provider reported success but the response carried no usable token.
    #[error("identity provider returned no usable token")]
    NoToken,
}
