//! Azure AD token acquisition: refresh-token grant (silent) and the
//! device-code flow (interactive).

use anyhow::Result;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use futures::future::BoxFuture;
use oauth2::{
    basic::BasicClient, AuthUrl, ClientId, DeviceAuthorizationUrl, RedirectUrl, RefreshToken,
    Scope, StandardDeviceAuthorizationResponse, TokenResponse, TokenUrl,
};
use serde::Deserialize;

use super::tokens::CachedAccount;
use super::AuthError;
use crate::config::Settings;

/// Outcome of one provider grant: the token plus whatever session material
/// came back with it.
#[derive(Debug, Clone)]
pub struct ProviderGrant {
    pub access_token: String,
    pub expires_in: Option<u64>,
    pub refresh_token: Option<String>,
    pub account: Option<CachedAccount>,
}

/// The identity-provider seam. The broker only ever talks to this trait, so
/// tests can substitute a recording mock.
pub trait TokenProvider: Send + Sync {
    /// Redeem the cached refresh token for `scopes` without user interaction.
    fn acquire_silent<'a>(
        &'a self,
        refresh_token: Option<&'a str>,
        scopes: &'a [String],
    ) -> BoxFuture<'a, Result<ProviderGrant, AuthError>>;

    /// Run the interactive login flow for `scopes`.
    fn acquire_interactive<'a>(
        &'a self,
        scopes: &'a [String],
    ) -> BoxFuture<'a, Result<ProviderGrant, AuthError>>;
}

/// Azure AD v2.0 endpoints behind the oauth2 crate.
pub struct AzureAdProvider {
    client: BasicClient,
}

impl AzureAdProvider {
    pub fn new(settings: &Settings) -> Result<Self> {
        let auth_url = AuthUrl::new(format!(
            "https://login.microsoftonline.com/{}/oauth2/v2.0/authorize",
            settings.tenant_id
        ))?;
        let token_url = TokenUrl::new(format!(
            "https://login.microsoftonline.com/{}/oauth2/v2.0/token",
            settings.tenant_id
        ))?;
        let device_url = DeviceAuthorizationUrl::new(format!(
            "https://login.microsoftonline.com/{}/oauth2/v2.0/devicecode",
            settings.tenant_id
        ))?;
        let redirect_url = RedirectUrl::new(settings.redirect_uri.clone())?;

        let client = BasicClient::new(
            ClientId::new(settings.client_id.clone()),
            None,
            auth_url,
            Some(token_url),
        )
        .set_device_authorization_url(device_url)
        .set_redirect_uri(redirect_url);

        Ok(Self { client })
    }
}

impl TokenProvider for AzureAdProvider {
    fn acquire_silent<'a>(
        &'a self,
        refresh_token: Option<&'a str>,
        scopes: &'a [String],
    ) -> BoxFuture<'a, Result<ProviderGrant, AuthError>> {
        Box::pin(async move {
            let refresh_token = refresh_token.ok_or(AuthError::NoAccount)?;
            let refresh_token = RefreshToken::new(refresh_token.to_string());

            let mut request = self.client.exchange_refresh_token(&refresh_token);
            for scope in scopes {
                request = request.add_scope(Scope::new(scope.clone()));
            }
            request = request.add_scope(Scope::new("offline_access".to_string()));

            let response = request
                .request_async(oauth2::reqwest::async_http_client)
                .await
                .map_err(|e| {
                    AuthError::Provider(
                        anyhow::Error::new(e).context("refresh token exchange failed"),
                    )
                })?;

            Ok(grant_from(
                response.access_token().secret(),
                response.expires_in().map(|d| d.as_secs()),
                response.refresh_token().map(|rt| rt.secret().clone()),
            ))
        })
    }

    fn acquire_interactive<'a>(
        &'a self,
        scopes: &'a [String],
    ) -> BoxFuture<'a, Result<ProviderGrant, AuthError>> {
        Box::pin(async move {
            tracing::info!("Initiating device code flow...");

            let mut request = self.client.exchange_device_code().map_err(|e| {
                AuthError::Provider(anyhow::Error::new(e).context("device code setup failed"))
            })?;
            for scope in scopes {
                request = request.add_scope(Scope::new(scope.clone()));
            }
            request = request.add_scope(Scope::new("offline_access".to_string()));

            let device_auth: StandardDeviceAuthorizationResponse = request
                .request_async(oauth2::reqwest::async_http_client)
                .await
                .map_err(|e| {
                    AuthError::Provider(
                        anyhow::Error::new(e).context("failed to request device code"),
                    )
                })?;

            println!();
            println!("To sign in, visit: {}", device_auth.verification_uri().as_str());
            println!("Enter code:        {}", device_auth.user_code().secret());
            println!();

            tracing::info!("Waiting for authentication...");

            let response = self
                .client
                .exchange_device_access_token(&device_auth)
                .request_async(oauth2::reqwest::async_http_client, tokio::time::sleep, None)
                .await
                .map_err(|e| {
                    AuthError::Provider(
                        anyhow::Error::new(e).context("device code exchange failed"),
                    )
                })?;

            Ok(grant_from(
                response.access_token().secret(),
                response.expires_in().map(|d| d.as_secs()),
                response.refresh_token().map(|rt| rt.secret().clone()),
            ))
        })
    }
}

fn grant_from(
    access_token: &str,
    expires_in: Option<u64>,
    refresh_token: Option<String>,
) -> ProviderGrant {
    ProviderGrant {
        access_token: access_token.to_string(),
        expires_in,
        refresh_token,
        account: account_from_claims(access_token),
    }
}

#[derive(Deserialize)]
struct TokenClaims {
    oid: Option<String>,
    name: Option<String>,
    preferred_username: Option<String>,
    upn: Option<String>,
}

/// Reads the account identity out of the access token's JWT claims.
/// Display-only; the token is never validated here.
fn account_from_claims(access_token: &str) -> Option<CachedAccount> {
    let payload = access_token.split('.').nth(1)?;
    let decoded = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: TokenClaims = serde_json::from_slice(&decoded).ok()?;

    let id = claims.oid?;
    let username = claims.preferred_username.or(claims.upn).or(claims.name);
    Some(CachedAccount { id, username })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_jwt(payload: &str) -> String {
        format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256"}"#),
            URL_SAFE_NO_PAD.encode(payload),
            URL_SAFE_NO_PAD.encode("sig")
        )
    }

    #[test]
    fn test_account_from_claims() {
        let token = fake_jwt(
            r#"{"oid":"11111111-2222-3333-4444-555555555555","preferred_username":"it@contoso.com","name":"IT Admin"}"#,
        );
        let account = account_from_claims(&token).unwrap();
        assert_eq!(account.id, "11111111-2222-3333-4444-555555555555");
        assert_eq!(account.username.as_deref(), Some("it@contoso.com"));
    }

    #[test]
    fn test_account_requires_object_id() {
        let token = fake_jwt(r#"{"name":"IT Admin"}"#);
        assert!(account_from_claims(&token).is_none());
    }

    #[test]
    fn test_opaque_token_yields_no_account() {
        assert!(account_from_claims("not-a-jwt").is_none());
        assert!(account_from_claims("").is_none());
    }
}
