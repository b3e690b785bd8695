//! Key Vault secret storage for per-device local-admin passwords
//!
//! One secret per device, named `<serial>-localAdminPassword`. Store and
//! retrieve derive the name through the same function so the two paths can
//! never target different secrets for the same device.

use chrono::{Duration, Utc};
use serde::Deserialize;

use super::client::ApiClient;
use super::ApiError;

const API_VERSION: &str = "7.4";
const SECRET_SUFFIX: &str = "-localAdminPassword";
const SECRET_TTL_DAYS: i64 = 90;

fn secret_name(device_key: &str) -> String {
    format!("{}{}", device_key, SECRET_SUFFIX)
}

fn secret_path(device_key: &str) -> String {
    format!(
        "/secrets/{}?api-version={}",
        urlencoding::encode(&secret_name(device_key)),
        API_VERSION
    )
}

fn secret_payload(value: &str) -> serde_json::Value {
    let expires = (Utc::now() + Duration::days(SECRET_TTL_DAYS)).timestamp();
    serde_json::json!({
        "value": value,
        "attributes": {
            "enabled": true,
            "exp": expires,
        }
    })
}

/// Store a device's password. The expiry attribute is set 90 days out.
pub async fn store_secret(
    client: &ApiClient,
    device_key: &str,
    value: &str,
) -> Result<(), ApiError> {
    let body = serde_json::to_vec(&secret_payload(value)).map_err(ApiError::Encoding)?;
    client.vault_put(&secret_path(device_key), body).await?;
    tracing::info!("stored secret for {}", device_key);
    Ok(())
}

#[derive(Debug, Deserialize)]
struct SecretBundle {
    value: Option<String>,
}

/// Retrieve a device's password as clear text. Held in memory only for
/// display; never persisted locally.
pub async fn retrieve_secret(client: &ApiClient, device_key: &str) -> Result<String, ApiError> {
    let resp = client.vault_get(&secret_path(device_key)).await?;
    let bundle: SecretBundle = resp.json().await.map_err(ApiError::Decode)?;
    bundle.value.ok_or(ApiError::InvalidResponse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::test_client;
    use mockito::Server;

    #[test]
    fn test_secret_name_derivation() {
        assert_eq!(secret_name("C02XYZ123"), "C02XYZ123-localAdminPassword");
    }

    #[test]
    fn test_secret_path_percent_encodes_key() {
        let path = secret_path("SN 01/ab");
        assert_eq!(
            path,
            "/secrets/SN%2001%2Fab-localAdminPassword?api-version=7.4"
        );
    }

    #[test]
    fn test_secret_payload_attributes() {
        let payload = secret_payload("hunter2!");
        assert_eq!(payload["value"], "hunter2!");
        assert_eq!(payload["attributes"]["enabled"], true);

        let exp = payload["attributes"]["exp"].as_i64().unwrap();
        let lower = (Utc::now() + Duration::days(89)).timestamp();
        let upper = (Utc::now() + Duration::days(91)).timestamp();
        assert!(exp > lower && exp < upper);
    }

    #[tokio::test]
    async fn test_retrieve_secret_reads_value() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/secrets/C02XYZ123-localAdminPassword")
            .match_query(mockito::Matcher::UrlEncoded(
                "api-version".into(),
                "7.4".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"value": "Abc123!", "attributes": {"enabled": true}}"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let secret = retrieve_secret(&client, "C02XYZ123").await.unwrap();
        assert_eq!(secret, "Abc123!");
    }

    #[tokio::test]
    async fn test_retrieve_secret_not_found() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/secrets/C02XYZ123-localAdminPassword")
            .match_query(mockito::Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error": {"code": "SecretNotFound"}}"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let err = retrieve_secret(&client, "C02XYZ123").await.unwrap_err();
        assert!(matches!(err, ApiError::Http(404)));
    }

    #[tokio::test]
    async fn test_retrieve_secret_without_value_is_invalid() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/secrets/C02XYZ123-localAdminPassword")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"attributes": {"enabled": true}}"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let err = retrieve_secret(&client, "C02XYZ123").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse));
    }

    #[tokio::test]
    async fn test_store_secret_puts_payload() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/secrets/C02XYZ123-localAdminPassword")
            .match_query(mockito::Matcher::UrlEncoded(
                "api-version".into(),
                "7.4".into(),
            ))
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"value": "Tr0ub4dor&3!", "attributes": {"enabled": true}}"#.to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"value": "Tr0ub4dor&3!"}"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        store_secret(&client, "C02XYZ123", "Tr0ub4dor&3!")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_store_secret_conflict_maps_to_http_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("PUT", "/secrets/C02XYZ123-localAdminPassword")
            .match_query(mockito::Matcher::Any)
            .with_status(409)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let err = store_secret(&client, "C02XYZ123", "pw").await.unwrap_err();
        assert!(matches!(err, ApiError::Http(409)));
    }
}
