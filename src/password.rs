//! Password generation and vault orchestration
//!
//! Policy: 16 characters, at least one uppercase, lowercase, digit, and
//! symbol, remainder drawn uniformly from the union, order shuffled. All
//! randomness comes from the OS CSPRNG.

use crate::api::{client::ApiClient, vault, ApiError};

const PASSWORD_LEN: usize = 16;

const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!@#$%^&*()_+-=[]{}|;:,.<>?";

/// Uniform draw from `0..bound` via rejection sampling (no modulo bias).
fn random_below(bound: usize) -> usize {
    debug_assert!(bound > 0 && bound <= u32::MAX as usize);
    let bound = bound as u32;
    let limit = u32::MAX - u32::MAX % bound;
    loop {
        let mut buf = [0u8; 4];
        getrandom::getrandom(&mut buf).expect("OS CSPRNG failed");
        let v = u32::from_le_bytes(buf);
        if v < limit {
            return (v % bound) as usize;
        }
    }
}

fn pick(set: &[u8]) -> u8 {
    set[random_below(set.len())]
}

/// Generate a password satisfying the policy.
pub fn generate_password() -> String {
    let union: Vec<u8> = [UPPERCASE, LOWERCASE, DIGITS, SYMBOLS].concat();

    // One guaranteed character per class, then fill from the union.
    let mut chars = vec![pick(UPPERCASE), pick(LOWERCASE), pick(DIGITS), pick(SYMBOLS)];
    while chars.len() < PASSWORD_LEN {
        chars.push(pick(&union));
    }

    // Fisher-Yates, so the class-guaranteed characters land anywhere.
    for i in (1..chars.len()).rev() {
        chars.swap(i, random_below(i + 1));
    }

    chars.into_iter().map(char::from).collect()
}

/// Generate a fresh password and store it in the vault, returning the clear
/// text only once the store succeeded.
pub async fn generate_and_store(client: &ApiClient, device_key: &str) -> Result<String, ApiError> {
    tracing::debug!("generating replacement password for {}", device_key);
    let password = generate_password();
    vault::store_secret(client, device_key, &password).await?;
    Ok(password)
}

/// Fetch the stored password for a device.
pub async fn retrieve(client: &ApiClient, device_key: &str) -> Result<String, ApiError> {
    vault::retrieve_secret(client, device_key).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::test_client;
    use mockito::Server;

    #[test]
    fn test_generated_passwords_satisfy_policy() {
        for _ in 0..10_000 {
            let pwd = generate_password();
            assert_eq!(pwd.len(), PASSWORD_LEN);
            assert!(pwd.bytes().all(|b| b.is_ascii_graphic()));
            assert!(pwd.bytes().any(|b| UPPERCASE.contains(&b)), "no uppercase in {pwd}");
            assert!(pwd.bytes().any(|b| LOWERCASE.contains(&b)), "no lowercase in {pwd}");
            assert!(pwd.bytes().any(|b| DIGITS.contains(&b)), "no digit in {pwd}");
            assert!(pwd.bytes().any(|b| SYMBOLS.contains(&b)), "no symbol in {pwd}");
        }
    }

    #[test]
    fn test_generated_passwords_differ() {
        assert_ne!(generate_password(), generate_password());
    }

    #[test]
    fn test_random_below_stays_in_range() {
        for bound in [1usize, 2, 26, 94] {
            for _ in 0..1_000 {
                assert!(random_below(bound) < bound);
            }
        }
    }

    // Store and retrieve go through the same derived secret name: the rotate
    // path only succeeds here because it targets the exact path the get path
    // reads back.
    #[tokio::test]
    async fn test_rotate_and_get_share_secret_name() {
        let mut server = Server::new_async().await;
        let put = server
            .mock("PUT", "/secrets/C02XYZ123-localAdminPassword")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"value": "x"}"#)
            .create_async()
            .await;
        let get = server
            .mock("GET", "/secrets/C02XYZ123-localAdminPassword")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"value": "StoredEarlier1!"}"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let generated = generate_and_store(&client, "C02XYZ123").await.unwrap();
        assert_eq!(generated.len(), PASSWORD_LEN);

        let fetched = retrieve(&client, "C02XYZ123").await.unwrap();
        assert_eq!(fetched, "StoredEarlier1!");

        put.assert_async().await;
        get.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_store_returns_no_password() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("PUT", "/secrets/C02XYZ123-localAdminPassword")
            .match_query(mockito::Matcher::Any)
            .with_status(403)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let err = generate_and_store(&client, "C02XYZ123").await.unwrap_err();
        assert!(matches!(err, ApiError::Http(403)));
    }
}
