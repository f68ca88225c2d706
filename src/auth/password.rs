use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::AppError;

const RESET_TOKEN_BYTES: usize = 32;

/// bcrypt on the blocking pool so hashing never stalls the runtime
pub async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    Ok(tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??)
}

pub async fn verify_password(candidate: String, hash: String) -> Result<bool, AppError> {
    Ok(tokio::task::spawn_blocking(move || bcrypt::verify(candidate, &hash)).await??)
}

/// Spend one bcrypt round at `cost` with no account to check against, so an
/// unknown login answers in the same time as a wrong password
pub async fn burn_verify(candidate: String, cost: u32) -> Result<(), AppError> {
    hash_password(candidate, cost).await.map(|_| ())
}

/// Random hex token sent to the user; only its hash is stored
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn hash_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashes_and_verifies() {
        let hash = hash_password("pass1234".to_string(), 4).await.unwrap();
        assert!(hash.starts_with("$2"));
        assert!(verify_password("pass1234".to_string(), hash.clone()).await.unwrap());
        assert!(!verify_password("pass12345".to_string(), hash).await.unwrap());
    }

    #[tokio::test]
    async fn burn_verify_accepts_any_input() {
        burn_verify(String::new(), 4).await.unwrap();
        burn_verify("x".repeat(100), 4).await.unwrap();
    }

    #[test]
    fn reset_tokens_are_unique_hex() {
        let a = generate_reset_token();
        let b = generate_reset_token();
        assert_eq!(a.len(), RESET_TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn reset_token_hash_is_sha256_hex() {
        assert_eq!(
            hash_reset_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
