//! Salted, iterated SHA-256 password hashes.
//!
//! Stored form: `sha256$<iterations>$<salt hex>$<digest hex>`.

use rand::distributions::Alphanumeric;
use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const MIN_PASSWORD_LEN: usize = 6;
const DEFAULT_ITERATIONS: u32 = 20_000;
const SALT_LEN: usize = 16;
const SCHEME: &str = "sha256";
const TEMPORARY_LEN: usize = 10;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("password must be at least {MIN_PASSWORD_LEN} characters long")]
    TooShort,

    #[error("stored password hash is malformed")]
    MalformedHash,
}

pub fn check_strength(plain: &str) -> Result<(), PasswordError> {
    if plain.chars().count() < MIN_PASSWORD_LEN {
        return Err(PasswordError::TooShort);
    }
    Ok(())
}

/// Hash a new password with a fresh random salt.
pub fn hash_password(plain: &str) -> Result<String, PasswordError> {
    check_strength(plain)?;
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    Ok(encode(DEFAULT_ITERATIONS, &salt, &derive(plain, &salt, DEFAULT_ITERATIONS)))
}

/// Random alphanumeric password handed out on a reset.
pub fn temporary_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TEMPORARY_LEN)
        .map(char::from)
        .collect()
}

/// Compare `plain` against a stored hash. Malformed hashes never verify.
pub fn verify_password(plain: &str, stored: &str) -> bool {
    match decode(stored) {
        Ok((iterations, salt, expected)) => {
            constant_time_eq(&derive(plain, &salt, iterations), &expected)
        }
        Err(_) => false,
    }
}

fn derive(plain: &str, salt: &[u8], iterations: u32) -> Vec<u8> {
    let mut digest = Sha256::new()
        .chain_update(salt)
        .chain_update(plain.as_bytes())
        .finalize();
    for _ in 1..iterations {
        digest = Sha256::new().chain_update(digest).chain_update(salt).finalize();
    }
    digest.to_vec()
}

fn encode(iterations: u32, salt: &[u8], digest: &[u8]) -> String {
    format!("{SCHEME}${iterations}${}${}", hex::encode(salt), hex::encode(digest))
}

fn decode(stored: &str) -> Result<(u32, Vec<u8>, Vec<u8>), PasswordError> {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iters), Some(salt), Some(digest), None) =
        (parts.next(), parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(PasswordError::MalformedHash);
    };
    if scheme != SCHEME {
        return Err(PasswordError::MalformedHash);
    }
    let iterations: u32 = iters.parse().map_err(|_| PasswordError::MalformedHash)?;
    if iterations == 0 {
        return Err(PasswordError::MalformedHash);
    }
    let salt = hex::decode(salt).map_err(|_| PasswordError::MalformedHash)?;
    let digest = hex::decode(digest).map_err(|_| PasswordError::MalformedHash)?;
    Ok((iterations, salt, digest))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_verifies() {
        let stored = hash_password("admin123").unwrap();
        assert!(stored.starts_with("sha256$20000$"));
        assert!(verify_password("admin123", &stored));
        assert!(!verify_password("admin124", &stored));
    }

    #[test]
    fn salts_differ_between_hashes() {
        assert_ne!(hash_password("secret1").unwrap(), hash_password("secret1").unwrap());
    }

    #[test]
    fn short_passwords_are_refused() {
        assert_eq!(hash_password("12345"), Err(PasswordError::TooShort));
    }

    #[test]
    fn malformed_hashes_never_verify() {
        for bad in ["", "plain", "md5$1$00$00", "sha256$0$00$00", "sha256$x$00$00", "sha256$1$zz$00"] {
            assert!(!verify_password("whatever", bad), "{bad}");
        }
    }

    #[test]
    fn temporary_passwords_are_long_enough_to_hash() {
        let tmp = temporary_password();
        assert_eq!(tmp.len(), TEMPORARY_LEN);
        assert!(tmp.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(hash_password(&tmp).is_ok());
    }
}
