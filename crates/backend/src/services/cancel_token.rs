//! Single-use cancel tokens.
//!
//! The plaintext token is 32 random bytes, URL-safe base64, and is only ever
//! handed to the requester inside the cancel URL. Bookings store
//! `sha256$<salt>$<hex digest>` of it.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

const TOKEN_BYTES: usize = 32;
const SALT_BYTES: usize = 16;
const SCHEME: &str = "sha256";

/// Generate a new plaintext cancel token (43 characters).
pub fn generate() -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: Vec<u8> = (0..TOKEN_BYTES).map(|_| rng.gen()).collect();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Salted hash of `token` for storage.
pub fn hash(token: &str) -> String {
    let mut rng = rand::thread_rng();
    let salt_bytes: Vec<u8> = (0..SALT_BYTES).map(|_| rng.gen()).collect();
    let salt = URL_SAFE_NO_PAD.encode(salt_bytes);
    format!("{}${}${}", SCHEME, salt, digest(&salt, token))
}

/// Check `token` against a stored hash. Malformed hashes never verify.
pub fn verify(token: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    let (Some(scheme), Some(salt), Some(expected)) = (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if scheme != SCHEME || salt.is_empty() {
        return false;
    }

    constant_time_eq(digest(salt, token).as_bytes(), expected.as_bytes())
}

fn digest(salt: &str, token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}
