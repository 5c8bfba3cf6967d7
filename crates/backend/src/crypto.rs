//! AES-256-GCM sealing of Google refresh tokens stored in the database.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;

const NONCE_LEN: usize = 12;

/// Encrypts and decrypts refresh tokens. Ciphertexts are
/// `base64(nonce || ciphertext)`.
#[derive(Clone)]
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl TokenCipher {
    /// Build from a base64-encoded 32-byte key.
    pub fn from_base64_key(encoded: &str) -> Result<Self> {
        let key = BASE64
            .decode(encoded.trim())
            .context("Token encryption key is not valid base64")?;
        if key.len() != 32 {
            anyhow::bail!("Token encryption key must be 32 bytes, got {}", key.len());
        }
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| anyhow!("Invalid token encryption key: {}", e))?;
        Ok(Self { cipher })
    }

    #[allow(dead_code)]
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| anyhow!("Failed to encrypt token: {}", e))?;

        let mut sealed = nonce_bytes.to_vec();
        sealed.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(sealed))
    }

    pub fn decrypt(&self, sealed: &str) -> Result<String> {
        let bytes = BASE64
            .decode(sealed.trim())
            .context("Encrypted token is not valid base64")?;
        if bytes.len() <= NONCE_LEN {
            anyhow::bail!("Encrypted token is too short");
        }

        let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| anyhow!("Failed to decrypt token: {}", e))?;

        String::from_utf8(plaintext).context("Decrypted token is not UTF-8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> String {
        BASE64.encode([7u8; 32])
    }

    #[test]
    fn test_encrypt_then_decrypt() {
        let cipher = TokenCipher::from_base64_key(&key()).unwrap();
        let sealed = cipher.encrypt("1//refresh-token").unwrap();
        assert_ne!(sealed, "1//refresh-token");
        assert_eq!(cipher.decrypt(&sealed).unwrap(), "1//refresh-token");
    }

    #[test]
    fn test_nonce_differs_per_encryption() {
        let cipher = TokenCipher::from_base64_key(&key()).unwrap();
        assert_ne!(cipher.encrypt("same").unwrap(), cipher.encrypt("same").unwrap());
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = TokenCipher::from_base64_key(&key()).unwrap().encrypt("secret").unwrap();
        let other = TokenCipher::from_base64_key(&BASE64.encode([9u8; 32])).unwrap();
        assert!(other.decrypt(&sealed).is_err());
    }

    #[test]
    fn test_rejects_short_key_and_garbage() {
        assert!(TokenCipher::from_base64_key(&BASE64.encode([1u8; 16])).is_err());
        let cipher = TokenCipher::from_base64_key(&key()).unwrap();
        assert!(cipher.decrypt("abc").is_err());
        assert!(cipher.decrypt("%%%").is_err());
    }
}
