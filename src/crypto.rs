use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use hkdf::Hkdf;
use sha2::Sha256;

const HKDF_SALT: &[u8] = b"portfolio-newsletter-v1";
const HKDF_INFO: &[u8] = b"email-settings-aes256gcm";
const NONCE_LEN: usize = 12;

/// AES-256-GCM sealing for secrets stored in the database (SMTP password).
/// Sealed values are `nonce || ciphertext`.
#[derive(Clone)]
pub struct SecretCipher {
    key: [u8; 32],
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretCipher(..)")
    }
}

impl SecretCipher {
    pub fn new(secret: &str) -> Result<Self, String> {
        if secret.len() < 16 {
            return Err("Encryption key must be at least 16 characters".to_string());
        }
        let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), secret.as_bytes());
        let mut key = [0u8; 32];
        hk.expand(HKDF_INFO, &mut key)
            .map_err(|e| format!("Key derivation failed: {e}"))?;
        Ok(Self { key })
    }

    pub fn seal(&self, plaintext: &str) -> Result<Vec<u8>, String> {
        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|e| format!("Invalid key: {e}"))?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| format!("Encryption failed: {e}"))?;

        let mut sealed = nonce.to_vec();
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    pub fn open(&self, sealed: &[u8]) -> Result<String, String> {
        if sealed.len() < NONCE_LEN {
            return Err("Ciphertext too short".to_string());
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);

        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|e| format!("Invalid key: {e}"))?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| format!("Decryption failed: {e}"))?;

        String::from_utf8(plaintext).map_err(|e| format!("Invalid UTF-8: {e}"))
    }
}
