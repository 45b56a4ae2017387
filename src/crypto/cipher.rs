use crate::error::{LedgerError, Result};
use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Key, Nonce,
};
use zeroize::ZeroizeOnDrop;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// Secure key wrapper that automatically zeros memory on drop
#[derive(Clone, ZeroizeOnDrop)]
pub struct SecureKey {
    key: Vec<u8>,
}

impl SecureKey {
    pub fn new(key: Vec<u8>) -> Self {
        Self { key }
    }

    /// Get key bytes (use carefully)
    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    pub fn len(&self) -> usize {
        self.key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }
}

impl std::fmt::Debug for SecureKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureKey")
            .field("length", &self.key.len())
            .finish()
    }
}

/// AES-256-GCM with associated data
pub struct Aes256GcmCipher {
    cipher: Aes256Gcm,
}

impl Aes256GcmCipher {
    pub fn new(key: &SecureKey) -> Result<Self> {
        if key.len() != KEY_LEN {
            return Err(LedgerError::Crypto(format!(
                "AES-256-GCM requires a {KEY_LEN}-byte key"
            )));
        }

        let aes_key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
        Ok(Self {
            cipher: Aes256Gcm::new(aes_key),
        })
    }

    pub fn encrypt(&self, nonce_bytes: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        check_nonce(nonce_bytes)?;
        let nonce = Nonce::from_slice(nonce_bytes);
        self.cipher
            .encrypt(
                nonce,
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|e| LedgerError::Crypto(format!("AES-256-GCM encryption failed: {e}")))
    }

    /// Fails with `Decryption` when the tag does not authenticate
    pub fn decrypt(&self, nonce_bytes: &[u8], ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        check_nonce(nonce_bytes)?;
        let nonce = Nonce::from_slice(nonce_bytes);
        self.cipher
            .decrypt(
                nonce,
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .map_err(|_| LedgerError::Decryption("authentication tag mismatch".to_string()))
    }
}

fn check_nonce(nonce_bytes: &[u8]) -> Result<()> {
    if nonce_bytes.len() != NONCE_LEN {
        return Err(LedgerError::Encoding(format!(
            "AES-256-GCM requires a {NONCE_LEN}-byte nonce, got {}",
            nonce_bytes.len()
        )));
    }
    Ok(())
}

pub fn aead_encrypt(key: &SecureKey, nonce: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    Aes256GcmCipher::new(key)?.encrypt(nonce, plaintext, aad)
}

pub fn aead_decrypt(key: &SecureKey, nonce: &[u8], ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    Aes256GcmCipher::new(key)?.decrypt(nonce, ciphertext, aad)
}

/// Generate a cryptographically secure random nonce
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    use rand::RngCore;
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

pub fn generate_random_bytes(length: usize) -> Vec<u8> {
    use rand::RngCore;
    let mut bytes = vec![0u8; length];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}
