//! Passphrase protection for the wallet file.
//!
//! Chain data is public; only key material is sealed. The passphrase is
//! stretched with Argon2id and the wallet map is sealed with AES-256-GCM.

use crate::crypto::{aead_decrypt, aead_encrypt, generate_nonce, generate_random_bytes, SecureKey};
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};

pub const MIN_PASSWORD_LEN: usize = 8;
const SALT_LEN: usize = 32;
const WALLET_AAD: &[u8] = b"datum/wallets/v1";

#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct SealedWallets {
    pub salt: Vec<u8>,
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(LedgerError::Wallet(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    Ok(())
}

fn derive_key_from_password(password: &str, salt: &[u8]) -> Result<SecureKey> {
    use argon2::{Algorithm, Argon2, Params, Version};

    let params = Params::new(65536, 3, 1, Some(32))
        .map_err(|e| LedgerError::Crypto(format!("Invalid Argon2 parameters: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = vec![0u8; 32];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|e| LedgerError::Crypto(format!("Key derivation failed: {e}")))?;

    Ok(SecureKey::new(key))
}

pub fn seal(password: &str, plaintext: &[u8]) -> Result<SealedWallets> {
    validate_password(password)?;
    let salt = generate_random_bytes(SALT_LEN);
    let key = derive_key_from_password(password, &salt)?;
    let nonce = generate_nonce();
    let ciphertext = aead_encrypt(&key, &nonce, plaintext, WALLET_AAD)?;
    Ok(SealedWallets {
        salt,
        nonce: nonce.to_vec(),
        ciphertext,
    })
}

pub fn open(password: &str, sealed: &SealedWallets) -> Result<Vec<u8>> {
    let key = derive_key_from_password(password, &sealed.salt)?;
    aead_decrypt(&key, &sealed.nonce, &sealed.ciphertext, WALLET_AAD)
        .map_err(|_| LedgerError::Wallet("Wrong password or corrupted wallet file".to_string()))
}
