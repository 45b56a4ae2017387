//! X25519 key agreement and HKDF key derivation for dead drops.
//!
//! The raw Diffie-Hellman output is never used as a cipher key directly;
//! it is always expanded through HKDF-SHA256 with a context label.

use crate::crypto::cipher::{SecureKey, KEY_LEN};
use crate::error::{LedgerError, Result};
use data_encoding::HEXLOWER;
use rand::rngs::OsRng;
use ring::hkdf::{Salt, HKDF_SHA256};
use serde::{Deserialize, Serialize};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use zeroize::ZeroizeOnDrop;

pub const EXCHANGE_KEY_LEN: usize = 32;

/// Long-term X25519 key pair a wallet uses to receive messages
#[derive(Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode, ZeroizeOnDrop)]
pub struct ExchangeKeyPair {
    secret: [u8; EXCHANGE_KEY_LEN],
    #[zeroize(skip)]
    public_key: [u8; EXCHANGE_KEY_LEN],
}

impl ExchangeKeyPair {
    pub fn generate() -> ExchangeKeyPair {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public_key = PublicKey::from(&secret);
        ExchangeKeyPair {
            secret: secret.to_bytes(),
            public_key: public_key.to_bytes(),
        }
    }

    pub fn public_key(&self) -> [u8; EXCHANGE_KEY_LEN] {
        self.public_key
    }

    /// Hex form of the public key, used as the message recipient
    pub fn inbox_key(&self) -> String {
        HEXLOWER.encode(&self.public_key)
    }

    pub fn derive_shared_secret(&self, peer_public_key: &[u8; EXCHANGE_KEY_LEN]) -> Result<SecureKey> {
        derive_shared_secret(&self.secret, peer_public_key)
    }
}

impl std::fmt::Debug for ExchangeKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeKeyPair")
            .field("public_key", &self.inbox_key())
            .finish_non_exhaustive()
    }
}

/// Single-use sender key; `agree` consumes it
pub struct EphemeralExchange {
    secret: EphemeralSecret,
    public_key: PublicKey,
}

impl EphemeralExchange {
    pub fn new() -> EphemeralExchange {
        let secret = EphemeralSecret::random_from_rng(OsRng);
        let public_key = PublicKey::from(&secret);
        EphemeralExchange { secret, public_key }
    }

    pub fn public_key(&self) -> [u8; EXCHANGE_KEY_LEN] {
        self.public_key.to_bytes()
    }

    pub fn agree(self, peer_public_key: &[u8; EXCHANGE_KEY_LEN]) -> Result<SecureKey> {
        let shared = self
            .secret
            .diffie_hellman(&PublicKey::from(*peer_public_key));
        if !shared.was_contributory() {
            return Err(LedgerError::Crypto(
                "Key agreement produced a low-order shared secret".to_string(),
            ));
        }
        Ok(SecureKey::new(shared.as_bytes().to_vec()))
    }
}

impl Default for EphemeralExchange {
    fn default() -> Self {
        Self::new()
    }
}

pub fn derive_shared_secret(
    private_key: &[u8; EXCHANGE_KEY_LEN],
    peer_public_key: &[u8; EXCHANGE_KEY_LEN],
) -> Result<SecureKey> {
    let secret = StaticSecret::from(*private_key);
    let shared = secret.diffie_hellman(&PublicKey::from(*peer_public_key));
    if !shared.was_contributory() {
        return Err(LedgerError::Crypto(
            "Key agreement produced a low-order shared secret".to_string(),
        ));
    }
    Ok(SecureKey::new(shared.as_bytes().to_vec()))
}

/// HKDF-SHA256 extract-and-expand to a 32-byte cipher key
pub fn derive_symmetric_key(shared_secret: &SecureKey, salt: &[u8], info: &[u8]) -> Result<SecureKey> {
    let prk = Salt::new(HKDF_SHA256, salt).extract(shared_secret.as_bytes());
    let info = [info];
    let okm = prk
        .expand(&info, HKDF_SHA256)
        .map_err(|e| LedgerError::Crypto(format!("HKDF expand failed: {e}")))?;
    let mut key = vec![0u8; KEY_LEN];
    okm.fill(&mut key)
        .map_err(|e| LedgerError::Crypto(format!("HKDF fill failed: {e}")))?;
    Ok(SecureKey::new(key))
}

pub fn parse_exchange_key(bytes: &[u8]) -> Result<[u8; EXCHANGE_KEY_LEN]> {
    bytes.try_into().map_err(|_| {
        LedgerError::Encoding(format!(
            "Exchange public key must be {EXCHANGE_KEY_LEN} bytes, got {}",
            bytes.len()
        ))
    })
}

pub fn parse_inbox_key(inbox_key: &str) -> Result<[u8; EXCHANGE_KEY_LEN]> {
    let bytes = hex::decode(inbox_key)
        .map_err(|e| LedgerError::Encoding(format!("Invalid inbox key: {e}")))?;
    parse_exchange_key(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ephemeral_and_static_sides_agree() {
        let recipient = ExchangeKeyPair::generate();
        let ephemeral = EphemeralExchange::new();
        let ephemeral_public = ephemeral.public_key();

        let sender_secret = ephemeral.agree(&recipient.public_key()).unwrap();
        let recipient_secret = recipient.derive_shared_secret(&ephemeral_public).unwrap();

        assert_eq!(sender_secret.as_bytes(), recipient_secret.as_bytes());
    }

    #[test]
    fn test_low_order_peer_key_is_rejected() {
        let recipient = ExchangeKeyPair::generate();
        let result = recipient.derive_shared_secret(&[0u8; EXCHANGE_KEY_LEN]);
        assert!(matches!(result, Err(LedgerError::Crypto(_))));
    }

    #[test]
    fn test_hkdf_is_deterministic_and_context_bound() {
        let shared = SecureKey::new(vec![9u8; 32]);
        let a = derive_symmetric_key(&shared, b"salt", b"ctx-a").unwrap();
        let b = derive_symmetric_key(&shared, b"salt", b"ctx-a").unwrap();
        let c = derive_symmetric_key(&shared, b"salt", b"ctx-b").unwrap();

        assert_eq!(a.len(), KEY_LEN);
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_ne!(a.as_bytes(), c.as_bytes());
    }

    #[test]
    fn test_inbox_key_parses_back() {
        let pair = ExchangeKeyPair::generate();
        assert_eq!(parse_inbox_key(&pair.inbox_key()).unwrap(), pair.public_key());
        assert!(parse_inbox_key("abcd").is_err());
        assert!(parse_inbox_key("zz").is_err());
    }
}
