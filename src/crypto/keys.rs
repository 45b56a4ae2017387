use crate::error::{LedgerError, Result};
use once_cell::sync::Lazy;
use ring::rand::SystemRandom;
use ring::signature::{
    EcdsaKeyPair, KeyPair as _, UnparsedPublicKey, ECDSA_P256_SHA256_FIXED,
    ECDSA_P256_SHA256_FIXED_SIGNING,
};
use serde::{Deserialize, Serialize};
use zeroize::ZeroizeOnDrop;

// SystemRandom is Sync, so one instance serves every thread.
static RNG: Lazy<SystemRandom> = Lazy::new(SystemRandom::new);

/// Uncompressed SEC1 point: 0x04 || X || Y
pub const PUBLIC_KEY_LEN: usize = 65;
/// Fixed-width r || s
pub const SIGNATURE_LEN: usize = 64;

/// ECDSA P-256 signing key pair held by a wallet
#[derive(Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode, ZeroizeOnDrop)]
pub struct KeyPair {
    pkcs8: Vec<u8>,
    #[zeroize(skip)]
    public_key: Vec<u8>,
}

impl KeyPair {
    pub fn from_pkcs8(pkcs8: &[u8]) -> Result<KeyPair> {
        let key_pair = parse_pkcs8(pkcs8)?;
        Ok(KeyPair {
            pkcs8: pkcs8.to_vec(),
            public_key: key_pair.public_key().as_ref().to_vec(),
        })
    }

    pub fn public_key(&self) -> &[u8] {
        self.public_key.as_slice()
    }

    pub fn pkcs8(&self) -> &[u8] {
        self.pkcs8.as_slice()
    }

    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        sign(&self.pkcs8, message)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &data_encoding::HEXLOWER.encode(&self.public_key))
            .finish_non_exhaustive()
    }
}

fn parse_pkcs8(pkcs8: &[u8]) -> Result<EcdsaKeyPair> {
    EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8, &*RNG)
        .map_err(|e| LedgerError::Encoding(format!("Invalid PKCS#8 key: {e}")))
}

pub fn generate_keypair() -> Result<KeyPair> {
    let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &*RNG)
        .map_err(|e| LedgerError::Crypto(format!("Failed to generate ECDSA key pair: {e}")))?;
    KeyPair::from_pkcs8(pkcs8.as_ref())
}

pub fn sign(pkcs8: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    let key_pair = parse_pkcs8(pkcs8)?;
    let signature = key_pair
        .sign(&*RNG, message)
        .map_err(|e| LedgerError::Crypto(format!("Failed to sign message: {e}")))?;
    Ok(signature.as_ref().to_vec())
}

/// `Ok(false)` for a well-formed signature that does not verify,
/// `Err(Encoding)` when the key or signature cannot be parsed at all.
pub fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<bool> {
    if public_key.len() != PUBLIC_KEY_LEN || public_key[0] != 0x04 {
        return Err(LedgerError::Encoding(format!(
            "Malformed public key ({} bytes)",
            public_key.len()
        )));
    }
    if signature.len() != SIGNATURE_LEN {
        return Err(LedgerError::Encoding(format!(
            "Malformed signature ({} bytes)",
            signature.len()
        )));
    }
    let peer_public_key = UnparsedPublicKey::new(&ECDSA_P256_SHA256_FIXED, public_key);
    Ok(peer_public_key.verify(message, signature).is_ok())
}
