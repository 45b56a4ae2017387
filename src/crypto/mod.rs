//! Cryptographic primitives
//!
//! ECDSA P-256 signing (ring), X25519 key agreement (x25519-dalek),
//! HKDF-SHA256 (ring) and AES-256-GCM (aes-gcm) behind one stable surface.
//! Apart from key and nonce generation every function is deterministic.

pub mod cipher;
pub mod exchange;
pub mod keys;

pub use cipher::{
    aead_decrypt, aead_encrypt, generate_nonce, generate_random_bytes, Aes256GcmCipher, SecureKey,
    KEY_LEN, NONCE_LEN,
};
pub use exchange::{
    derive_shared_secret, derive_symmetric_key, parse_exchange_key, parse_inbox_key,
    EphemeralExchange, ExchangeKeyPair, EXCHANGE_KEY_LEN,
};
pub use keys::{generate_keypair, sign, verify, KeyPair, PUBLIC_KEY_LEN, SIGNATURE_LEN};
