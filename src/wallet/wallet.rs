use crate::crypto::{generate_keypair, ExchangeKeyPair, KeyPair, EXCHANGE_KEY_LEN};
use crate::error::Result;
use serde::{Deserialize, Serialize};

const VERSION: u8 = 0x00;
pub const ADDRESS_CHECK_SUM_LEN: usize = 4;

/// A signing key (identity and authorship) plus an exchange key (inbox)
#[derive(Clone, Debug, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Wallet {
    signing: KeyPair,
    exchange: ExchangeKeyPair,
}

impl Wallet {
    pub fn new() -> Result<Wallet> {
        Ok(Wallet {
            signing: generate_keypair()?,
            exchange: ExchangeKeyPair::generate(),
        })
    }

    pub fn get_address(&self) -> String {
        address_from_public_key(self.signing.public_key())
    }

    pub fn get_public_key(&self) -> &[u8] {
        self.signing.public_key()
    }

    pub fn get_keypair(&self) -> &KeyPair {
        &self.signing
    }

    pub fn get_exchange(&self) -> &ExchangeKeyPair {
        &self.exchange
    }

    pub fn get_exchange_public_key(&self) -> [u8; EXCHANGE_KEY_LEN] {
        self.exchange.public_key()
    }

    /// Where other wallets address dead drops for this wallet
    pub fn get_inbox_key(&self) -> String {
        self.exchange.inbox_key()
    }
}

pub fn hash_pub_key(pub_key: &[u8]) -> Vec<u8> {
    let pub_key_sha256 = crate::utils::sha256_digest(pub_key);
    crate::utils::ripemd160_digest(pub_key_sha256.as_slice())
}

fn checksum(payload: &[u8]) -> Vec<u8> {
    let first_sha = crate::utils::sha256_digest(payload);
    let second_sha = crate::utils::sha256_digest(first_sha.as_slice());
    second_sha[0..ADDRESS_CHECK_SUM_LEN].to_vec()
}

/// version + pub_key_hash + checksum, base58 encoded
pub fn address_from_public_key(public_key: &[u8]) -> String {
    convert_address(hash_pub_key(public_key).as_slice())
}

pub fn convert_address(pub_hash_key: &[u8]) -> String {
    let mut payload: Vec<u8> = vec![VERSION];
    payload.extend(pub_hash_key);
    let checksum = checksum(payload.as_slice());
    payload.extend(checksum.as_slice());
    crate::utils::base58_encode(payload.as_slice())
}

pub fn validate_address(address: &str) -> bool {
    let payload = match crate::utils::base58_decode(address) {
        Ok(payload) => payload,
        Err(_) => return false,
    };

    if payload.len() < ADDRESS_CHECK_SUM_LEN + 1 {
        return false;
    }

    let (body, actual_checksum) = payload.split_at(payload.len() - ADDRESS_CHECK_SUM_LEN);
    checksum(body).as_slice() == actual_checksum
}
