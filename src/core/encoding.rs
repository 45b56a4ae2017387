//! Canonical byte encoding for hashing and signing.
//!
//! Every field is written in a fixed order: integers as fixed-width
//! big-endian, strings and byte strings with a u32 big-endian length prefix.
//! The output never depends on map iteration order or on the storage codec.
//!
//! Changing anything here changes every block hash and transaction id, so
//! the layout is frozen under [`ENCODING_VERSION`].

/// Frozen layout version, written after the domain tag
pub const ENCODING_VERSION: u8 = 1;

pub const TRANSACTION_DOMAIN: &[u8] = b"datum/tx";
pub const BLOCK_DOMAIN: &[u8] = b"datum/block";

pub struct CanonicalEncoder {
    buf: Vec<u8>,
}

impl CanonicalEncoder {
    pub fn new(domain: &[u8]) -> CanonicalEncoder {
        let mut encoder = CanonicalEncoder {
            buf: Vec::with_capacity(256),
        };
        encoder.put_bytes(domain);
        encoder.put_u8(ENCODING_VERSION);
        encoder
    }

    pub fn put_u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn put_u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend(value.to_be_bytes());
        self
    }

    pub fn put_u64(&mut self, value: u64) -> &mut Self {
        self.buf.extend(value.to_be_bytes());
        self
    }

    pub fn put_i64(&mut self, value: i64) -> &mut Self {
        self.buf.extend(value.to_be_bytes());
        self
    }

    pub fn put_bytes(&mut self, value: &[u8]) -> &mut Self {
        // Fields are bounded far below 4 GiB; a longer one is a programming error.
        let len = u32::try_from(value.len()).unwrap_or(u32::MAX);
        self.put_u32(len);
        self.buf.extend_from_slice(value);
        self
    }

    pub fn put_str(&mut self, value: &str) -> &mut Self {
        self.put_bytes(value.as_bytes())
    }

    /// Append raw bytes without a length prefix (fixed-width digests)
    pub fn put_raw(&mut self, value: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(value);
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}
