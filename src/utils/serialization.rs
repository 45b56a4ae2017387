// Storage encoding for blocks, pending transactions and wallet files.
// Hashing never goes through here: see core::encoding for the canonical form.
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};

/// Serialize data using bincode 2.0 with standard configuration
pub fn serialize<T: Serialize + bincode::Encode>(data: &T) -> Result<Vec<u8>> {
    let config = bincode::config::standard();
    bincode::encode_to_vec(data, config)
        .map_err(|e| LedgerError::Encoding(format!("Serialization failed: {e}")))
}

/// Deserialize data using bincode 2.0 with standard configuration
pub fn deserialize<T>(bytes: &[u8]) -> Result<T>
where
    T: for<'de> Deserialize<'de> + bincode::Decode<()>,
{
    let config = bincode::config::standard();
    let (data, read) = bincode::decode_from_slice(bytes, config)
        .map_err(|e| LedgerError::Encoding(format!("Deserialization failed: {e}")))?;
    if read != bytes.len() {
        return Err(LedgerError::Encoding(format!(
            "Trailing bytes after record: {} of {} consumed",
            read,
            bytes.len()
        )));
    }
    Ok(data)
}
