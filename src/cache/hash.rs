//! Content hashing for cache keys.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// SHA256 of a value's JSON form, as 64 lowercase hex characters.
pub fn compute_hash<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}
