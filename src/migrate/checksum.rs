//! Content hashing for the migration log.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 of a statement.
///
/// Returns a 64-character lowercase hexadecimal string.
pub fn compute_checksum(sql: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sql.as_bytes());
    format!("{:x}", hasher.finalize())
}
