use sha2::{Digest, Sha256};

/// SHA-256 of the raw image bytes as lowercase hex. Only used to spot
/// images embedded more than once in the same document.
pub(crate) fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
