use sha2::{Digest, Sha256};

/// One unit of a streamed transfer, order-significant and size-bounded.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Object name this chunk belongs to.
    pub name: String,
    /// Raw chunk bytes (may be empty).
    pub payload: Vec<u8>,
    /// SHA-256 hex digest of `payload` (empty means no verification).
    pub checksum: String,
}

impl Chunk {
    /// Creates a chunk without a checksum.
    pub fn new(name: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            payload,
            checksum: String::new(),
        }
    }

    /// Creates a chunk with its SHA-256 checksum filled in.
    pub fn with_checksum(name: impl Into<String>, payload: Vec<u8>) -> Self {
        let checksum = checksum_bytes(&payload);
        Self {
            name: name.into(),
            payload,
            checksum,
        }
    }

    /// Verifies the checksum if one is present.
    pub fn verify(&self) -> bool {
        self.checksum.is_empty() || checksum_bytes(&self.payload) == self.checksum
    }
}

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_bytes_deterministic() {
        let c1 = checksum_bytes(b"hello world");
        let c2 = checksum_bytes(b"hello world");
        assert_eq!(c1, c2);
        assert_eq!(c1.len(), 64); // SHA-256 = 64 hex chars.
    }

    #[test]
    fn checksum_bytes_different_data() {
        assert_ne!(checksum_bytes(b"hello"), checksum_bytes(b"world"));
    }

    #[test]
    fn chunk_verify_empty_checksum_passes() {
        let chunk = Chunk::new("a.bin", b"data".to_vec());
        assert!(chunk.verify());
    }

    #[test]
    fn chunk_verify_good_checksum() {
        let chunk = Chunk::with_checksum("a.bin", b"data".to_vec());
        assert!(chunk.verify());
    }

    #[test]
    fn chunk_verify_bad_checksum() {
        let mut chunk = Chunk::with_checksum("a.bin", b"data".to_vec());
        chunk.payload = b"tampered".to_vec();
        assert!(!chunk.verify());
    }
}
