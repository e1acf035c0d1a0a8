//! Error types for the crypto layer.

/// Errors from MAC computation and pool construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
    #[error("message length {len} is not a positive multiple of the {block_size}-byte block size")]
    BlockAlignment { len: usize, block_size: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_variants() {
        let e = CryptoError::InvalidKeyLength {
            expected: 16,
            actual: 7,
        };
        assert_eq!(e.to_string(), "invalid key length: expected 16 bytes, got 7");

        let e = CryptoError::BlockAlignment {
            len: 17,
            block_size: 16,
        };
        assert_eq!(
            e.to_string(),
            "message length 17 is not a positive multiple of the 16-byte block size"
        );
    }
}
