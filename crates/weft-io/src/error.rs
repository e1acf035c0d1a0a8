//! Error types for the I/O layer.

/// Errors from opening overlay sockets.
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The kernel refused the enlarged send/receive buffers. Fatal during
    /// setup: running with default buffer sizes drops bursts silently.
    #[error("unable to size kernel socket buffers: {0}")]
    BufferSize(std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_variants() {
        let e = OverlayError::Io(std::io::Error::new(
            std::io::ErrorKind::AddrInUse,
            "in use",
        ));
        assert!(e.to_string().contains("I/O error"));

        let e = OverlayError::BufferSize(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert!(e.to_string().contains("kernel socket buffers"));
    }
}
