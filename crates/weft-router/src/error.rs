//! Error types for router setup and startup.
//!
//! Anything that goes wrong before the router serves traffic aborts the
//! whole startup sequence; there is no partial operation.

use weft_io::OverlayError;

/// Errors raised while bringing the router up.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("overlay setup failed: {0}")]
    Overlay(#[from] OverlayError),
    #[error("invalid MAC key: {0}")]
    MacKey(String),
    #[error("unknown network backend: {0}")]
    UnknownBackend(String),
    #[error("backend {backend} failed: {reason}")]
    Backend {
        backend: &'static str,
        reason: String,
    },
    #[error("unable to drop privileges: {0}")]
    Privileges(String),
    #[error("router already started")]
    AlreadyStarted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_variants() {
        assert_eq!(
            SetupError::Config("bad toml".into()).to_string(),
            "configuration error: bad toml"
        );
        assert_eq!(
            SetupError::UnknownBackend("dpdk".into()).to_string(),
            "unknown network backend: dpdk"
        );
        assert_eq!(
            SetupError::Backend {
                backend: "posix",
                reason: "listen failed".into()
            }
            .to_string(),
            "backend posix failed: listen failed"
        );
    }
}
