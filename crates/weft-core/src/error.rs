//! Error types for the core data model.

use crate::hooks::Field;

/// Errors from fixed-layout parsing and serialization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    #[error("buffer too short: need at least {min} bytes, got {actual}")]
    TooShort { min: usize, actual: usize },
    #[error("destination buffer too small: need {need} bytes, got {actual}")]
    DestTooSmall { need: usize, actual: usize },
}

/// A hook chain aborted resolution of a packet field.
///
/// Carries the field so a dropped packet can be attributed in logs and
/// drop counters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field} hook failed: {reason}")]
pub struct HookError {
    pub field: Field,
    pub reason: String,
}

impl HookError {
    pub fn new(field: Field, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}
