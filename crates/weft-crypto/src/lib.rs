//! Cryptographic primitives for the weft border router.
//!
//! Currently a single concern: the pooled CBC-MAC used to authenticate
//! path-segment hop fields on every forwarded packet.

pub mod error;
pub mod mac;

pub use error::CryptoError;
pub use mac::{MacPool, BLOCK_SIZE};
