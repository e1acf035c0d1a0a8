//! Wire-level data model for the weft border router.
//!
//! This crate holds everything the forwarding path agrees on: fabric
//! addressing types, path-segment fields, the packet buffer that travels
//! reader → pipeline → writer → pool, the per-field hook dispatch chains,
//! and the reliable-datagram framing codec.

pub mod error;
pub mod hooks;
pub mod packet;
pub mod path;
pub mod rudp;
pub mod types;

pub use error::{HookError, PacketError};
pub use hooks::{HookRegistry, HookResult};
pub use packet::RouterPacket;
