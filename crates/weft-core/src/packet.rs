//! The packet buffer that travels reader → pipeline → writer → pool.
//!
//! A [`RouterPacket`] is exclusively owned by one stage at a time; the type
//! moves between stages, so no two workers ever mutate the same buffer.
//! The backing allocation is reused across lifecycles via the buffer pool:
//! [`RouterPacket::reset`] clears length, metadata, and the per-packet
//! hook state without reallocating.

use std::net::SocketAddr;
use std::time::Instant;

use crate::path::{HopField, InfoField};
use crate::types::{Dir, HostAddr, InterfaceId, IsdAs, L4Header};

/// Backing buffer size for one packet, sized for jumbo-frame overlays.
pub const PKT_BUF_SIZE: usize = 9216;

/// Overlay-level metadata stamped by the socket reader.
#[derive(Debug, Clone, Default)]
pub struct Ingress {
    /// Overlay source address of the datagram.
    pub src: Option<SocketAddr>,
    /// Local bind address of the receiving socket.
    pub dst: Option<SocketAddr>,
    /// Interfaces the receiving socket could represent.
    pub if_ids: Vec<InterfaceId>,
}

impl Ingress {
    fn clear(&mut self) {
        self.src = None;
        self.dst = None;
        self.if_ids.clear();
    }
}

/// Where the pipeline should enqueue a packet after processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Egress {
    /// Deliver via the output queue of a bound local address.
    Local { index: usize, dst: SocketAddr },
    /// Forward via the output queue of a connected external link.
    External { ifid: InterfaceId },
}

/// Per-packet transient state accumulated by the hook chains.
///
/// The chains themselves are registered once at startup and never change;
/// everything they resolve per packet is cached here and cleared by
/// [`RouterPacket::reset`] before the buffer re-enters the pool.
#[derive(Debug, Default)]
pub struct ResolvedFields {
    pub src_ia: Option<IsdAs>,
    pub src_host: Option<HostAddr>,
    pub dst_ia: Option<IsdAs>,
    pub dst_host: Option<HostAddr>,
    pub info_field: Option<InfoField>,
    pub hop_field: Option<HopField>,
    pub up_flag: Option<bool>,
    pub if_curr: Option<InterfaceId>,
    pub if_next: Option<InterfaceId>,
    pub l4: Option<L4Header>,
    pub payload: Option<Vec<u8>>,
    pub egress: Option<Egress>,
}

impl ResolvedFields {
    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// One datagram in flight through the router.
#[derive(Debug)]
pub struct RouterPacket {
    buf: Vec<u8>,
    len: usize,
    /// Which side of the router the packet arrived on.
    pub dir_from: Dir,
    pub ingress: Ingress,
    /// When the datagram was received.
    pub time_in: Option<Instant>,
    pub resolved: ResolvedFields,
}

impl RouterPacket {
    pub fn with_capacity(size: usize) -> Self {
        Self {
            buf: vec![0u8; size],
            len: 0,
            dir_from: Dir::default(),
            ingress: Ingress::default(),
            time_in: None,
            resolved: ResolvedFields::default(),
        }
    }

    /// The whole backing buffer, for the socket receive path.
    pub fn recv_buf(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Trim to the exact number of bytes received. Must happen before any
    /// processing looks at [`raw`](Self::raw).
    pub fn trim(&mut self, len: usize) {
        self.len = len.min(self.buf.len());
    }

    /// The received bytes.
    pub fn raw(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn raw_mut(&mut self) -> &mut [u8] {
        &mut self.buf[..self.len]
    }

    /// Copy `bytes` into the buffer and trim to their length.
    pub fn load(&mut self, bytes: &[u8]) {
        let n = bytes.len().min(self.buf.len());
        self.buf[..n].copy_from_slice(&bytes[..n]);
        self.len = n;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Clear payload length, ingress metadata, and resolved-field state so
    /// the buffer can re-enter the pool. The backing allocation is kept.
    pub fn reset(&mut self) {
        self.len = 0;
        self.dir_from = Dir::default();
        self.ingress.clear();
        self.time_in = None;
        self.resolved.clear();
    }
}

impl Default for RouterPacket {
    fn default() -> Self {
        Self::with_capacity(PKT_BUF_SIZE)
    }
}
