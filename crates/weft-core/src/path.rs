//! Path-segment metadata: info fields and hop fields.
//!
//! A path segment carries one info field describing the segment and one hop
//! field per AS crossed. Hop fields are authenticated with a truncated
//! CBC-MAC computed over the enclosing info field and the hop's own
//! immutable bytes; the MAC itself lives in the hop field.

use crate::error::PacketError;
use crate::types::InterfaceId;

/// Wire length of a packed [`InfoField`].
pub const INFO_FIELD_LEN: usize = 8;
/// Wire length of a packed [`HopField`].
pub const HOP_FIELD_LEN: usize = 8;
/// Truncated MAC length carried in a hop field.
pub const HOP_MAC_LEN: usize = 3;
/// Length of the block-aligned MAC input for one hop field.
pub const HOP_MAC_INPUT_LEN: usize = 16;

const INFO_FLAG_UP: u8 = 0x01;

/// Segment-level metadata shared by every hop of a path segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InfoField {
    /// Whether the segment is traversed in the up direction.
    pub up: bool,
    /// Segment creation timestamp, seconds since the epoch.
    pub timestamp: u32,
    /// Identifier of the segment within its origin AS.
    pub segment_id: u16,
    /// Number of hop fields in the segment.
    pub hops: u8,
}

impl InfoField {
    pub fn parse(b: &[u8]) -> Result<Self, PacketError> {
        if b.len() < INFO_FIELD_LEN {
            return Err(PacketError::TooShort {
                min: INFO_FIELD_LEN,
                actual: b.len(),
            });
        }
        Ok(Self {
            up: b[0] & INFO_FLAG_UP != 0,
            timestamp: u32::from_be_bytes([b[1], b[2], b[3], b[4]]),
            segment_id: u16::from_be_bytes([b[5], b[6]]),
            hops: b[7],
        })
    }

    pub fn pack(&self) -> [u8; INFO_FIELD_LEN] {
        let mut b = [0u8; INFO_FIELD_LEN];
        if self.up {
            b[0] |= INFO_FLAG_UP;
        }
        b[1..5].copy_from_slice(&self.timestamp.to_be_bytes());
        b[5..7].copy_from_slice(&self.segment_id.to_be_bytes());
        b[7] = self.hops;
        b
    }
}

/// Per-AS hop metadata, authenticated by a truncated CBC-MAC.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HopField {
    /// Expiry, in coarse time units relative to the info-field timestamp.
    pub exp_time: u8,
    /// Interface the packet enters the AS through.
    pub ingress: InterfaceId,
    /// Interface the packet leaves the AS through.
    pub egress: InterfaceId,
    /// Truncated authentication tag.
    pub mac: [u8; HOP_MAC_LEN],
}

impl HopField {
    pub fn parse(b: &[u8]) -> Result<Self, PacketError> {
        if b.len() < HOP_FIELD_LEN {
            return Err(PacketError::TooShort {
                min: HOP_FIELD_LEN,
                actual: b.len(),
            });
        }
        Ok(Self {
            exp_time: b[0],
            ingress: InterfaceId(u16::from_be_bytes([b[1], b[2]])),
            egress: InterfaceId(u16::from_be_bytes([b[3], b[4]])),
            mac: [b[5], b[6], b[7]],
        })
    }

    pub fn pack(&self) -> [u8; HOP_FIELD_LEN] {
        let mut b = [0u8; HOP_FIELD_LEN];
        b[0] = self.exp_time;
        b[1..3].copy_from_slice(&self.ingress.0.to_be_bytes());
        b[3..5].copy_from_slice(&self.egress.0.to_be_bytes());
        b[5..8].copy_from_slice(&self.mac);
        b
    }
}

/// The block-aligned message a hop field's MAC is computed over: the packed
/// info field followed by the hop's immutable bytes, zero-padded to one
/// cipher block. The MAC bytes themselves are excluded.
pub fn hop_mac_input(info: &InfoField, hop: &HopField) -> [u8; HOP_MAC_INPUT_LEN] {
    let mut msg = [0u8; HOP_MAC_INPUT_LEN];
    msg[..INFO_FIELD_LEN].copy_from_slice(&info.pack());
    msg[8] = hop.exp_time;
    msg[9..11].copy_from_slice(&hop.ingress.0.to_be_bytes());
    msg[11..13].copy_from_slice(&hop.egress.0.to_be_bytes());
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_field_roundtrip() {
        let info = InfoField {
            up: true,
            timestamp: 0x1122_3344,
            segment_id: 0xBEEF,
            hops: 5,
        };
        let packed = info.pack();
        assert_eq!(InfoField::parse(&packed).unwrap(), info);
    }

    #[test]
    fn info_field_too_short() {
        let err = InfoField::parse(&[0u8; 7]).unwrap_err();
        assert_eq!(err, PacketError::TooShort { min: 8, actual: 7 });
    }

    #[test]
    fn hop_field_roundtrip() {
        let hop = HopField {
            exp_time: 63,
            ingress: InterfaceId(2),
            egress: InterfaceId(9),
            mac: [0xAA, 0xBB, 0xCC],
        };
        let packed = hop.pack();
        assert_eq!(HopField::parse(&packed).unwrap(), hop);
    }

    #[test]
    fn hop_field_too_short() {
        let err = HopField::parse(&[]).unwrap_err();
        assert_eq!(err, PacketError::TooShort { min: 8, actual: 0 });
    }

    #[test]
    fn mac_input_excludes_mac_bytes() {
        let info = InfoField {
            up: false,
            timestamp: 1,
            segment_id: 2,
            hops: 3,
        };
        let mut hop = HopField {
            exp_time: 7,
            ingress: InterfaceId(1),
            egress: InterfaceId(2),
            mac: [0; HOP_MAC_LEN],
        };
        let a = hop_mac_input(&info, &hop);
        hop.mac = [0xFF; HOP_MAC_LEN];
        let b = hop_mac_input(&info, &hop);
        assert_eq!(a, b, "MAC input must not depend on the stored MAC");
        assert_eq!(a.len() % 16, 0);
    }
}
