//! Reliable-datagram framing for control traffic between neighbouring
//! routers.
//!
//! Header format:
//!
//! ```text
//!  0B       1        2        3        4        5        6        7
//!  +--------+--------+--------+--------+--------+--------+--------+--------+
//!  | Flags  |                      Correlation id                          |
//!  +--------+--------+--------+--------+--------+--------+--------+--------+
//! ```
//!
//! The flags byte allocates bit 0 as NEED_ACK and bit 1 as ACK; an ACK
//! re-uses the correlation id of the packet it acknowledges. The id is an
//! opaque byte string, never interpreted numerically. The payload wrapped
//! by [`Frame`] is a signed control-message envelope; this module does
//! framing only and never looks inside it. Acknowledgment and
//! retransmission semantics live in the layer above.

use std::fmt;

use crate::error::PacketError;

/// Wire length of the framing header.
pub const HDR_LEN: usize = 8;
/// Length of the opaque correlation id.
pub const ID_LEN: usize = 7;

/// The packet requires an acknowledgment.
pub const FLAG_NEED_ACK: u8 = 0x01;
/// The packet acknowledges a NEED_ACK packet.
pub const FLAG_ACK: u8 = 0x02;

/// The fixed 8-byte framing header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    flags: u8,
    id: [u8; ID_LEN],
}

impl Header {
    pub fn new(flags: u8, id: [u8; ID_LEN]) -> Self {
        Self { flags, id }
    }

    /// Split a header off the front of `b`.
    pub fn parse(b: &[u8]) -> Result<Self, PacketError> {
        if b.len() < HDR_LEN {
            return Err(PacketError::TooShort {
                min: HDR_LEN,
                actual: b.len(),
            });
        }
        let mut id = [0u8; ID_LEN];
        id.copy_from_slice(&b[1..HDR_LEN]);
        Ok(Self { flags: b[0], id })
    }

    /// Write the header into the front of `b`.
    pub fn write(&self, b: &mut [u8]) -> Result<(), PacketError> {
        if b.len() < HDR_LEN {
            return Err(PacketError::DestTooSmall {
                need: HDR_LEN,
                actual: b.len(),
            });
        }
        b[0] = self.flags;
        b[1..HDR_LEN].copy_from_slice(&self.id);
        Ok(())
    }

    pub fn pack(&self) -> [u8; HDR_LEN] {
        let mut b = [0u8; HDR_LEN];
        b[0] = self.flags;
        b[1..].copy_from_slice(&self.id);
        b
    }

    pub fn flags(&self) -> u8 {
        self.flags
    }

    pub fn id(&self) -> &[u8; ID_LEN] {
        &self.id
    }

    pub fn is_need_ack(&self) -> bool {
        self.flags & FLAG_NEED_ACK != 0
    }

    pub fn is_ack(&self) -> bool {
        self.flags & FLAG_ACK != 0
    }

    /// Human-readable flag rendering. Only the two defined bits have names;
    /// any other byte value is labelled UNKNOWN but still round-trips
    /// bit-for-bit through parse/write.
    pub fn flags_str(&self) -> String {
        match self.flags {
            0x00 => "None (0x00)".to_string(),
            0x01 => "NEED_ACK (0x01)".to_string(),
            0x02 => "ACK (0x02)".to_string(),
            f => format!("UNKNOWN ({f:02x})"),
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id: ")?;
        for b in &self.id {
            write!(f, "{b:02x}")?;
        }
        write!(f, " Flags: {}", self.flags_str())
    }
}

/// A framed reliable datagram: header plus an opaque signed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: Header,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(header: Header, payload: Vec<u8>) -> Self {
        Self { header, payload }
    }

    /// Split raw bytes into header and payload.
    pub fn parse(b: &[u8]) -> Result<Self, PacketError> {
        let header = Header::parse(b)?;
        Ok(Self {
            header,
            payload: b[HDR_LEN..].to_vec(),
        })
    }

    /// Total serialized length. Never less than [`HDR_LEN`].
    pub fn len(&self) -> usize {
        HDR_LEN + self.payload.len()
    }

    /// Write the frame contiguously into `b`, returning the number of bytes
    /// written.
    pub fn write_to(&self, b: &mut [u8]) -> Result<usize, PacketError> {
        let need = self.len();
        if b.len() < need {
            return Err(PacketError::DestTooSmall {
                need,
                actual: b.len(),
            });
        }
        self.header.write(b)?;
        b[HDR_LEN..need].copy_from_slice(&self.payload);
        Ok(need)
    }

    pub fn pack(&self) -> Vec<u8> {
        let mut b = vec![0u8; self.len()];
        // Destination is sized exactly; write cannot fail.
        let _ = self.write_to(&mut b);
        b
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hdr: {} Pld: {}B", self.header, self.payload.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: [u8; ID_LEN] = [0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD];

    #[test]
    fn header_roundtrip_all_flag_bytes() {
        for flags in 0..=255u8 {
            let hdr = Header::new(flags, ID);
            let packed = hdr.pack();
            let parsed = Header::parse(&packed).unwrap();
            assert_eq!(parsed, hdr, "flag byte 0x{flags:02x} must round-trip");
        }
    }

    #[test]
    fn parse_needs_eight_bytes() {
        for n in 0..HDR_LEN {
            let err = Header::parse(&vec![0u8; n]).unwrap_err();
            assert_eq!(err, PacketError::TooShort { min: 8, actual: n });
        }
        assert!(Header::parse(&[0u8; 8]).is_ok());
    }

    #[test]
    fn write_needs_eight_bytes() {
        let hdr = Header::new(FLAG_ACK, ID);
        let mut short = [0u8; 7];
        assert_eq!(
            hdr.write(&mut short).unwrap_err(),
            PacketError::DestTooSmall { need: 8, actual: 7 }
        );
    }

    #[test]
    fn flag_accessors() {
        assert!(Header::new(0x01, ID).is_need_ack());
        assert!(!Header::new(0x01, ID).is_ack());
        assert!(Header::new(0x02, ID).is_ack());
        assert!(!Header::new(0x02, ID).is_need_ack());
        // Both bits set: both accessors answer.
        let both = Header::new(0x03, ID);
        assert!(both.is_need_ack() && both.is_ack());
    }

    #[test]
    fn flags_rendering() {
        assert_eq!(Header::new(0x00, ID).flags_str(), "None (0x00)");
        assert_eq!(Header::new(0x01, ID).flags_str(), "NEED_ACK (0x01)");
        assert_eq!(Header::new(0x02, ID).flags_str(), "ACK (0x02)");
        assert_eq!(Header::new(0x03, ID).flags_str(), "UNKNOWN (03)");
        assert_eq!(Header::new(0xFF, ID).flags_str(), "UNKNOWN (ff)");
        assert_eq!(Header::new(0x80, ID).flags_str(), "UNKNOWN (80)");
    }

    #[test]
    fn header_display() {
        let hdr = Header::new(0x01, ID);
        assert_eq!(
            hdr.to_string(),
            "Id: 0123456789abcd Flags: NEED_ACK (0x01)"
        );
    }

    #[test]
    fn frame_roundtrip() {
        let frame = Frame::new(Header::new(FLAG_NEED_ACK, ID), b"signed envelope".to_vec());
        let packed = frame.pack();
        assert_eq!(packed.len(), 8 + 15);
        assert_eq!(Frame::parse(&packed).unwrap(), frame);
    }

    #[test]
    fn frame_with_empty_payload() {
        let frame = Frame::new(Header::new(0x00, ID), Vec::new());
        let packed = frame.pack();
        assert_eq!(packed.len(), HDR_LEN);
        assert_eq!(Frame::parse(&packed).unwrap(), frame);
    }

    #[test]
    fn write_to_fails_iff_destination_short() {
        let frame = Frame::new(Header::new(0x00, ID), vec![0xAA; 10]);
        let need = frame.len();

        let mut exact = vec![0u8; need];
        assert_eq!(frame.write_to(&mut exact).unwrap(), need);

        let mut short = vec![0u8; need - 1];
        assert_eq!(
            frame.write_to(&mut short).unwrap_err(),
            PacketError::DestTooSmall {
                need,
                actual: need - 1
            }
        );

        let mut long = vec![0u8; need + 4];
        assert_eq!(frame.write_to(&mut long).unwrap(), need);
        assert_eq!(&long[..need], &exact[..]);
    }

    #[test]
    fn undefined_flags_pass_through_framing() {
        for flags in [0x04u8, 0x42, 0x80, 0xFF] {
            let frame = Frame::new(Header::new(flags, ID), vec![1, 2, 3]);
            let parsed = Frame::parse(&frame.pack()).unwrap();
            assert_eq!(parsed.header.flags(), flags);
        }
    }

    #[test]
    fn frame_display() {
        let frame = Frame::new(Header::new(0x02, ID), vec![0u8; 42]);
        assert_eq!(
            frame.to_string(),
            "Hdr: Id: 0123456789abcd Flags: ACK (0x02) Pld: 42B"
        );
    }
}
