use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{FrameError, Result};

/// First byte of every frame.
pub const START_OF_PACKET: u8 = 0x55;

/// Escape marker used by the escaped profile.
pub const ESCAPE: u8 = 0x1B;

/// Last byte of every frame.
pub const END_OF_PACKET: u8 = 0x33;

/// Escaped response header: start (1) + client id (1) + sequence (2) + code (1) + length (2).
pub const ESCAPED_RESPONSE_HEADER_SIZE: usize = 7;

/// Unescaped response header: start, message, client id, sequence (2), code, length (2).
pub const UNESCAPED_RESPONSE_HEADER_SIZE: usize = 8;

pub const END_OF_PACKET_SIZE: usize = 1;

/// Default maximum payload length in wire bytes.
pub const DEFAULT_MAX_PAYLOAD: usize = 512;
/// Smallest maximum payload a device may configure.
pub const MIN_MAX_PAYLOAD: usize = 64;
/// Largest maximum payload a device may configure.
pub const MAX_MAX_PAYLOAD: usize = 4096;

/// Default and largest maximum password length in bytes.
pub const DEFAULT_MAX_PASSWORD: usize = 32;
pub const MAX_MAX_PASSWORD: usize = 32;

/// Well-known UDP port.
pub const DEFAULT_PORT: u16 = 2570;

/// Framing profile.
///
/// Both profiles share the same message codes, reserved client ids and
/// semantics; they differ only in header layout and escaping.
///
/// Escaped request layout:
/// ```text
/// ┌───────┬────┬───────┬────────┬───────────┬─────┬────────┬───────────┬─────┐
/// │ Start │ Id │ Seq   │ PwdLen │ Password  │ Msg │ Len    │ Payload   │ End │
/// │ 0x55  │    │ (2B)* │ (1B)*  │ (escaped) │     │ (2B)*  │ (escaped) │0x33 │
/// └───────┴────┴───────┴────────┴───────────┴─────┴────────┴───────────┴─────┘
/// * bit-packed, see the pack/unpack helpers
/// ```
///
/// Unescaped request layout (plain little endian):
/// ```text
/// Start, Msg, Id, SeqLo, SeqHi, PwdLen, Password, LenLo, LenHi, Payload, End
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Byte-stuffed fields; any byte value is safe inside password and payload.
    #[default]
    Escaped,
    /// Raw fields with explicit lengths. Only safe where payload bytes cannot
    /// be mistaken for markers by the transport.
    Unescaped,
}

impl Profile {
    pub fn name(self) -> &'static str {
        match self {
            Self::Escaped => "escaped",
            Self::Unescaped => "unescaped",
        }
    }

    /// Sequence number every system message must carry.
    pub fn max_sequence(self) -> u16 {
        match self {
            // 0x3FFF shifted left by two bits
            Self::Escaped => 0xFFFC,
            Self::Unescaped => 0xFFFF,
        }
    }

    /// Distance between consecutive sequence numbers a controller should use.
    ///
    /// In the escaped profile the low byte of the packed sequence must never
    /// equal a marker; stepping by four keeps it even.
    pub fn sequence_step(self) -> u16 {
        match self {
            Self::Escaped => 4,
            Self::Unescaped => 1,
        }
    }

    pub fn next_sequence(self, sequence: u16) -> u16 {
        sequence.wrapping_add(self.sequence_step())
    }

    pub fn response_header_size(self) -> usize {
        match self {
            Self::Escaped => ESCAPED_RESPONSE_HEADER_SIZE,
            Self::Unescaped => UNESCAPED_RESPONSE_HEADER_SIZE,
        }
    }

    /// Wire bytes needed to carry `src` in a variable field.
    pub fn wire_len(self, src: &[u8]) -> usize {
        match self {
            Self::Escaped => escaped_len(src),
            Self::Unescaped => src.len(),
        }
    }

    /// Append `src` to `dst` as a variable field.
    pub fn put_field(self, src: &[u8], dst: &mut BytesMut) {
        match self {
            Self::Escaped => escape_into(src, dst),
            Self::Unescaped => dst.put_slice(src),
        }
    }

    /// Range of wire lengths able to carry exactly `decoded` bytes.
    pub fn wire_range(self, decoded: usize) -> std::ops::RangeInclusive<usize> {
        match self {
            Self::Escaped => decoded..=decoded * 2,
            Self::Unescaped => decoded..=decoded,
        }
    }
}

/// Whether `byte` must be escaped inside a variable field.
#[inline]
pub fn needs_escape(byte: u8) -> bool {
    byte == START_OF_PACKET || byte == ESCAPE
}

/// Number of bytes `src` occupies once escaped.
pub fn escaped_len(src: &[u8]) -> usize {
    src.len() + src.iter().filter(|&&b| needs_escape(b)).count()
}

/// Escape `src` into `dst`. Marker bytes become `(ESCAPE, byte ^ 1)`.
pub fn escape_into(src: &[u8], dst: &mut BytesMut) {
    dst.reserve(escaped_len(src));
    for &byte in src {
        if needs_escape(byte) {
            dst.put_u8(ESCAPE);
            dst.put_u8(byte ^ 1);
        } else {
            dst.put_u8(byte);
        }
    }
}

/// Reverse [`escape_into`].
///
/// Pairs whose second byte is not a flipped marker are accepted as-is
/// (`byte ^ 1`). A trailing escape marker is an error.
pub fn unescape(src: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(src.len());
    let mut pending = false;
    for &byte in src {
        if pending {
            out.push(byte ^ 1);
            pending = false;
        } else if byte == ESCAPE {
            pending = true;
        } else {
            out.push(byte);
        }
    }
    if pending {
        return Err(FrameError::DanglingEscape);
    }
    Ok(out)
}

/// Pack a sequence number into the two escaped-profile header bytes.
///
/// Bit layout (s = sequence bit):
/// ```text
/// byte 0: s8 s7 s6 s5 s4 s3 s2 s1
/// byte 1: s15 s14 s13 s12 s11 s10 s9 0
/// ```
/// Bit 0 of the sequence is not transmitted.
pub fn pack_sequence(sequence: u16) -> [u8; 2] {
    [(sequence >> 1) as u8, ((sequence >> 8) as u8) & 0xFE]
}

/// Inverse of [`pack_sequence`]. The reserved low bit of byte 1 is ignored.
pub fn unpack_sequence(low: u8, high: u8) -> u16 {
    ((low as u16) << 1) | (((high & 0xFE) as u16) << 8)
}

/// Largest length the packed 14-bit length field can carry.
pub const MAX_PACKED_LENGTH: usize = 0x3FFF;

/// Pack a payload length into the two escaped-profile header bytes.
///
/// Bit layout (l = length bit):
/// ```text
/// byte 0: l6 l5 l4 l3 l2 l1 l0 0
/// byte 1: l13 l12 l11 l10 l9 l8 l7 0
/// ```
pub fn pack_length(length: usize) -> Result<[u8; 2]> {
    if length > MAX_PACKED_LENGTH {
        return Err(FrameError::PayloadTooLarge {
            size: length,
            max: MAX_PACKED_LENGTH,
        });
    }
    Ok([(length as u8) << 1, ((length >> 7) as u8) << 1])
}

/// Inverse of [`pack_length`]. Reserved low bits are ignored.
pub fn unpack_length(low: u8, high: u8) -> usize {
    ((low >> 1) as usize) | (((high & 0xFE) as usize) << 6)
}

/// Escaped-profile password length byte: the escaped length shifted left by one.
pub fn pack_password_length(length: usize) -> Result<u8> {
    if length > 0x7F {
        return Err(FrameError::PasswordTooLong {
            size: length,
            max: 0x7F,
        });
    }
    Ok((length as u8) << 1)
}

/// Inverse of [`pack_password_length`]. `None` when the validity bit is set.
pub fn unpack_password_length(byte: u8) -> Option<usize> {
    if byte & 1 != 0 {
        None
    } else {
        Some((byte >> 1) as usize)
    }
}
