use bytes::{BufMut, BytesMut};

use crate::codec::{
    pack_length, pack_sequence, Profile, DEFAULT_MAX_PAYLOAD, END_OF_PACKET, END_OF_PACKET_SIZE,
    START_OF_PACKET,
};
use crate::decoder::{Refusal, Request};
use crate::error::{FrameError, Result};
use crate::message::ResponseCode;

/// Fields echoed from the request into its response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResponseHead {
    /// Echoed message code (unescaped profile only).
    pub message: u8,
    pub client_id: u8,
    pub sequence: u16,
}

impl From<&Request> for ResponseHead {
    fn from(request: &Request) -> Self {
        Self {
            message: request.message.as_u8(),
            client_id: request.client_id,
            sequence: request.sequence,
        }
    }
}

impl From<&Refusal> for ResponseHead {
    fn from(refusal: &Refusal) -> Self {
        Self {
            message: refusal.message,
            client_id: refusal.client_id,
            sequence: refusal.sequence,
        }
    }
}

/// Builds response frames in a single reusable buffer.
///
/// The payload is written first behind a placeholder header; [`finish`]
/// fills in the header from the actual wire length and appends the
/// terminator. Every write checks the remaining capacity before touching
/// the buffer, so a failed write leaves the payload unchanged.
///
/// [`finish`]: ResponseWriter::finish
pub struct ResponseWriter {
    profile: Profile,
    max_payload: usize,
    head: ResponseHead,
    buf: BytesMut,
}

impl ResponseWriter {
    pub fn new(profile: Profile, max_payload: usize) -> Self {
        let header_size = profile.response_header_size();
        let mut buf = BytesMut::with_capacity(header_size + max_payload + END_OF_PACKET_SIZE);
        buf.put_bytes(0, header_size);
        Self {
            profile,
            max_payload,
            head: ResponseHead::default(),
            buf,
        }
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    /// Maximum payload length in wire bytes.
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Start a new response, discarding anything written before.
    pub fn begin(&mut self, head: ResponseHead) {
        self.head = head;
        self.clear_payload();
    }

    pub fn head(&self) -> ResponseHead {
        self.head
    }

    /// Drop the payload written so far, keeping the head.
    pub fn clear_payload(&mut self) {
        self.buf.clear();
        self.buf.put_bytes(0, self.profile.response_header_size());
    }

    /// Payload length written so far, in wire bytes.
    pub fn payload_len(&self) -> usize {
        self.buf.len() - self.profile.response_header_size()
    }

    /// Wire bytes still available for payload.
    pub fn remaining(&self) -> usize {
        self.max_payload.saturating_sub(self.payload_len())
    }

    /// Append raw payload bytes, escaping them if the profile requires it.
    pub fn put_slice(&mut self, src: &[u8]) -> Result<()> {
        let needed = self.profile.wire_len(src);
        if needed > self.remaining() {
            return Err(FrameError::ResponseOverflow {
                needed,
                available: self.remaining(),
            });
        }
        self.profile.put_field(src, &mut self.buf);
        Ok(())
    }

    pub fn put_u8(&mut self, value: u8) -> Result<()> {
        self.put_slice(&[value])
    }

    pub fn put_i8(&mut self, value: i8) -> Result<()> {
        self.put_slice(&value.to_le_bytes())
    }

    pub fn put_u16(&mut self, value: u16) -> Result<()> {
        self.put_slice(&value.to_le_bytes())
    }

    pub fn put_i16(&mut self, value: i16) -> Result<()> {
        self.put_slice(&value.to_le_bytes())
    }

    pub fn put_u32(&mut self, value: u32) -> Result<()> {
        self.put_slice(&value.to_le_bytes())
    }

    pub fn put_i32(&mut self, value: i32) -> Result<()> {
        self.put_slice(&value.to_le_bytes())
    }

    pub fn put_u64(&mut self, value: u64) -> Result<()> {
        self.put_slice(&value.to_le_bytes())
    }

    pub fn put_i64(&mut self, value: i64) -> Result<()> {
        self.put_slice(&value.to_le_bytes())
    }

    /// IEEE-754 bits, little endian.
    pub fn put_f32(&mut self, value: f32) -> Result<()> {
        self.put_slice(&value.to_le_bytes())
    }

    pub fn put_f64(&mut self, value: f64) -> Result<()> {
        self.put_slice(&value.to_le_bytes())
    }

    /// Three bytes in R, G, B order.
    pub fn put_rgb(&mut self, rgb: [u8; 3]) -> Result<()> {
        self.put_slice(&rgb)
    }

    /// One length byte followed by the UTF-8 bytes.
    pub fn put_name(&mut self, name: &str) -> Result<()> {
        let len = u8::try_from(name.len())
            .map_err(|_| FrameError::InvalidDescriptor(format!("name too long: {name}")))?;
        self.put_u8(len)?;
        self.put_slice(name.as_bytes())
    }

    /// Interface index, property index, 16-bit value length and the value.
    pub fn put_property_value(&mut self, interface: u8, property: u8, value: &[u8]) -> Result<()> {
        let len = u16::try_from(value.len()).map_err(|_| FrameError::PayloadTooLarge {
            size: value.len(),
            max: u16::MAX as usize,
        })?;
        let mut prefix = [0u8; 4];
        prefix[0] = interface;
        prefix[1] = property;
        prefix[2..].copy_from_slice(&len.to_le_bytes());

        let needed = self.profile.wire_len(&prefix) + self.profile.wire_len(value);
        if needed > self.remaining() {
            return Err(FrameError::ResponseOverflow {
                needed,
                available: self.remaining(),
            });
        }
        self.put_slice(&prefix)?;
        self.put_slice(value)
    }

    /// Complete the frame with `code` and return its bytes.
    pub fn finish(&mut self, code: ResponseCode) -> Result<&[u8]> {
        let payload_len = self.payload_len();
        let head = self.head;
        match self.profile {
            Profile::Escaped => {
                let sequence = pack_sequence(head.sequence);
                let length = pack_length(payload_len)?;
                self.buf[..7].copy_from_slice(&[
                    START_OF_PACKET,
                    head.client_id,
                    sequence[0],
                    sequence[1],
                    code.as_u8(),
                    length[0],
                    length[1],
                ]);
            }
            Profile::Unescaped => {
                let length = u16::try_from(payload_len).map_err(|_| FrameError::PayloadTooLarge {
                    size: payload_len,
                    max: u16::MAX as usize,
                })?;
                let sequence = head.sequence.to_le_bytes();
                let length = length.to_le_bytes();
                self.buf[..8].copy_from_slice(&[
                    START_OF_PACKET,
                    head.message,
                    head.client_id,
                    sequence[0],
                    sequence[1],
                    code.as_u8(),
                    length[0],
                    length[1],
                ]);
            }
        }
        self.buf.put_u8(END_OF_PACKET);
        Ok(&self.buf[..])
    }

    /// Discard any payload and finish with `code`.
    pub fn finish_empty(&mut self, code: ResponseCode) -> Result<&[u8]> {
        self.clear_payload();
        self.finish(code)
    }
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new(Profile::Escaped, DEFAULT_MAX_PAYLOAD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::decode_response;
    use crate::codec::ESCAPE;

    fn head() -> ResponseHead {
        ResponseHead {
            message: 0x12,
            client_id: 2,
            sequence: 8,
        }
    }

    #[test]
    fn empty_escaped_response() {
        let mut writer = ResponseWriter::default();
        writer.begin(head());
        let bytes = writer.finish(ResponseCode::UnknownClient).unwrap();
        assert_eq!(
            bytes,
            &[START_OF_PACKET, 2, 0x04, 0x00, 0x04, 0x00, 0x00, END_OF_PACKET]
        );
    }

    #[test]
    fn escaped_length_counts_escape_bytes() {
        let mut writer = ResponseWriter::default();
        writer.begin(head());
        writer.put_u8(START_OF_PACKET).unwrap();
        writer.put_u8(0x01).unwrap();
        let bytes = writer.finish(ResponseCode::Ok).unwrap().to_vec();
        assert_eq!(&bytes[5..7], &[3 << 1, 0]);
        assert_eq!(&bytes[7..10], &[ESCAPE, START_OF_PACKET ^ 1, 0x01]);
        assert_eq!(*bytes.last().unwrap(), END_OF_PACKET);

        let frame = decode_response(Profile::Escaped, &bytes).unwrap();
        assert_eq!(frame.payload.as_ref(), &[START_OF_PACKET, 0x01]);
    }

    #[test]
    fn typed_values_are_little_endian() {
        let mut writer = ResponseWriter::new(Profile::Unescaped, 64);
        writer.begin(head());
        writer.put_u16(0x0102).unwrap();
        writer.put_u32(0x0304_0506).unwrap();
        writer.put_i8(-1).unwrap();
        writer.put_f32(1.0).unwrap();
        writer.put_rgb([0xAA, 0xBB, 0xCC]).unwrap();
        let bytes = writer.finish(ResponseCode::Ok).unwrap().to_vec();
        let frame = decode_response(Profile::Unescaped, &bytes).unwrap();
        assert_eq!(frame.message, Some(0x12));
        assert_eq!(
            frame.payload.as_ref(),
            &[
                0x02, 0x01, 0x06, 0x05, 0x04, 0x03, 0xFF, 0x00, 0x00, 0x80, 0x3F, 0xAA, 0xBB,
                0xCC
            ]
        );
    }

    #[test]
    fn float_bits_are_preserved() {
        let mut writer = ResponseWriter::default();
        writer.begin(head());
        let value = f32::from_bits(0x7FC0_1B55);
        writer.put_f32(value).unwrap();
        let bytes = writer.finish(ResponseCode::Ok).unwrap().to_vec();
        let frame = decode_response(Profile::Escaped, &bytes).unwrap();
        assert_eq!(frame.payload.as_ref(), &0x7FC0_1B55u32.to_le_bytes());
    }

    #[test]
    fn property_value_prefix() {
        let mut writer = ResponseWriter::default();
        writer.begin(head());
        writer.put_property_value(0, 1, &[10, 20, 30]).unwrap();
        let bytes = writer.finish(ResponseCode::Ok).unwrap().to_vec();
        let frame = decode_response(Profile::Escaped, &bytes).unwrap();
        assert_eq!(frame.payload.as_ref(), &[0, 1, 3, 0, 10, 20, 30]);
    }

    #[test]
    fn overflow_is_checked_before_writing() {
        let mut writer = ResponseWriter::new(Profile::Escaped, 64);
        writer.begin(head());
        writer.put_slice(&[0x01; 63]).unwrap();
        let err = writer.put_u8(START_OF_PACKET).unwrap_err();
        assert!(matches!(
            err,
            FrameError::ResponseOverflow {
                needed: 2,
                available: 1
            }
        ));
        assert_eq!(writer.payload_len(), 63);
        writer.put_u8(0x02).unwrap();
        assert_eq!(writer.remaining(), 0);
    }

    #[test]
    fn begin_resets_previous_payload() {
        let mut writer = ResponseWriter::default();
        writer.begin(head());
        writer.put_u32(7).unwrap();
        writer.finish(ResponseCode::Ok).unwrap();

        writer.begin(ResponseHead {
            client_id: 4,
            ..head()
        });
        let bytes = writer.finish(ResponseCode::Ok).unwrap();
        assert_eq!(bytes.len(), 8);
        assert_eq!(bytes[1], 4);
    }

    #[test]
    fn finish_empty_drops_payload() {
        let mut writer = ResponseWriter::default();
        writer.begin(head());
        writer.put_u8(1).unwrap();
        let bytes = writer.finish_empty(ResponseCode::DeviceError).unwrap();
        assert_eq!(bytes.len(), 8);
        assert_eq!(bytes[4], ResponseCode::DeviceError.as_u8());
    }

    #[test]
    fn long_name_is_rejected() {
        let mut writer = ResponseWriter::new(Profile::Escaped, 4096);
        writer.begin(head());
        let name = "n".repeat(256);
        assert!(matches!(
            writer.put_name(&name),
            Err(FrameError::InvalidDescriptor(_))
        ));
    }
}
