//! Controller side: encode requests and parse response datagrams.

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{
    escaped_len, needs_escape, pack_length, pack_password_length, pack_sequence, unescape,
    unpack_length, unpack_sequence, Profile, END_OF_PACKET, END_OF_PACKET_SIZE, START_OF_PACKET,
};
use crate::error::{FrameError, Result};
use crate::message::{client_id, MessageType, ResponseCode};

/// Fields of a request to encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestSpec<'a> {
    pub message: MessageType,
    pub client_id: u8,
    pub sequence: u16,
    pub password: &'a [u8],
    pub payload: &'a [u8],
}

impl<'a> RequestSpec<'a> {
    /// A system message with its reserved id and the profile's system sequence.
    pub fn system(profile: Profile, message: MessageType, payload: &'a [u8]) -> Self {
        Self {
            message,
            client_id: message.reserved_client_id().unwrap_or(client_id::NONE),
            sequence: profile.max_sequence(),
            password: &[],
            payload,
        }
    }

    /// A message bound to an established session.
    pub fn session(
        message: MessageType,
        client_id: u8,
        sequence: u16,
        password: &'a [u8],
        payload: &'a [u8],
    ) -> Self {
        Self {
            message,
            client_id,
            sequence,
            password,
            payload,
        }
    }
}

/// Encode a request frame.
pub fn encode_request(profile: Profile, spec: &RequestSpec<'_>) -> Result<BytesMut> {
    let mut dst = BytesMut::new();
    match profile {
        Profile::Escaped => {
            let sequence = pack_sequence(spec.sequence);
            if spec.sequence & 1 != 0 || needs_escape(sequence[0]) {
                return Err(FrameError::InvalidSequence(spec.sequence));
            }
            let password_len = pack_password_length(escaped_len(spec.password))?;
            let payload_len = pack_length(escaped_len(spec.payload))?;

            dst.reserve(9 + escaped_len(spec.password) + escaped_len(spec.payload));
            dst.put_u8(START_OF_PACKET);
            dst.put_u8(spec.client_id);
            dst.put_slice(&sequence);
            dst.put_u8(password_len);
            profile.put_field(spec.password, &mut dst);
            dst.put_u8(spec.message.as_u8());
            dst.put_slice(&payload_len);
            profile.put_field(spec.payload, &mut dst);
        }
        Profile::Unescaped => {
            let password_len =
                u8::try_from(spec.password.len()).map_err(|_| FrameError::PasswordTooLong {
                    size: spec.password.len(),
                    max: u8::MAX as usize,
                })?;
            let payload_len =
                u16::try_from(spec.payload.len()).map_err(|_| FrameError::PayloadTooLarge {
                    size: spec.payload.len(),
                    max: u16::MAX as usize,
                })?;

            dst.reserve(9 + spec.password.len() + spec.payload.len());
            dst.put_u8(START_OF_PACKET);
            dst.put_u8(spec.message.as_u8());
            dst.put_u8(spec.client_id);
            dst.put_u16_le(spec.sequence);
            dst.put_u8(password_len);
            dst.put_slice(spec.password);
            dst.put_u16_le(payload_len);
            dst.put_slice(spec.payload);
        }
    }
    dst.put_u8(END_OF_PACKET);
    Ok(dst)
}

/// A parsed response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    /// Echoed message code; only the unescaped profile carries it.
    pub message: Option<u8>,
    pub client_id: u8,
    pub sequence: u16,
    pub code: ResponseCode,
    /// Decoded payload.
    pub payload: Bytes,
}

/// Parse one complete response datagram.
pub fn decode_response(profile: Profile, datagram: &[u8]) -> Result<ResponseFrame> {
    let header_size = profile.response_header_size();
    if datagram.len() < header_size + END_OF_PACKET_SIZE {
        return Err(FrameError::Truncated("response header"));
    }
    if datagram[0] != START_OF_PACKET {
        return Err(FrameError::MissingMarker("start of packet"));
    }
    if datagram[datagram.len() - 1] != END_OF_PACKET {
        return Err(FrameError::MissingMarker("end of packet"));
    }
    let body = &datagram[header_size..datagram.len() - 1];

    let (message, client_id, sequence, code, declared) = match profile {
        Profile::Escaped => (
            None,
            datagram[1],
            unpack_sequence(datagram[2], datagram[3]),
            datagram[4],
            unpack_length(datagram[5], datagram[6]),
        ),
        Profile::Unescaped => (
            Some(datagram[1]),
            datagram[2],
            u16::from_le_bytes([datagram[3], datagram[4]]),
            datagram[5],
            u16::from_le_bytes([datagram[6], datagram[7]]) as usize,
        ),
    };

    if declared != body.len() {
        return Err(FrameError::LengthMismatch {
            declared,
            found: body.len(),
        });
    }
    let code = ResponseCode::from_u8(code).ok_or(FrameError::UnknownResponseCode(code))?;
    let payload = match profile {
        Profile::Escaped => Bytes::from(unescape(body)?),
        Profile::Unescaped => Bytes::copy_from_slice(body),
    };

    Ok(ResponseFrame {
        message,
        client_id,
        sequence,
        code,
        payload,
    })
}
