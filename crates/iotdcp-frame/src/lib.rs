//! IoTDCP wire codec.
//!
//! Every frame is delimited by a start marker (0x55) and a terminator (0x33).
//! In the escaped profile any marker byte inside a variable field travels as
//! an escape pair, and the fixed header fields are bit-packed so they can never
//! collide with a marker. The unescaped profile uses plain little-endian
//! headers with explicit lengths.
//!
//! - [`Decoder`] rebuilds requests from a possibly fragmented byte stream.
//! - [`ResponseWriter`] builds responses into one reusable buffer.
//! - [`describe`] serializes the capability catalog.
//! - [`client`] encodes requests and parses responses on the controller side.

pub mod client;
pub mod codec;
pub mod decoder;
pub mod describe;
pub mod encoder;
pub mod error;
pub mod message;

pub use client::{decode_response, encode_request, RequestSpec, ResponseFrame};
pub use codec::{
    escape_into, escaped_len, unescape, Profile, DEFAULT_MAX_PASSWORD, DEFAULT_MAX_PAYLOAD,
    DEFAULT_PORT, END_OF_PACKET, ESCAPE, MAX_MAX_PASSWORD, MAX_MAX_PAYLOAD, MIN_MAX_PAYLOAD,
    START_OF_PACKET,
};
pub use decoder::{
    AcceptAll, Admission, Decoder, DecoderConfig, Header, HeaderGate, Outcome, Password, Refusal,
    Request,
};
pub use describe::{DeviceInfo, EnumInfo, InterfaceInfo};
pub use encoder::{ResponseHead, ResponseWriter};
pub use error::{FrameError, Result};
pub use message::{client_id, CapabilityFlags, MessageType, ResponseCode};
