//! Boundary between the protocol engine and device-specific behaviour.
//!
//! The engine validates everything it can from the catalog before calling
//! into [`DeviceLogic`]. Each call receives a [`Responder`] by value and must
//! return the [`Reply`] it produces, so exactly one response is built per
//! accepted frame.

use iotdcp_catalog::{EnumEntry, EnumValue, Property};
use iotdcp_frame::{MessageType, ResponseCode, ResponseWriter};

/// A validated Execute, GetProperty, SetProperty or DescribeEnum request.
#[derive(Debug, Clone, Copy)]
pub struct Call<'a> {
    pub message: MessageType,
    pub client_id: u8,
    pub interface: u8,
    /// Command index for Execute, property index otherwise.
    pub index: u8,
    /// Catalog entry of the addressed property; `None` for Execute.
    pub property: Option<&'a Property>,
    /// Payload after the two index bytes.
    pub payload: &'a [u8],
    /// Retransmission of the last accepted message of this session.
    ///
    /// Side effects must not be applied twice; the answer should be the
    /// same as the first time.
    pub duplicate: bool,
}

/// Device-specific behaviour behind the protocol engine.
pub trait DeviceLogic {
    fn execute(&mut self, call: &Call<'_>, reply: Responder<'_>) -> Reply;

    fn get_property(&mut self, call: &Call<'_>, reply: Responder<'_>) -> Reply;

    fn set_property(&mut self, call: &Call<'_>, reply: Responder<'_>) -> Reply;

    /// Describe the values of an enum property.
    ///
    /// Only called for properties whose unit is `Enum`.
    fn describe_enum(&mut self, _call: &Call<'_>, reply: Responder<'_>) -> Reply {
        reply.error(ResponseCode::InvalidInterfaceProperty)
    }

    /// Whether `new_password` may replace the current one right now.
    fn change_password(&mut self, _new_password: &[u8]) -> ResponseCode {
        ResponseCode::CannotChangePasswordNow
    }

    /// Only called when the device advertises reset support.
    fn reset(&mut self) -> ResponseCode {
        ResponseCode::UnsupportedMessage
    }
}

impl<L: DeviceLogic + ?Sized> DeviceLogic for Box<L> {
    fn execute(&mut self, call: &Call<'_>, reply: Responder<'_>) -> Reply {
        (**self).execute(call, reply)
    }

    fn get_property(&mut self, call: &Call<'_>, reply: Responder<'_>) -> Reply {
        (**self).get_property(call, reply)
    }

    fn set_property(&mut self, call: &Call<'_>, reply: Responder<'_>) -> Reply {
        (**self).set_property(call, reply)
    }

    fn describe_enum(&mut self, call: &Call<'_>, reply: Responder<'_>) -> Reply {
        (**self).describe_enum(call, reply)
    }

    fn change_password(&mut self, new_password: &[u8]) -> ResponseCode {
        (**self).change_password(new_password)
    }

    fn reset(&mut self) -> ResponseCode {
        (**self).reset()
    }
}

/// Proof that a response was produced. Only [`Responder`] creates one.
#[derive(Debug, PartialEq, Eq)]
#[must_use]
pub struct Reply {
    code: ResponseCode,
}

impl Reply {
    pub fn code(&self) -> ResponseCode {
        self.code
    }
}

/// Single-use handle for writing the response payload.
///
/// A payload that does not fit turns the response into `DeviceError`.
pub struct Responder<'w> {
    writer: &'w mut ResponseWriter,
}

impl<'w> Responder<'w> {
    /// Wrap a writer whose head is already set; any payload is discarded.
    pub fn new(writer: &'w mut ResponseWriter) -> Self {
        writer.clear_payload();
        Self { writer }
    }

    /// Wire bytes available for the payload.
    pub fn remaining(&self) -> usize {
        self.writer.remaining()
    }

    pub fn ok(self) -> Reply {
        self.error(ResponseCode::Ok)
    }

    /// Respond with `code` and no payload.
    pub fn error(self, code: ResponseCode) -> Reply {
        let writer = self.writer;
        writer.clear_payload();
        Reply { code }
    }

    pub fn ok_u8(self, value: u8) -> Reply {
        self.build(ResponseCode::Ok, |writer| writer.put_u8(value))
    }

    pub fn ok_i8(self, value: i8) -> Reply {
        self.build(ResponseCode::Ok, |writer| writer.put_i8(value))
    }

    pub fn ok_u16(self, value: u16) -> Reply {
        self.build(ResponseCode::Ok, |writer| writer.put_u16(value))
    }

    pub fn ok_i16(self, value: i16) -> Reply {
        self.build(ResponseCode::Ok, |writer| writer.put_i16(value))
    }

    pub fn ok_u32(self, value: u32) -> Reply {
        self.build(ResponseCode::Ok, |writer| writer.put_u32(value))
    }

    pub fn ok_i32(self, value: i32) -> Reply {
        self.build(ResponseCode::Ok, |writer| writer.put_i32(value))
    }

    pub fn ok_f32(self, value: f32) -> Reply {
        self.build(ResponseCode::Ok, |writer| writer.put_f32(value))
    }

    pub fn ok_bytes(self, value: &[u8]) -> Reply {
        self.build(ResponseCode::Ok, |writer| writer.put_slice(value))
    }

    pub fn ok_rgb(self, rgb: [u8; 3]) -> Reply {
        self.build(ResponseCode::Ok, |writer| writer.put_rgb(rgb))
    }

    /// Interface index, property index, value length and value.
    pub fn ok_property_value(self, interface: u8, property: u8, value: &[u8]) -> Reply {
        self.build(ResponseCode::Ok, |writer| {
            writer.put_property_value(interface, property, value)
        })
    }

    /// DescribeEnum payload for the property addressed by `call`.
    pub fn ok_enum<V: EnumValue>(self, call: &Call<'_>, entries: &[EnumEntry<V>]) -> Reply {
        self.build(ResponseCode::Ok, |writer| {
            iotdcp_frame::describe::write_enum(writer, call.interface, call.index, entries)
        })
    }

    /// Write an arbitrary payload and respond with `code`.
    pub fn build<F>(self, code: ResponseCode, write: F) -> Reply
    where
        F: FnOnce(&mut ResponseWriter) -> iotdcp_frame::Result<()>,
    {
        let writer = self.writer;
        match write(&mut *writer) {
            Ok(()) => Reply { code },
            Err(err) => {
                tracing::warn!(error = %err, code = %code, "device response did not fit");
                writer.clear_payload();
                Reply {
                    code: ResponseCode::DeviceError,
                }
            }
        }
    }
}
