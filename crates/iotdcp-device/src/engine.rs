//! The device engine: decoder, session table, catalog and response buffer.

use std::net::SocketAddr;

use iotdcp_catalog::Catalog;
use iotdcp_frame::describe::{write_interface, write_query_device};
use iotdcp_frame::{
    Admission, CapabilityFlags, Decoder, Header, HeaderGate, MessageType, Outcome, Request,
    ResponseCode, ResponseHead, ResponseWriter,
};

use crate::config::DeviceSettings;
use crate::dispatch::{Call, DeviceLogic, Responder};
use crate::error::{DeviceError, Result};
use crate::session::{SequenceCheck, SessionTable};

/// What a call to [`Device::process`] produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Processed<'a> {
    /// The frame is not complete yet.
    Incomplete,
    /// The frame was dropped without a response.
    Rejected,
    /// Response frame to send back to the endpoint.
    Response(&'a [u8]),
}

/// One protocol instance.
///
/// Not reentrant: frames are decoded and answered one at a time, and the
/// returned response borrows the engine's buffer until the next call.
pub struct Device<L> {
    settings: DeviceSettings,
    catalog: Catalog,
    flags: CapabilityFlags,
    password: Vec<u8>,
    sessions: SessionTable,
    decoder: Decoder,
    writer: ResponseWriter,
    logic: L,
}

impl<L: DeviceLogic> Device<L> {
    pub fn new(settings: DeviceSettings, catalog: Catalog, logic: L) -> Result<Self> {
        settings.validate()?;
        catalog.validate()?;
        let flags = settings.flags();
        tracing::debug!(
            device = catalog.display_name(),
            interfaces = catalog.interfaces.len(),
            profile = ?settings.profile,
            flags = ?flags.names(),
            "device initialized"
        );
        Ok(Self {
            flags,
            password: settings.initial_password(),
            sessions: SessionTable::new(settings.max_clients),
            decoder: Decoder::new(settings.decoder_config()),
            writer: ResponseWriter::new(settings.profile, settings.max_payload),
            settings,
            catalog,
            logic,
        })
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn flags(&self) -> CapabilityFlags {
        self.flags
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    pub fn logic(&self) -> &L {
        &self.logic
    }

    pub fn logic_mut(&mut self) -> &mut L {
        &mut self.logic
    }

    /// Replace the stored password locally.
    pub fn set_password(&mut self, password: &[u8]) -> Result<()> {
        if self.settings.no_password && !password.is_empty() {
            return Err(DeviceError::InvalidConfig(
                "device is configured without a password".to_string(),
            ));
        }
        if password.len() > self.settings.max_password {
            return Err(DeviceError::InvalidConfig(format!(
                "password is {} bytes, max_password is {}",
                password.len(),
                self.settings.max_password
            )));
        }
        self.password = password.to_vec();
        Ok(())
    }

    /// Feed bytes received from `endpoint`.
    ///
    /// Returns how many bytes were consumed and the result. Bytes after a
    /// finished frame are not consumed; call again with the rest.
    pub fn process(&mut self, endpoint: SocketAddr, input: &[u8]) -> (usize, Processed<'_>) {
        let mut gate = SessionGate {
            sessions: &self.sessions,
            endpoint,
            password_locked: self.settings.password_locked(),
        };
        let (consumed, outcome) = self.decoder.feed(input, &mut gate);
        let processed = match outcome {
            Outcome::Incomplete => Processed::Incomplete,
            Outcome::Rejected => Processed::Rejected,
            Outcome::Refused(refusal) => {
                self.writer.begin(ResponseHead::from(&refusal));
                self.respond(refusal.code)
            }
            Outcome::Request(request) => {
                self.writer.begin(ResponseHead::from(&request));
                let code = self.answer(endpoint, &request);
                self.respond(code)
            }
        };
        (consumed, processed)
    }

    /// Handle one datagram and collect every response it produced.
    ///
    /// A frame left unfinished at the end of the datagram is discarded.
    pub fn handle_datagram(&mut self, endpoint: SocketAddr, datagram: &[u8]) -> Vec<Vec<u8>> {
        self.decoder.reset();
        let mut responses = Vec::new();
        let mut input = datagram;
        while !input.is_empty() {
            let (consumed, processed) = self.process(endpoint, input);
            if let Processed::Response(frame) = processed {
                responses.push(frame.to_vec());
            }
            input = &input[consumed..];
        }
        if !self.decoder.is_idle() {
            tracing::trace!(%endpoint, "datagram ended inside a frame");
            self.decoder.reset();
        }
        responses
    }

    fn respond(&mut self, code: ResponseCode) -> Processed<'_> {
        match self.writer.finish(code) {
            Ok(frame) => Processed::Response(frame),
            Err(err) => {
                tracing::warn!(error = %err, "response could not be finished");
                Processed::Rejected
            }
        }
    }

    /// Everything past the header checks; writes the payload, returns the code.
    fn answer(&mut self, endpoint: SocketAddr, request: &Request) -> ResponseCode {
        let message = request.message;
        if message.requires_password() && request.password.as_bytes() != self.password.as_slice() {
            return ResponseCode::WrongPassword;
        }

        if !message.is_system() {
            match self
                .sessions
                .touch(request.client_id, endpoint, request.sequence)
            {
                Some(SequenceCheck::Fresh | SequenceCheck::Duplicate) => {}
                Some(SequenceCheck::Stale) | None => return ResponseCode::UnknownClient,
            }
        }

        match message {
            MessageType::QueryDevice => self.describe(|writer, catalog, flags| {
                write_query_device(writer, catalog, flags)
            }),
            MessageType::DescribeInterface => {
                let index = request.payload[0];
                if self.catalog.interface(index).is_none() {
                    return ResponseCode::InvalidInterface;
                }
                self.describe(|writer, catalog, _| match catalog.interface(index) {
                    Some(interface) => write_interface(writer, index, interface),
                    None => Ok(()),
                })
            }
            MessageType::DescribeEnum => self.describe_enum(request),
            MessageType::ChangePassword => self.change_password(request),
            MessageType::Handshake => {
                let allocation = self.sessions.allocate(endpoint, request.sequence);
                match self.writer.put_u8(allocation.id) {
                    Ok(()) => ResponseCode::Ok,
                    Err(_) => ResponseCode::DeviceError,
                }
            }
            MessageType::Ping => ResponseCode::Ok,
            MessageType::Reset => {
                if !self.settings.reset_supported {
                    ResponseCode::UnsupportedMessage
                } else if request.duplicate {
                    ResponseCode::Ok
                } else {
                    tracing::debug!(client_id = request.client_id, "reset requested");
                    self.logic.reset()
                }
            }
            MessageType::GoodBye => {
                self.sessions.release(request.client_id, endpoint);
                ResponseCode::Ok
            }
            MessageType::Execute | MessageType::GetProperty | MessageType::SetProperty => {
                self.dispatch(request)
            }
        }
    }

    fn describe<F>(&mut self, write: F) -> ResponseCode
    where
        F: FnOnce(&mut ResponseWriter, &Catalog, CapabilityFlags) -> iotdcp_frame::Result<()>,
    {
        match write(&mut self.writer, &self.catalog, self.flags) {
            Ok(()) => ResponseCode::Ok,
            Err(err) => {
                tracing::warn!(error = %err, "catalog does not fit the response");
                self.writer.clear_payload();
                ResponseCode::DeviceError
            }
        }
    }

    fn describe_enum(&mut self, request: &Request) -> ResponseCode {
        let (interface, index) = (request.payload[0], request.payload[1]);
        let Some(entry) = self.catalog.interface(interface) else {
            return ResponseCode::InvalidInterface;
        };
        let Some(property) = entry.property(index).filter(|property| property.is_enum()) else {
            return ResponseCode::InvalidInterfaceProperty;
        };
        let call = Call {
            message: request.message,
            client_id: request.client_id,
            interface,
            index,
            property: Some(property),
            payload: &[],
            duplicate: request.duplicate,
        };
        self.logic
            .describe_enum(&call, Responder::new(&mut self.writer))
            .code()
    }

    fn change_password(&mut self, request: &Request) -> ResponseCode {
        if self.settings.password_locked() {
            return ResponseCode::PasswordReadOnly;
        }
        let code = self.logic.change_password(&request.payload);
        if code.is_ok() {
            self.password = request.payload.to_vec();
            tracing::debug!("password changed");
        }
        code
    }

    fn dispatch(&mut self, request: &Request) -> ResponseCode {
        let message = request.message;
        let [interface, index, ref payload @ ..] = request.payload[..] else {
            return ResponseCode::InvalidPayload;
        };
        let Some(entry) = self.catalog.interface(interface) else {
            return ResponseCode::InvalidInterface;
        };

        let property = match message {
            MessageType::Execute => {
                if index >= entry.kind.command_count() {
                    return ResponseCode::InvalidInterfaceCommand;
                }
                None
            }
            _ => {
                let Some(property) = entry.property(index) else {
                    return ResponseCode::InvalidInterfaceProperty;
                };
                if message == MessageType::GetProperty && !property.mode.is_readable() {
                    return ResponseCode::InterfacePropertyWriteOnly;
                }
                if message == MessageType::SetProperty && !property.mode.is_writable() {
                    return ResponseCode::InterfacePropertyReadOnly;
                }
                Some(property)
            }
        };

        let call = Call {
            message,
            client_id: request.client_id,
            interface,
            index,
            property,
            payload,
            duplicate: request.duplicate,
        };
        let responder = Responder::new(&mut self.writer);
        let reply = match message {
            MessageType::Execute => self.logic.execute(&call, responder),
            MessageType::GetProperty => self.logic.get_property(&call, responder),
            _ => self.logic.set_property(&call, responder),
        };
        reply.code()
    }
}

/// Resolves sessions at header time without changing them.
struct SessionGate<'a> {
    sessions: &'a SessionTable,
    endpoint: SocketAddr,
    password_locked: bool,
}

impl HeaderGate for SessionGate<'_> {
    fn admit(&mut self, header: &Header) -> Admission {
        if header.message.is_system() {
            if header.message == MessageType::ChangePassword && self.password_locked {
                return Admission::Respond(ResponseCode::PasswordReadOnly);
            }
            return Admission::Accept { duplicate: false };
        }
        match self
            .sessions
            .check(header.client_id, self.endpoint, header.sequence)
        {
            None => Admission::Respond(ResponseCode::UnknownClient),
            Some(SequenceCheck::Fresh) => Admission::Accept { duplicate: false },
            Some(SequenceCheck::Duplicate) => Admission::Accept { duplicate: true },
            Some(SequenceCheck::Stale) => {
                tracing::debug!(
                    client_id = header.client_id,
                    sequence = header.sequence,
                    endpoint = %self.endpoint,
                    "stale sequence number"
                );
                Admission::Discard
            }
        }
    }
}
