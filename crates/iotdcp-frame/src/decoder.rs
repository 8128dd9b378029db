use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{
    unpack_length, unpack_password_length, unpack_sequence, Profile, DEFAULT_MAX_PASSWORD,
    DEFAULT_MAX_PAYLOAD, END_OF_PACKET, ESCAPE, START_OF_PACKET,
};
use crate::message::{client_id, MessageType, ResponseCode};

/// Limits applied while decoding requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    pub profile: Profile,
    /// Maximum payload length in wire bytes.
    pub max_payload: usize,
    /// Maximum decoded password length.
    pub max_password: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            profile: Profile::Escaped,
            max_payload: DEFAULT_MAX_PAYLOAD,
            max_password: DEFAULT_MAX_PASSWORD,
        }
    }
}

/// Password bytes as presented by a peer. `Debug` never shows the content.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Password(Vec<u8>);

impl Password {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<redacted:{} bytes>", self.0.len())
    }
}

/// Everything known about a request once its payload length has been read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub message: MessageType,
    pub client_id: u8,
    pub sequence: u16,
    pub password: Password,
    /// Payload length in wire bytes.
    pub payload_len: usize,
}

/// Verdict of a [`HeaderGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Keep reading the payload.
    Accept { duplicate: bool },
    /// Drop the frame without a response.
    Discard,
    /// Stop and answer with this code.
    Respond(ResponseCode),
}

/// Decides whether a structurally valid header may proceed.
///
/// The decoder has no notion of sessions; the engine resolves client ids and
/// sequence numbers here. The gate must not mutate session state, because the
/// frame can still fail at its terminator.
pub trait HeaderGate {
    fn admit(&mut self, header: &Header) -> Admission;
}

impl<F> HeaderGate for F
where
    F: FnMut(&Header) -> Admission,
{
    fn admit(&mut self, header: &Header) -> Admission {
        self(header)
    }
}

/// Gate that admits every header as a fresh message.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl HeaderGate for AcceptAll {
    fn admit(&mut self, _header: &Header) -> Admission {
        Admission::Accept { duplicate: false }
    }
}

/// A complete, structurally valid request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub message: MessageType,
    pub client_id: u8,
    pub sequence: u16,
    pub password: Password,
    /// Decoded payload.
    pub payload: Bytes,
    /// Same sequence number as the last accepted message of this session.
    pub duplicate: bool,
}

/// A frame that must be answered with an error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Refusal {
    /// Raw message byte, zero when the frame ended before it.
    pub message: u8,
    pub client_id: u8,
    pub sequence: u16,
    pub code: ResponseCode,
}

/// Result of feeding bytes to the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// All input consumed; the frame is not finished yet.
    Incomplete,
    /// The frame was dropped; nothing must be sent.
    Rejected,
    /// The frame must be answered with an error response.
    Refused(Refusal),
    /// A complete request.
    Request(Request),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    MessageType,
    ClientId,
    SequenceLow,
    SequenceHigh,
    PasswordLength,
    Password,
    PayloadLengthLow,
    PayloadLengthHigh,
    Payload,
    /// Rest of an abandoned unescaped frame.
    Skip,
}

/// Incremental request decoder.
///
/// Bytes may arrive in arbitrary fragments. In the escaped profile a start
/// marker restarts the frame from any state; in the unescaped profile fields
/// are length driven and the start marker is only recognized between frames.
/// An unescaped frame abandoned before its payload is skipped whole, so
/// nothing inside it is ever read as a frame of its own.
pub struct Decoder {
    config: DecoderConfig,
    state: State,
    escape_pending: bool,
    message: u8,
    client_id: u8,
    sequence_low: u8,
    sequence: u16,
    password_remaining: usize,
    password: Vec<u8>,
    /// Still walking the fields of a frame that was already answered.
    discarding: bool,
    skip_remaining: usize,
    length_low: u8,
    header: Option<Header>,
    duplicate: bool,
    received: usize,
    payload: BytesMut,
}

impl Decoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            config,
            state: State::Idle,
            escape_pending: false,
            message: 0,
            client_id: 0,
            sequence_low: 0,
            sequence: 0,
            password_remaining: 0,
            password: Vec::with_capacity(config.max_password),
            discarding: false,
            skip_remaining: 0,
            length_low: 0,
            header: None,
            duplicate: false,
            received: 0,
            payload: BytesMut::with_capacity(config.max_payload),
        }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Whether the decoder sits between frames.
    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    /// Abandon any partial frame.
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.escape_pending = false;
        self.discarding = false;
        self.header = None;
    }

    /// Consume bytes until a frame finishes or the input runs out.
    ///
    /// Returns the number of bytes consumed and what happened. Bytes after a
    /// finished frame are left for the next call.
    pub fn feed<G: HeaderGate + ?Sized>(&mut self, input: &[u8], gate: &mut G) -> (usize, Outcome) {
        for (index, &byte) in input.iter().enumerate() {
            if let Some(outcome) = self.step(byte, gate) {
                return (index + 1, outcome);
            }
        }
        (input.len(), Outcome::Incomplete)
    }

    fn step<G: HeaderGate + ?Sized>(&mut self, byte: u8, gate: &mut G) -> Option<Outcome> {
        let profile = self.config.profile;
        if byte == START_OF_PACKET && (profile == Profile::Escaped || self.state == State::Idle) {
            if self.state != State::Idle {
                tracing::trace!(state = ?self.state, "start marker restarted frame");
            }
            self.begin_frame();
            return None;
        }

        match self.state {
            State::Idle => {}
            State::MessageType => {
                self.message = byte;
                self.state = match profile {
                    Profile::Escaped => State::PayloadLengthLow,
                    Profile::Unescaped => State::ClientId,
                };
            }
            State::ClientId => {
                self.client_id = byte;
                self.state = State::SequenceLow;
            }
            State::SequenceLow => {
                self.sequence_low = byte;
                self.state = State::SequenceHigh;
            }
            State::SequenceHigh => {
                self.sequence = match profile {
                    Profile::Escaped => unpack_sequence(self.sequence_low, byte),
                    Profile::Unescaped => u16::from_le_bytes([self.sequence_low, byte]),
                };
                self.state = State::PasswordLength;
            }
            State::PasswordLength => {
                let (wire_len, max) = match profile {
                    Profile::Escaped => (unpack_password_length(byte), self.config.max_password * 2),
                    Profile::Unescaped => (Some(byte as usize), self.config.max_password),
                };
                match wire_len {
                    Some(len) if len <= max => {
                        self.password_remaining = len;
                        self.state = if len == 0 {
                            self.after_password()
                        } else {
                            State::Password
                        };
                    }
                    Some(len) if profile == Profile::Unescaped => {
                        let outcome = self.refuse(ResponseCode::WrongPassword);
                        self.discarding = true;
                        self.password_remaining = len;
                        self.state = State::Password;
                        return Some(outcome);
                    }
                    _ => return Some(self.refuse(ResponseCode::WrongPassword)),
                }
            }
            State::Password => {
                self.password_remaining -= 1;
                if let Some(value) = self.unescape(byte) {
                    if !self.discarding {
                        self.password.push(value);
                    }
                }
                if self.password_remaining == 0 {
                    if self.escape_pending {
                        return Some(self.refuse(ResponseCode::WrongPassword));
                    }
                    self.state = self.after_password();
                }
            }
            State::PayloadLengthLow => {
                self.length_low = byte;
                self.state = State::PayloadLengthHigh;
            }
            State::PayloadLengthHigh => {
                let payload_len = match profile {
                    Profile::Escaped => unpack_length(self.length_low, byte),
                    Profile::Unescaped => u16::from_le_bytes([self.length_low, byte]) as usize,
                };
                if self.discarding {
                    self.skip(payload_len + 1);
                    return None;
                }
                let outcome = self.check_header(payload_len, gate);
                if outcome.is_some() && profile == Profile::Unescaped {
                    self.skip(payload_len + 1);
                }
                return outcome;
            }
            State::Payload => {
                let expected = self.header.as_ref().map_or(0, |header| header.payload_len);
                if self.received == expected {
                    return Some(self.terminate(byte));
                }
                self.received += 1;
                if let Some(value) = self.unescape(byte) {
                    self.payload.put_u8(value);
                }
            }
            State::Skip => {
                self.skip_remaining -= 1;
                if self.skip_remaining == 0 {
                    self.state = State::Idle;
                    self.discarding = false;
                }
            }
        }
        None
    }

    /// Consume the next `count` bytes without looking at them.
    fn skip(&mut self, count: usize) {
        tracing::trace!(count, "skipping rest of abandoned frame");
        self.state = State::Skip;
        self.skip_remaining = count;
    }

    fn begin_frame(&mut self) {
        self.state = match self.config.profile {
            Profile::Escaped => State::ClientId,
            Profile::Unescaped => State::MessageType,
        };
        self.escape_pending = false;
        self.message = 0;
        self.client_id = 0;
        self.sequence = 0;
        self.password_remaining = 0;
        self.password.clear();
        self.discarding = false;
        self.header = None;
        self.duplicate = false;
        self.received = 0;
        self.payload.clear();
    }

    fn after_password(&self) -> State {
        match self.config.profile {
            Profile::Escaped => State::MessageType,
            Profile::Unescaped => State::PayloadLengthLow,
        }
    }

    fn unescape(&mut self, byte: u8) -> Option<u8> {
        if self.config.profile == Profile::Unescaped {
            return Some(byte);
        }
        if self.escape_pending {
            self.escape_pending = false;
            Some(byte ^ 1)
        } else if byte == ESCAPE {
            self.escape_pending = true;
            None
        } else {
            Some(byte)
        }
    }

    fn check_header<G: HeaderGate + ?Sized>(
        &mut self,
        payload_len: usize,
        gate: &mut G,
    ) -> Option<Outcome> {
        let profile = self.config.profile;
        let Some(message) = MessageType::from_u8(self.message) else {
            return Some(self.reject("undefined message type"));
        };

        if message.is_system() {
            if message.reserved_client_id() != Some(self.client_id) {
                return Some(self.reject("system message without its reserved client id"));
            }
            if self.sequence != profile.max_sequence() {
                return Some(self.reject("system message with a session sequence number"));
            }
            if message == MessageType::QueryDevice && (payload_len != 0 || !self.password.is_empty())
            {
                return Some(self.reject("query device carries data"));
            }
        } else if client_id::is_reserved(self.client_id) {
            return Some(self.refuse(ResponseCode::UnknownClient));
        }

        let header = Header {
            message,
            client_id: self.client_id,
            sequence: self.sequence,
            password: Password(std::mem::take(&mut self.password)),
            payload_len,
        };

        match gate.admit(&header) {
            Admission::Accept { duplicate } => self.duplicate = duplicate,
            Admission::Discard => return Some(self.reject("discarded by session check")),
            Admission::Respond(code) => return Some(self.refuse(code)),
        }

        let code = match message {
            MessageType::DescribeInterface | MessageType::DescribeEnum => {
                let expected = message.fixed_payload_len().unwrap_or(0);
                if !header.password.is_empty() {
                    Some(ResponseCode::WrongPassword)
                } else if !profile.wire_range(expected).contains(&payload_len) {
                    Some(ResponseCode::InvalidPayload)
                } else {
                    None
                }
            }
            MessageType::ChangePassword if !header.password.is_empty() => {
                Some(ResponseCode::WrongPassword)
            }
            MessageType::Handshake if payload_len != 0 => Some(ResponseCode::InvalidPayload),
            _ => None,
        };
        if let Some(code) = code {
            return Some(self.refuse(code));
        }

        if payload_len > self.config.max_payload {
            return Some(self.refuse(ResponseCode::PayloadTooLarge));
        }

        self.header = Some(header);
        self.received = 0;
        self.state = State::Payload;
        None
    }

    fn terminate(&mut self, byte: u8) -> Outcome {
        let Some(header) = self.header.take() else {
            self.state = State::Idle;
            return Outcome::Rejected;
        };

        if self.escape_pending {
            return self.refuse(ResponseCode::InvalidPayload);
        }
        if byte != END_OF_PACKET {
            return self.refuse(ResponseCode::EndOfPacketNotFound);
        }

        let payload = self.payload.split().freeze();
        if let Some(expected) = header.message.fixed_payload_len() {
            if payload.len() != expected {
                return self.refuse(ResponseCode::InvalidPayload);
            }
        }
        if header.message == MessageType::ChangePassword && payload.len() > self.config.max_password
        {
            return self.refuse(ResponseCode::PayloadTooLarge);
        }

        self.state = State::Idle;
        tracing::trace!(
            message = %header.message,
            client_id = header.client_id,
            sequence = header.sequence,
            payload_len = payload.len(),
            duplicate = self.duplicate,
            "request decoded"
        );
        Outcome::Request(Request {
            message: header.message,
            client_id: header.client_id,
            sequence: header.sequence,
            password: header.password,
            payload,
            duplicate: self.duplicate,
        })
    }

    fn refuse(&mut self, code: ResponseCode) -> Outcome {
        self.state = State::Idle;
        self.escape_pending = false;
        self.header = None;
        tracing::debug!(
            message = self.message,
            client_id = self.client_id,
            code = %code,
            "request refused"
        );
        Outcome::Refused(Refusal {
            message: self.message,
            client_id: self.client_id,
            sequence: self.sequence,
            code,
        })
    }

    fn reject(&mut self, reason: &'static str) -> Outcome {
        self.state = State::Idle;
        self.escape_pending = false;
        self.header = None;
        tracing::warn!(
            message = self.message,
            client_id = self.client_id,
            reason,
            "frame rejected"
        );
        Outcome::Rejected
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(DecoderConfig::default())
    }
}
