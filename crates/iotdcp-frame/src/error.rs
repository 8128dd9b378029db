/// Errors that can occur while encoding or parsing frames locally.
///
/// Protocol-level failures reported to a peer are [`crate::ResponseCode`]s,
/// not `FrameError`s.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A response payload would exceed the configured maximum.
    #[error("response overflow (need {needed} bytes, {available} available)")]
    ResponseOverflow { needed: usize, available: usize },

    /// A payload exceeds what the length field or the configuration allows.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A password exceeds what the length field or the configuration allows.
    #[error("password too long ({size} bytes, max {max})")]
    PasswordTooLong { size: usize, max: usize },

    /// An escape marker ended a field.
    #[error("escape marker at end of field")]
    DanglingEscape,

    /// A datagram did not start with the start marker or end with the terminator.
    #[error("missing frame marker: {0}")]
    MissingMarker(&'static str),

    /// A datagram ended before the named field.
    #[error("frame truncated before {0}")]
    Truncated(&'static str),

    /// The declared payload length disagrees with the bytes present.
    #[error("length mismatch (declared {declared}, found {found})")]
    LengthMismatch { declared: usize, found: usize },

    /// The sequence number cannot be represented in the chosen profile.
    #[error("sequence number {0:#06x} cannot be encoded")]
    InvalidSequence(u16),

    /// A response carried a code outside the defined set.
    #[error("unknown response code {0:#04x}")]
    UnknownResponseCode(u8),

    /// A catalog payload could not be parsed or produced.
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),
}

pub type Result<T> = std::result::Result<T, FrameError>;
