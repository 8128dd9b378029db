//! Message codes, response codes, reserved client ids and capability flags.
//!
//! Requests and responses use even codes only. Odd client ids are reserved
//! for system messages; sessions are always issued even ids.

use std::fmt;

/// Request message codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum MessageType {
    QueryDevice = 0x00,
    DescribeInterface = 0x02,
    DescribeEnum = 0x04,
    ChangePassword = 0x06,
    Handshake = 0x08,
    Ping = 0x0A,
    Reset = 0x0C,
    GoodBye = 0x0E,
    Execute = 0x10,
    GetProperty = 0x12,
    SetProperty = 0x14,
}

impl MessageType {
    /// Highest defined message code.
    pub const MAX: u8 = 0x14;

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0x00 => Self::QueryDevice,
            0x02 => Self::DescribeInterface,
            0x04 => Self::DescribeEnum,
            0x06 => Self::ChangePassword,
            0x08 => Self::Handshake,
            0x0A => Self::Ping,
            0x0C => Self::Reset,
            0x0E => Self::GoodBye,
            0x10 => Self::Execute,
            0x12 => Self::GetProperty,
            0x14 => Self::SetProperty,
            _ => return None,
        })
    }

    /// System messages need no session and carry a reserved client id.
    pub fn is_system(self) -> bool {
        self <= Self::Handshake
    }

    /// Reserved client id a system message must carry.
    pub fn reserved_client_id(self) -> Option<u8> {
        match self {
            Self::QueryDevice => Some(client_id::QUERY_DEVICE),
            Self::DescribeInterface => Some(client_id::DESCRIBE_INTERFACE),
            Self::DescribeEnum => Some(client_id::DESCRIBE_ENUM),
            Self::ChangePassword => Some(client_id::CHANGE_PASSWORD),
            Self::Handshake => Some(client_id::HANDSHAKE),
            _ => None,
        }
    }

    /// Whether the stored password must be presented.
    pub fn requires_password(self) -> bool {
        !matches!(
            self,
            Self::QueryDevice
                | Self::DescribeInterface
                | Self::DescribeEnum
                | Self::ChangePassword
        )
    }

    /// Exact decoded payload length, for messages that have one.
    pub fn fixed_payload_len(self) -> Option<usize> {
        match self {
            Self::QueryDevice | Self::Handshake => Some(0),
            Self::DescribeInterface => Some(1),
            Self::DescribeEnum => Some(2),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::QueryDevice => "QueryDevice",
            Self::DescribeInterface => "DescribeInterface",
            Self::DescribeEnum => "DescribeEnum",
            Self::ChangePassword => "ChangePassword",
            Self::Handshake => "Handshake",
            Self::Ping => "Ping",
            Self::Reset => "Reset",
            Self::GoodBye => "GoodBye",
            Self::Execute => "Execute",
            Self::GetProperty => "GetProperty",
            Self::SetProperty => "SetProperty",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Response codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResponseCode {
    Ok = 0x00,
    DeviceError = 0x02,
    UnknownClient = 0x04,
    UnsupportedMessage = 0x06,
    PayloadTooLarge = 0x08,
    InvalidPayload = 0x0A,
    EndOfPacketNotFound = 0x0C,
    WrongPassword = 0x0E,
    PasswordReadOnly = 0x10,
    CannotChangePasswordNow = 0x12,
    InvalidInterface = 0x14,
    InvalidInterfaceCommand = 0x16,
    InvalidInterfaceProperty = 0x18,
    InterfacePropertyReadOnly = 0x1A,
    InterfacePropertyWriteOnly = 0x1C,
    InvalidInterfacePropertyValue = 0x1E,
    TryAgainLater = 0x20,
}

impl ResponseCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0x00 => Self::Ok,
            0x02 => Self::DeviceError,
            0x04 => Self::UnknownClient,
            0x06 => Self::UnsupportedMessage,
            0x08 => Self::PayloadTooLarge,
            0x0A => Self::InvalidPayload,
            0x0C => Self::EndOfPacketNotFound,
            0x0E => Self::WrongPassword,
            0x10 => Self::PasswordReadOnly,
            0x12 => Self::CannotChangePasswordNow,
            0x14 => Self::InvalidInterface,
            0x16 => Self::InvalidInterfaceCommand,
            0x18 => Self::InvalidInterfaceProperty,
            0x1A => Self::InterfacePropertyReadOnly,
            0x1C => Self::InterfacePropertyWriteOnly,
            0x1E => Self::InvalidInterfacePropertyValue,
            0x20 => Self::TryAgainLater,
            _ => return None,
        })
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::DeviceError => "DeviceError",
            Self::UnknownClient => "UnknownClient",
            Self::UnsupportedMessage => "UnsupportedMessage",
            Self::PayloadTooLarge => "PayloadTooLarge",
            Self::InvalidPayload => "InvalidPayload",
            Self::EndOfPacketNotFound => "EndOfPacketNotFound",
            Self::WrongPassword => "WrongPassword",
            Self::PasswordReadOnly => "PasswordReadOnly",
            Self::CannotChangePasswordNow => "CannotChangePasswordNow",
            Self::InvalidInterface => "InvalidInterface",
            Self::InvalidInterfaceCommand => "InvalidInterfaceCommand",
            Self::InvalidInterfaceProperty => "InvalidInterfaceProperty",
            Self::InterfacePropertyReadOnly => "InterfacePropertyReadOnly",
            Self::InterfacePropertyWriteOnly => "InterfacePropertyWriteOnly",
            Self::InvalidInterfacePropertyValue => "InvalidInterfacePropertyValue",
            Self::TryAgainLater => "TryAgainLater",
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reserved client ids. Each system message has its own.
pub mod client_id {
    pub const QUERY_DEVICE: u8 = 0xFF;
    pub const DESCRIBE_INTERFACE: u8 = 0xFD;
    pub const DESCRIBE_ENUM: u8 = 0xFB;
    pub const CHANGE_PASSWORD: u8 = 0xF9;
    pub const HANDSHAKE: u8 = 0xF7;

    /// Value of an empty session slot.
    pub const NONE: u8 = 0xFF;

    pub fn is_reserved(id: u8) -> bool {
        id & 1 == 1
    }
}

/// Capability flags reported by QueryDevice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CapabilityFlags(u8);

impl CapabilityFlags {
    pub const PASSWORD_PROTECTED: Self = Self(0x01);
    pub const PASSWORD_READ_ONLY: Self = Self(0x02);
    pub const RESET_SUPPORTED: Self = Self(0x04);
    /// Reserved; the protocol itself never encrypts.
    pub const ENCRYPTION_REQUIRED: Self = Self(0x08);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn set(&mut self, other: Self, enabled: bool) {
        if enabled {
            self.0 |= other.0;
        } else {
            self.0 &= !other.0;
        }
    }

    /// Names of the flags that are set.
    pub fn names(self) -> Vec<&'static str> {
        [
            (Self::PASSWORD_PROTECTED, "password-protected"),
            (Self::PASSWORD_READ_ONLY, "password-read-only"),
            (Self::RESET_SUPPORTED, "reset-supported"),
            (Self::ENCRYPTION_REQUIRED, "encryption-required"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name)
        .collect()
    }
}

impl std::ops::BitOr for CapabilityFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_codes_are_even() {
        for code in 0..=u8::MAX {
            if let Some(message) = MessageType::from_u8(code) {
                assert_eq!(code & 1, 0);
                assert_eq!(message.as_u8(), code);
                assert!(code <= MessageType::MAX);
            }
        }
        assert!(MessageType::from_u8(0x01).is_none());
        assert!(MessageType::from_u8(0x16).is_none());
    }

    #[test]
    fn response_codes_are_even() {
        for code in 0..=u8::MAX {
            if let Some(response) = ResponseCode::from_u8(code) {
                assert_eq!(code & 1, 0);
                assert_eq!(response.as_u8(), code);
            }
        }
        assert_eq!(ResponseCode::from_u8(0x20), Some(ResponseCode::TryAgainLater));
        assert!(ResponseCode::from_u8(0x22).is_none());
    }

    #[test]
    fn system_messages_have_reserved_ids() {
        for message in [
            MessageType::QueryDevice,
            MessageType::DescribeInterface,
            MessageType::DescribeEnum,
            MessageType::ChangePassword,
            MessageType::Handshake,
        ] {
            assert!(message.is_system());
            let id = message.reserved_client_id().unwrap();
            assert!(client_id::is_reserved(id));
        }
        assert!(!MessageType::Ping.is_system());
        assert!(MessageType::Ping.reserved_client_id().is_none());
    }

    #[test]
    fn password_exempt_messages() {
        assert!(!MessageType::QueryDevice.requires_password());
        assert!(!MessageType::ChangePassword.requires_password());
        assert!(MessageType::Handshake.requires_password());
        assert!(MessageType::SetProperty.requires_password());
    }

    #[test]
    fn capability_flags() {
        let mut flags = CapabilityFlags::PASSWORD_PROTECTED | CapabilityFlags::RESET_SUPPORTED;
        assert_eq!(flags.bits(), 0x05);
        assert!(flags.contains(CapabilityFlags::RESET_SUPPORTED));
        flags.set(CapabilityFlags::RESET_SUPPORTED, false);
        assert_eq!(flags.names(), vec!["password-protected"]);
    }
}
