//! Wire tags for interfaces, properties and units.
//!
//! Every tag serializes to exactly one byte on the wire. The byte values are
//! part of the protocol and must never be renumbered.

use serde::{Deserialize, Serialize};

/// Interface behaviour class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum InterfaceType {
    Sensor = 0x00,
    OnOff = 0x01,
    OnOffSimple = 0x02,
    OpenClose = 0x03,
    OpenCloseStop = 0x04,
}

impl InterfaceType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Sensor),
            0x01 => Some(Self::OnOff),
            0x02 => Some(Self::OnOffSimple),
            0x03 => Some(Self::OpenClose),
            0x04 => Some(Self::OpenCloseStop),
            _ => None,
        }
    }

    /// Human-readable name used by the CLI.
    pub fn name(self) -> &'static str {
        match self {
            Self::Sensor => "Sensor",
            Self::OnOff => "OnOff",
            Self::OnOffSimple => "OnOffSimple",
            Self::OpenClose => "OpenClose",
            Self::OpenCloseStop => "OpenCloseStop",
        }
    }

    /// Number of commands the interface type defines.
    pub fn command_count(self) -> u8 {
        match self {
            Self::Sensor => 0,
            Self::OnOff => 2,
            Self::OnOffSimple => 1,
            Self::OpenClose => 2,
            Self::OpenCloseStop => 3,
        }
    }
}

/// Property access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum AccessMode {
    ReadOnly = 0x00,
    WriteOnly = 0x01,
    ReadWrite = 0x02,
}

impl AccessMode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::ReadOnly),
            0x01 => Some(Self::WriteOnly),
            0x02 => Some(Self::ReadWrite),
            _ => None,
        }
    }

    pub fn is_readable(self) -> bool {
        !matches!(self, Self::WriteOnly)
    }

    pub fn is_writable(self) -> bool {
        !matches!(self, Self::ReadOnly)
    }
}

/// Property element data type. Multi-byte types are little endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum DataType {
    S8 = 0x00,
    S16 = 0x01,
    S32 = 0x02,
    S64 = 0x03,
    U8 = 0x04,
    U16 = 0x05,
    U32 = 0x06,
    U64 = 0x07,
    Float32 = 0x08,
    Float64 = 0x09,
    /// 24-bit R,G,B triplet. Only meaningful with [`Unit::Rgb`].
    RgbTriplet = 0x0A,
}

impl DataType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0x00 => Self::S8,
            0x01 => Self::S16,
            0x02 => Self::S32,
            0x03 => Self::S64,
            0x04 => Self::U8,
            0x05 => Self::U16,
            0x06 => Self::U32,
            0x07 => Self::U64,
            0x08 => Self::Float32,
            0x09 => Self::Float64,
            0x0A => Self::RgbTriplet,
            _ => return None,
        })
    }

    /// Size of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            Self::S8 | Self::U8 => 1,
            Self::S16 | Self::U16 => 2,
            Self::RgbTriplet => 3,
            Self::S32 | Self::U32 | Self::Float32 => 4,
            Self::S64 | Self::U64 | Self::Float64 => 8,
        }
    }

    /// Integer types that can back an enumeration (at most 32 bits wide).
    pub fn is_enum_capable(self) -> bool {
        matches!(
            self,
            Self::S8 | Self::U8 | Self::S16 | Self::U16 | Self::S32 | Self::U32
        )
    }
}

/// Unit codes. The `0xFC..=0xFF` range encodes special value formats rather
/// than physical units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Unit {
    #[default]
    One = 0x00,
    Bit = 0x01,
    Byte = 0x02,
    Radian = 0x03,
    Degree = 0x04,
    Second = 0x05,
    Second2 = 0x06,
    Second3 = 0x07,
    Meter = 0x08,
    Meter2 = 0x09,
    Meter3 = 0x0A,
    Gram = 0x0B,
    Ohm = 0x0C,
    Siemens = 0x0D,
    Volt = 0x0E,
    Coulomb = 0x0F,
    Ampere = 0x10,
    Ampere2 = 0x11,
    Watt = 0x12,
    Farad = 0x13,
    Henry = 0x14,
    Weber = 0x15,
    Tesla = 0x16,
    Newton = 0x17,
    Pascal = 0x18,
    Joule = 0x19,
    Kelvin = 0x1A,
    DegreeCelsius = 0x1B,
    Bel = 0x1C,
    Mole = 0x1D,
    Candela = 0x1E,
    Lumen = 0x1F,
    Lux = 0x20,
    Becquerel = 0x21,
    Gray = 0x22,
    Sievert = 0x23,
    Katal = 0x24,
    /// U8, zero is false.
    Bool = 0xFC,
    /// R, G, B and optionally A.
    Rgb = 0xFD,
    /// Null-terminated UTF-8; element count is the capacity.
    Utf8Text = 0xFE,
    /// Enumerated integer; names are served through DescribeEnum.
    Enum = 0xFF,
}

impl Unit {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0x00 => Self::One,
            0x01 => Self::Bit,
            0x02 => Self::Byte,
            0x03 => Self::Radian,
            0x04 => Self::Degree,
            0x05 => Self::Second,
            0x06 => Self::Second2,
            0x07 => Self::Second3,
            0x08 => Self::Meter,
            0x09 => Self::Meter2,
            0x0A => Self::Meter3,
            0x0B => Self::Gram,
            0x0C => Self::Ohm,
            0x0D => Self::Siemens,
            0x0E => Self::Volt,
            0x0F => Self::Coulomb,
            0x10 => Self::Ampere,
            0x11 => Self::Ampere2,
            0x12 => Self::Watt,
            0x13 => Self::Farad,
            0x14 => Self::Henry,
            0x15 => Self::Weber,
            0x16 => Self::Tesla,
            0x17 => Self::Newton,
            0x18 => Self::Pascal,
            0x19 => Self::Joule,
            0x1A => Self::Kelvin,
            0x1B => Self::DegreeCelsius,
            0x1C => Self::Bel,
            0x1D => Self::Mole,
            0x1E => Self::Candela,
            0x1F => Self::Lumen,
            0x20 => Self::Lux,
            0x21 => Self::Becquerel,
            0x22 => Self::Gray,
            0x23 => Self::Sievert,
            0x24 => Self::Katal,
            0xFC => Self::Bool,
            0xFD => Self::Rgb,
            0xFE => Self::Utf8Text,
            0xFF => Self::Enum,
            _ => return None,
        })
    }

    /// Special encodings ignore the denominator and scale.
    pub fn is_special(self) -> bool {
        matches!(self, Self::Bool | Self::Rgb | Self::Utf8Text | Self::Enum)
    }
}

/// IEC binary multipliers. They share the scale byte with decimal exponents,
/// occupying the values above the decimal range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum IecMultiplier {
    Kibi = 0x7F,
    Mebi = 0x7E,
    Gibi = 0x7D,
    Tebi = 0x7C,
    Pebi = 0x7B,
    Exbi = 0x7A,
    Zebi = 0x79,
    Yobi = 0x78,
}

impl IecMultiplier {
    /// Power of two this multiplier stands for.
    pub fn power_of_two(self) -> u32 {
        10 * (0x80 - self as u32)
    }
}

/// Smallest and largest decimal exponent a property may declare.
pub const MIN_EXPONENT: i8 = -30;
pub const MAX_EXPONENT: i8 = 30;

/// Value multiplier: `10^exponent` or an IEC binary prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    Decimal(i8),
    Iec(IecMultiplier),
}

impl Default for Scale {
    fn default() -> Self {
        Self::Decimal(0)
    }
}

impl Scale {
    /// Single wire byte (two's complement for decimal exponents).
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Decimal(exponent) => exponent as u8,
            Self::Iec(multiplier) => multiplier as u8,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        let iec = match value {
            0x7F => IecMultiplier::Kibi,
            0x7E => IecMultiplier::Mebi,
            0x7D => IecMultiplier::Gibi,
            0x7C => IecMultiplier::Tebi,
            0x7B => IecMultiplier::Pebi,
            0x7A => IecMultiplier::Exbi,
            0x79 => IecMultiplier::Zebi,
            0x78 => IecMultiplier::Yobi,
            _ => {
                let exponent = value as i8;
                if (MIN_EXPONENT..=MAX_EXPONENT).contains(&exponent) {
                    return Some(Self::Decimal(exponent));
                }
                return None;
            }
        };
        Some(Self::Iec(iec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_codes_roundtrip_through_byte() {
        for code in (0x00..=0x24).chain(0xFC..=0xFF) {
            let unit = Unit::from_u8(code).expect("defined unit code");
            assert_eq!(unit.as_u8(), code);
        }
        assert!(Unit::from_u8(0x25).is_none());
        assert!(Unit::from_u8(0xFB).is_none());
    }

    #[test]
    fn scale_byte_layout() {
        assert_eq!(Scale::Decimal(-3).as_u8(), 0xFD);
        assert_eq!(Scale::Iec(IecMultiplier::Kibi).as_u8(), 0x7F);
        assert_eq!(Scale::from_u8(0xFD), Some(Scale::Decimal(-3)));
        assert_eq!(Scale::from_u8(0x78), Some(Scale::Iec(IecMultiplier::Yobi)));
        assert_eq!(Scale::from_u8(31), None);
        assert_eq!(IecMultiplier::Mebi.power_of_two(), 20);
        assert_eq!(IecMultiplier::Yobi.power_of_two(), 80);
    }

    #[test]
    fn serde_names_are_snake_case() {
        let unit: Unit = serde_json::from_str("\"degree_celsius\"").unwrap();
        assert_eq!(unit, Unit::DegreeCelsius);
        let scale: Scale = serde_json::from_str("{\"iec\":\"gibi\"}").unwrap();
        assert_eq!(scale, Scale::Iec(IecMultiplier::Gibi));
        let data_type: DataType = serde_json::from_str("\"rgb_triplet\"").unwrap();
        assert_eq!(data_type, DataType::RgbTriplet);
    }

    #[test]
    fn access_mode_permissions() {
        assert!(AccessMode::ReadOnly.is_readable());
        assert!(!AccessMode::ReadOnly.is_writable());
        assert!(!AccessMode::WriteOnly.is_readable());
        assert!(AccessMode::ReadWrite.is_writable());
    }
}
