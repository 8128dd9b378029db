use std::borrow::Cow;
use std::fmt;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::CatalogLimits;
use crate::error::{CatalogError, Result};
use crate::units::{AccessMode, DataType, InterfaceType, Scale, Unit};
use crate::validator::{validate_name, validate_property};

/// Name reported when the device has none configured.
pub const DEFAULT_DEVICE_NAME: &str = "IoT";

/// Static description of everything a device exposes.
///
/// The catalog is immutable once the device starts; the engine only reads it
/// to answer QueryDevice and DescribeInterface and to range-check indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Device name (UTF-8).
    #[serde(default)]
    pub name: String,
    /// Shared by every device of the same product.
    pub category_uuid: Uuid,
    /// Unique to this device.
    pub device_uuid: Uuid,
    pub interfaces: Vec<Interface>,
}

/// One interface of the device, addressed by its position in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: InterfaceType,
    #[serde(default)]
    pub properties: Vec<Property>,
}

/// One typed property of an interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub mode: AccessMode,
    pub data_type: DataType,
    #[serde(default = "default_element_count")]
    pub element_count: u8,
    #[serde(default)]
    pub unit: Unit,
    #[serde(default)]
    pub unit_denominator: Unit,
    #[serde(default)]
    pub scale: Scale,
}

fn default_element_count() -> u8 {
    1
}

impl Property {
    /// Property with unit `One`, no denominator and no scale.
    pub fn new(name: impl Into<String>, mode: AccessMode, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            mode,
            data_type,
            element_count: 1,
            unit: Unit::One,
            unit_denominator: Unit::One,
            scale: Scale::default(),
        }
    }

    pub fn with_elements(mut self, element_count: u8) -> Self {
        self.element_count = element_count;
        self
    }

    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    pub fn with_denominator(mut self, unit: Unit) -> Self {
        self.unit_denominator = unit;
        self
    }

    pub fn with_scale(mut self, scale: Scale) -> Self {
        self.scale = scale;
        self
    }

    /// The six descriptor bytes that follow the name in DescribeInterface:
    /// mode, data type, element count, unit, denominator, scale.
    pub fn descriptor_bytes(&self) -> [u8; 6] {
        [
            self.mode.as_u8(),
            self.data_type.as_u8(),
            self.element_count,
            self.unit.as_u8(),
            self.unit_denominator.as_u8(),
            self.scale.as_u8(),
        ]
    }

    pub fn is_enum(&self) -> bool {
        self.unit == Unit::Enum
    }

    /// Bytes occupied by a full value of this property.
    pub fn value_size(&self) -> usize {
        self.data_type.size() * self.element_count as usize
    }
}

impl Interface {
    pub fn new(name: impl Into<String>, kind: InterfaceType) -> Self {
        Self {
            name: name.into(),
            kind,
            properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn property(&self, index: u8) -> Option<&Property> {
        self.properties.get(index as usize)
    }
}

impl Catalog {
    /// Parse a catalog from JSON text and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let catalog: Self = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load and validate a catalog file.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_limits(path, CatalogLimits::default())
    }

    /// Load and validate a catalog file with explicit limits.
    pub fn load_with_limits(path: &Path, limits: CatalogLimits) -> Result<Self> {
        let content = read_limited(path, limits.max_file_size)?;
        let catalog: Self = serde_json::from_str(&content)?;
        catalog.validate_with(&limits)?;
        tracing::debug!(
            path = %path.display(),
            interfaces = catalog.interfaces.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    pub fn validate(&self) -> Result<()> {
        self.validate_with(&CatalogLimits::default())
    }

    pub fn validate_with(&self, limits: &CatalogLimits) -> Result<()> {
        let max_interfaces = limits.max_interfaces.min(crate::config::MAX_INTERFACES);
        if self.interfaces.is_empty() || self.interfaces.len() > max_interfaces {
            return Err(CatalogError::InterfaceCount {
                count: self.interfaces.len(),
                max: max_interfaces,
            });
        }

        validate_name(&self.name, limits.max_name_length)?;

        for (index, interface) in self.interfaces.iter().enumerate() {
            validate_name(&interface.name, limits.max_name_length)?;
            if interface.properties.len() > limits.max_properties {
                return Err(CatalogError::PropertyCount {
                    interface: index,
                    count: interface.properties.len(),
                    max: limits.max_properties,
                });
            }
            for (property_index, property) in interface.properties.iter().enumerate() {
                validate_name(&property.name, limits.max_name_length)?;
                validate_property(index, property_index, property)?;
            }
        }

        Ok(())
    }

    pub fn interface(&self, index: u8) -> Option<&Interface> {
        self.interfaces.get(index as usize)
    }

    pub fn property(&self, interface: u8, property: u8) -> Option<&Property> {
        self.interface(interface)?.property(property)
    }

    pub fn interface_count(&self) -> u8 {
        self.interfaces.len().min(u8::MAX as usize) as u8
    }

    /// Name as reported on the wire.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            DEFAULT_DEVICE_NAME
        } else {
            &self.name
        }
    }

    /// Category UUID in wire order (least significant byte first).
    pub fn category_uuid_bytes(&self) -> [u8; 16] {
        uuid_wire_bytes(&self.category_uuid)
    }

    /// Device UUID in wire order (least significant byte first).
    pub fn device_uuid_bytes(&self) -> [u8; 16] {
        uuid_wire_bytes(&self.device_uuid)
    }
}

/// UUIDs travel least significant byte first.
pub fn uuid_wire_bytes(uuid: &Uuid) -> [u8; 16] {
    uuid.as_u128().to_le_bytes()
}

/// Inverse of [`uuid_wire_bytes`].
pub fn uuid_from_wire(bytes: [u8; 16]) -> Uuid {
    Uuid::from_u128(u128::from_le_bytes(bytes))
}

/// Integer types usable as enumeration values.
///
/// `WIDTH` is the number of little-endian bytes written per value.
pub trait EnumValue: Copy + fmt::Debug {
    const WIDTH: usize;

    /// Bit pattern of the value; only the low `WIDTH` bytes are meaningful.
    fn bits(self) -> u32;
}

macro_rules! impl_enum_value {
    ($($ty:ty => $width:expr, $unsigned:ty;)*) => {
        $(
            impl EnumValue for $ty {
                const WIDTH: usize = $width;

                fn bits(self) -> u32 {
                    self as $unsigned as u32
                }
            }
        )*
    };
}

impl_enum_value! {
    u8 => 1, u8;
    i8 => 1, u8;
    u16 => 2, u16;
    i16 => 2, u16;
    u32 => 4, u32;
    i32 => 4, u32;
}

/// One named value of an enumerated property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumEntry<V> {
    pub name: Cow<'static, str>,
    pub value: V,
}

impl<V: EnumValue> EnumEntry<V> {
    pub const fn new(name: &'static str, value: V) -> Self {
        Self {
            name: Cow::Borrowed(name),
            value,
        }
    }

    pub fn owned(name: impl Into<String>, value: V) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            value,
        }
    }

    /// Value bytes in wire order.
    pub fn value_bytes(&self) -> impl Iterator<Item = u8> {
        self.value
            .bits()
            .to_le_bytes()
            .into_iter()
            .take(V::WIDTH)
    }
}

fn read_limited(path: &Path, max_bytes: usize) -> Result<String> {
    let file = std::fs::File::open(path)
        .map_err(|err| CatalogError::LoadFailed(format!("{}: {err}", path.display())))?;
    let metadata = file
        .metadata()
        .map_err(|err| CatalogError::LoadFailed(err.to_string()))?;
    if metadata.len() > max_bytes as u64 {
        return Err(CatalogError::LoadFailed(format!(
            "catalog file too large ({} bytes): {}",
            metadata.len(),
            path.display()
        )));
    }

    let read_limit = u64::try_from(max_bytes.saturating_add(1)).unwrap_or(u64::MAX);
    let mut content = String::new();
    file.take(read_limit)
        .read_to_string(&mut content)
        .map_err(|err| {
            CatalogError::LoadFailed(format!("failed reading {}: {err}", path.display()))
        })?;
    if content.len() > max_bytes {
        return Err(CatalogError::LoadFailed(format!(
            "catalog file too large while reading: {}",
            path.display()
        )));
    }
    Ok(content)
}
