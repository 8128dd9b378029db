//! Catalog payloads: QueryDevice, DescribeInterface and DescribeEnum.
//!
//! Writers serialize a [`Catalog`] into a [`ResponseWriter`]; parsers turn a
//! decoded response payload back into plain data for controllers.

use iotdcp_catalog::{
    uuid_from_wire, AccessMode, Catalog, DataType, EnumEntry, EnumValue, Interface,
    InterfaceType, Property, Scale, Unit,
};
use uuid::Uuid;

use crate::encoder::ResponseWriter;
use crate::error::{FrameError, Result};
use crate::message::CapabilityFlags;

/// QueryDevice payload: flags, category UUID, device UUID, interface count,
/// one type byte per interface, name length, name.
pub fn write_query_device(
    writer: &mut ResponseWriter,
    catalog: &Catalog,
    flags: CapabilityFlags,
) -> Result<()> {
    writer.put_u8(flags.bits())?;
    writer.put_slice(&catalog.category_uuid_bytes())?;
    writer.put_slice(&catalog.device_uuid_bytes())?;
    writer.put_u8(catalog.interface_count())?;
    for interface in &catalog.interfaces {
        writer.put_u8(interface.kind.as_u8())?;
    }
    writer.put_name(catalog.display_name())
}

/// DescribeInterface payload: index, name, type, property count, then per
/// property its name and six descriptor bytes.
pub fn write_interface(writer: &mut ResponseWriter, index: u8, interface: &Interface) -> Result<()> {
    let count = u8::try_from(interface.properties.len()).map_err(|_| {
        FrameError::InvalidDescriptor(format!("too many properties in {}", interface.name))
    })?;
    writer.put_u8(index)?;
    writer.put_name(&interface.name)?;
    writer.put_u8(interface.kind.as_u8())?;
    writer.put_u8(count)?;
    for property in &interface.properties {
        writer.put_name(&property.name)?;
        writer.put_slice(&property.descriptor_bytes())?;
    }
    Ok(())
}

/// DescribeEnum payload: interface index, property index, entry count, then
/// per entry its name and `V::WIDTH` value bytes.
pub fn write_enum<V: EnumValue>(
    writer: &mut ResponseWriter,
    interface: u8,
    property: u8,
    entries: &[EnumEntry<V>],
) -> Result<()> {
    let count = u8::try_from(entries.len())
        .map_err(|_| FrameError::InvalidDescriptor("too many enum entries".to_string()))?;
    writer.put_u8(interface)?;
    writer.put_u8(property)?;
    writer.put_u8(count)?;
    for entry in entries {
        writer.put_name(&entry.name)?;
        let bytes = entry.value.bits().to_le_bytes();
        writer.put_slice(&bytes[..V::WIDTH])?;
    }
    Ok(())
}

/// Parsed QueryDevice payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub flags: CapabilityFlags,
    pub category_uuid: Uuid,
    pub device_uuid: Uuid,
    pub interface_types: Vec<InterfaceType>,
    pub name: String,
}

impl DeviceInfo {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(payload);
        let flags = CapabilityFlags::from_bits(cursor.u8("flags")?);
        let category_uuid = cursor.uuid("category uuid")?;
        let device_uuid = cursor.uuid("device uuid")?;
        let count = cursor.u8("interface count")?;
        let interface_types = cursor
            .take(count as usize, "interface types")?
            .iter()
            .map(|&tag| {
                InterfaceType::from_u8(tag).ok_or_else(|| {
                    FrameError::InvalidDescriptor(format!("unknown interface type {tag:#04x}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let name = cursor.name("device name")?;
        cursor.finish()?;
        Ok(Self {
            flags,
            category_uuid,
            device_uuid,
            interface_types,
            name,
        })
    }
}

/// Parsed DescribeInterface payload.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceInfo {
    pub index: u8,
    pub interface: Interface,
}

impl InterfaceInfo {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(payload);
        let index = cursor.u8("interface index")?;
        let name = cursor.name("interface name")?;
        let tag = cursor.u8("interface type")?;
        let kind = InterfaceType::from_u8(tag).ok_or_else(|| {
            FrameError::InvalidDescriptor(format!("unknown interface type {tag:#04x}"))
        })?;
        let count = cursor.u8("property count")?;
        let mut properties = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name = cursor.name("property name")?;
            let descriptor = cursor.take(6, "property descriptor")?;
            properties.push(parse_property(name, descriptor)?);
        }
        cursor.finish()?;
        Ok(Self {
            index,
            interface: Interface {
                name,
                kind,
                properties,
            },
        })
    }
}

fn parse_property(name: String, descriptor: &[u8]) -> Result<Property> {
    let invalid = |what: &str, value: u8| {
        FrameError::InvalidDescriptor(format!("{name}: unknown {what} {value:#04x}"))
    };
    Ok(Property {
        mode: AccessMode::from_u8(descriptor[0]).ok_or_else(|| invalid("mode", descriptor[0]))?,
        data_type: DataType::from_u8(descriptor[1])
            .ok_or_else(|| invalid("data type", descriptor[1]))?,
        element_count: descriptor[2],
        unit: Unit::from_u8(descriptor[3]).ok_or_else(|| invalid("unit", descriptor[3]))?,
        unit_denominator: Unit::from_u8(descriptor[4])
            .ok_or_else(|| invalid("unit", descriptor[4]))?,
        scale: Scale::from_u8(descriptor[5]).ok_or_else(|| invalid("scale", descriptor[5]))?,
        name,
    })
}

/// Parsed DescribeEnum payload. Values are zero extended to 32 bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumInfo {
    pub interface: u8,
    pub property: u8,
    pub entries: Vec<(String, u32)>,
}

impl EnumInfo {
    /// `width` is the size in bytes of each value: 1, 2 or 4.
    pub fn parse(payload: &[u8], width: usize) -> Result<Self> {
        if !matches!(width, 1 | 2 | 4) {
            return Err(FrameError::InvalidDescriptor(format!(
                "enum width {width} not supported"
            )));
        }
        let mut cursor = Cursor::new(payload);
        let interface = cursor.u8("interface index")?;
        let property = cursor.u8("property index")?;
        let count = cursor.u8("entry count")?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name = cursor.name("entry name")?;
            let mut value = [0u8; 4];
            value[..width].copy_from_slice(cursor.take(width, "entry value")?);
            entries.push((name, u32::from_le_bytes(value)));
        }
        cursor.finish()?;
        Ok(Self {
            interface,
            property,
            entries,
        })
    }
}

struct Cursor<'a> {
    rest: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn new(src: &'a [u8]) -> Self {
        Self { rest: src }
    }

    fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8]> {
        if self.rest.len() < n {
            return Err(FrameError::Truncated(field));
        }
        let (head, tail) = self.rest.split_at(n);
        self.rest = tail;
        Ok(head)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8> {
        Ok(self.take(1, field)?[0])
    }

    fn uuid(&mut self, field: &'static str) -> Result<Uuid> {
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(self.take(16, field)?);
        Ok(uuid_from_wire(bytes))
    }

    fn name(&mut self, field: &'static str) -> Result<String> {
        let len = self.u8(field)? as usize;
        let bytes = self.take(len, field)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| FrameError::InvalidDescriptor(format!("{field} is not UTF-8")))
    }

    fn finish(&self) -> Result<()> {
        if self.rest.is_empty() {
            Ok(())
        } else {
            Err(FrameError::InvalidDescriptor(format!(
                "{} trailing bytes",
                self.rest.len()
            )))
        }
    }
}
