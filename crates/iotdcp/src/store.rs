//! Device logic for manifest-described devices: property values live in memory.

use iotdcp_catalog::{Catalog, Property, Unit};
use iotdcp_device::{Call, DeviceLogic, Reply, Responder};
use iotdcp_frame::ResponseCode;

/// Stores every property value as raw little-endian bytes, zero initialised.
///
/// Commands are acknowledged without side effects.
#[derive(Debug, Clone)]
pub struct MemoryLogic {
    values: Vec<Vec<Vec<u8>>>,
}

impl MemoryLogic {
    pub fn new(catalog: &Catalog) -> Self {
        let values = catalog
            .interfaces
            .iter()
            .map(|interface| {
                interface
                    .properties
                    .iter()
                    .map(|property| vec![0u8; initial_len(property)])
                    .collect()
            })
            .collect();
        Self { values }
    }

    pub fn value(&self, interface: u8, property: u8) -> Option<&[u8]> {
        self.values
            .get(interface as usize)?
            .get(property as usize)
            .map(Vec::as_slice)
    }

    fn slot(&mut self, call: &Call<'_>) -> Option<&mut Vec<u8>> {
        self.values
            .get_mut(call.interface as usize)?
            .get_mut(call.index as usize)
    }
}

fn initial_len(property: &Property) -> usize {
    match property.unit {
        Unit::Utf8Text => 0,
        _ => property.value_size(),
    }
}

fn accepts(property: &Property, value: &[u8]) -> bool {
    match property.unit {
        Unit::Utf8Text => value.len() <= property.value_size() && std::str::from_utf8(value).is_ok(),
        Unit::Bool => matches!(value, [0] | [1]),
        _ => value.len() == property.value_size(),
    }
}

impl DeviceLogic for MemoryLogic {
    fn execute(&mut self, call: &Call<'_>, reply: Responder<'_>) -> Reply {
        if !call.duplicate {
            tracing::info!(interface = call.interface, command = call.index, "command executed");
        }
        reply.ok()
    }

    fn get_property(&mut self, call: &Call<'_>, reply: Responder<'_>) -> Reply {
        match self.slot(call) {
            Some(value) => reply.ok_bytes(value),
            None => reply.error(ResponseCode::InvalidInterfaceProperty),
        }
    }

    fn set_property(&mut self, call: &Call<'_>, reply: Responder<'_>) -> Reply {
        let Some(property) = call.property else {
            return reply.error(ResponseCode::InvalidInterfaceProperty);
        };
        if !accepts(property, call.payload) {
            return reply.error(ResponseCode::InvalidInterfacePropertyValue);
        }
        match self.slot(call) {
            Some(value) => {
                value.clear();
                value.extend_from_slice(call.payload);
                reply.ok()
            }
            None => reply.error(ResponseCode::InvalidInterfaceProperty),
        }
    }
}
