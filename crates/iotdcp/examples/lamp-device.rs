//! Minimal lamp device: one on/off interface on the default port.
//!
//! Run with:
//!   cargo run --example lamp-device --features device
//!
//! In another terminal:
//!   cargo run --features cli -- probe 127.0.0.1

use std::sync::atomic::AtomicBool;

use iotdcp::catalog::{AccessMode, Catalog, DataType, Interface, InterfaceType, Property, Unit};
use iotdcp::device::{serve, Call, Device, DeviceLogic, DeviceSettings, Reply, Responder};
use iotdcp::frame::{ResponseCode, DEFAULT_PORT};
use iotdcp::transport::DatagramSocket;
use uuid::Uuid;

const STATE_OFF: u8 = 1;
const STATE_ON: u8 = 2;

struct Lamp {
    state: u8,
}

impl DeviceLogic for Lamp {
    fn execute(&mut self, call: &Call<'_>, reply: Responder<'_>) -> Reply {
        let state = match call.index {
            0 => STATE_OFF,
            1 => STATE_ON,
            _ => return reply.error(ResponseCode::InvalidInterfaceCommand),
        };
        if !call.duplicate && state != self.state {
            self.state = state;
            eprintln!("Lamp switched {}", if state == STATE_ON { "on" } else { "off" });
        }
        reply.ok_u8(self.state)
    }

    fn get_property(&mut self, _call: &Call<'_>, reply: Responder<'_>) -> Reply {
        reply.ok_u8(self.state)
    }

    fn set_property(&mut self, _call: &Call<'_>, reply: Responder<'_>) -> Reply {
        reply.error(ResponseCode::InterfacePropertyReadOnly)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let catalog = Catalog {
        name: "Example Lamp".to_string(),
        category_uuid: Uuid::from_u128(0x7741_36a4_6fbc_49ee_b6c1_6abc_8eb8_2cb0),
        device_uuid: Uuid::from_u128(0x0e2c_9b1a_5d34_4f7e_8a61_c0ff_ee15_a3d2),
        interfaces: vec![Interface::new("Lamp", InterfaceType::OnOff).with_property(
            Property::new("State", AccessMode::ReadOnly, DataType::U8).with_unit(Unit::Enum),
        )],
    };
    let settings = DeviceSettings {
        password: Some("Password".to_string()),
        ..DeviceSettings::default()
    };
    let mut device = Device::new(settings, catalog, Lamp { state: STATE_OFF })?;

    let socket = DatagramSocket::bind(format!("0.0.0.0:{DEFAULT_PORT}"))?;
    eprintln!("Listening on {}", socket.local_addr()?);

    // Runs until the process is killed.
    let shutdown = AtomicBool::new(false);
    let stats = serve(&mut device, &socket, &shutdown)?;
    eprintln!("Handled {} datagrams", stats.datagrams);
    Ok(())
}
