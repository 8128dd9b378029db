//! Built-in lighting device served when no manifest is given.

use iotdcp_catalog::{
    AccessMode, Catalog, DataType, EnumEntry, Interface, InterfaceType, Property, Unit,
};
use iotdcp_device::{Call, DeviceLogic, DeviceSettings, Manifest, Reply, Responder};
use iotdcp_frame::ResponseCode;
use uuid::Uuid;

pub const SAMPLE_PASSWORD: &str = "Password";

const CATEGORY_UUID: Uuid = Uuid::from_u128(0x7741_36a4_6fbc_49ee_b6c1_6abc_8eb8_2cb0);
const DEVICE_UUID: Uuid = Uuid::from_u128(0x7bd9_a6ed_689b_4022_94d2_547f_f177_b419);

const PROP_STATE: u8 = 0;
const PROP_COLOR: u8 = 1;
const PROP_SAMPLE_ENUM: u8 = 2;

const COMMAND_OFF: u8 = 0;
const COMMAND_ON: u8 = 1;

// OnOff interface states; 0 is unknown
const STATE_OFF: u8 = 1;
const STATE_ON: u8 = 2;

pub const SAMPLE_ENUM: [EnumEntry<i16>; 4] = [
    EnumEntry::new("Value 0", 0),
    EnumEntry::new("Value 1", 1),
    EnumEntry::new("Value 2", 2),
    EnumEntry::new("Value 255", 255),
];

pub fn catalog() -> Catalog {
    Catalog {
        name: "Sample Device".to_string(),
        category_uuid: CATEGORY_UUID,
        device_uuid: DEVICE_UUID,
        interfaces: vec![Interface::new("Sample Interface", InterfaceType::OnOff)
            .with_property(
                Property::new("State", AccessMode::ReadOnly, DataType::U8).with_unit(Unit::Enum),
            )
            .with_property(
                Property::new("Color", AccessMode::ReadWrite, DataType::U8)
                    .with_elements(3)
                    .with_unit(Unit::Rgb),
            )
            .with_property(
                Property::new("Sample Enum", AccessMode::ReadWrite, DataType::S16)
                    .with_unit(Unit::Enum),
            )],
    }
}

pub fn settings() -> DeviceSettings {
    DeviceSettings {
        password: Some(SAMPLE_PASSWORD.to_string()),
        password_read_only: true,
        ..DeviceSettings::default()
    }
}

pub fn manifest() -> Manifest {
    Manifest {
        settings: settings(),
        catalog: catalog(),
    }
}

/// A lamp that can be switched and coloured. Starts switched off.
#[derive(Debug)]
pub struct SampleLamp {
    state: u8,
    color: [u8; 3],
    sample_enum: i16,
}

impl Default for SampleLamp {
    fn default() -> Self {
        Self {
            state: STATE_OFF,
            color: [0; 3],
            sample_enum: 0,
        }
    }
}

impl SampleLamp {
    pub fn is_on(&self) -> bool {
        self.state == STATE_ON
    }

    pub fn color(&self) -> [u8; 3] {
        self.color
    }
}

impl DeviceLogic for SampleLamp {
    fn execute(&mut self, call: &Call<'_>, reply: Responder<'_>) -> Reply {
        let state = match call.index {
            COMMAND_OFF => STATE_OFF,
            COMMAND_ON => STATE_ON,
            _ => return reply.error(ResponseCode::InvalidInterfaceCommand),
        };
        if !call.duplicate {
            self.state = state;
            tracing::info!(on = self.is_on(), "lamp switched");
        }
        reply.ok_u8(self.state)
    }

    fn get_property(&mut self, call: &Call<'_>, reply: Responder<'_>) -> Reply {
        match call.index {
            PROP_STATE => reply.ok_u8(self.state),
            PROP_COLOR => reply.ok_rgb(self.color),
            PROP_SAMPLE_ENUM => reply.ok_i16(self.sample_enum),
            _ => reply.error(ResponseCode::InvalidInterfaceProperty),
        }
    }

    fn set_property(&mut self, call: &Call<'_>, reply: Responder<'_>) -> Reply {
        match call.index {
            PROP_COLOR => {
                let Ok(color) = <[u8; 3]>::try_from(call.payload) else {
                    return reply.error(ResponseCode::InvalidInterfacePropertyValue);
                };
                self.color = color;
                reply.ok_rgb(self.color)
            }
            PROP_SAMPLE_ENUM => {
                let value = <[u8; 2]>::try_from(call.payload)
                    .ok()
                    .map(i16::from_le_bytes)
                    .filter(|value| SAMPLE_ENUM.iter().any(|entry| entry.value == *value));
                let Some(value) = value else {
                    return reply.error(ResponseCode::InvalidInterfacePropertyValue);
                };
                self.sample_enum = value;
                reply.ok_i16(self.sample_enum)
            }
            _ => reply.error(ResponseCode::InvalidInterfaceProperty),
        }
    }

    fn describe_enum(&mut self, call: &Call<'_>, reply: Responder<'_>) -> Reply {
        // the state enum is implied by the interface type
        match call.index {
            PROP_SAMPLE_ENUM => reply.ok_enum(call, &SAMPLE_ENUM),
            _ => reply.error(ResponseCode::InvalidInterfaceProperty),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use iotdcp_device::Device;
    use iotdcp_frame::{
        decode_response, encode_request, DeviceInfo, MessageType, Profile, RequestSpec,
        ResponseFrame,
    };

    use super::*;

    fn lamp() -> Device<SampleLamp> {
        let manifest = manifest();
        Device::new(manifest.settings, manifest.catalog, SampleLamp::default()).unwrap()
    }

    fn send(device: &mut Device<SampleLamp>, spec: RequestSpec<'_>) -> Option<ResponseFrame> {
        let wire = encode_request(Profile::Escaped, &spec).unwrap();
        let endpoint = SocketAddr::from(([127, 0, 0, 1], 40123));
        device
            .handle_datagram(endpoint, &wire)
            .first()
            .map(|frame| decode_response(Profile::Escaped, frame).unwrap())
    }

    fn session(device: &mut Device<SampleLamp>) -> u8 {
        let spec = RequestSpec {
            password: SAMPLE_PASSWORD.as_bytes(),
            ..RequestSpec::system(Profile::Escaped, MessageType::Handshake, &[])
        };
        send(device, spec).unwrap().payload[0]
    }

    #[test]
    fn catalog_and_manifest_are_valid() {
        manifest().validate().unwrap();
        let json = serde_json::to_string(&manifest()).unwrap();
        let parsed = Manifest::from_json(&json).unwrap();
        assert_eq!(parsed.catalog, catalog());
        assert_eq!(
            CATEGORY_UUID.to_string(),
            "774136a4-6fbc-49ee-b6c1-6abc8eb82cb0"
        );
    }

    #[test]
    fn query_device_reports_sample() {
        let mut device = lamp();
        let spec = RequestSpec::system(Profile::Escaped, MessageType::QueryDevice, &[]);
        let response = send(&mut device, spec).unwrap();
        let info = DeviceInfo::parse(&response.payload).unwrap();
        assert_eq!(info.name, "Sample Device");
        assert_eq!(info.device_uuid, DEVICE_UUID);
        assert_eq!(info.interface_types, vec![InterfaceType::OnOff]);
        assert_eq!(info.flags.names(), vec!["password-protected", "password-read-only"]);
    }

    #[test]
    fn switches_on_and_off() {
        let mut device = lamp();
        let id = session(&mut device);
        let pw = SAMPLE_PASSWORD.as_bytes();

        let get = RequestSpec::session(MessageType::GetProperty, id, 0, pw, &[0, PROP_STATE]);
        assert_eq!(send(&mut device, get).unwrap().payload.as_ref(), &[1]);
        assert!(!device.logic().is_on());

        let on = RequestSpec::session(MessageType::Execute, id, 4, pw, &[0, COMMAND_ON]);
        let response = send(&mut device, on).unwrap();
        assert_eq!(response.code, ResponseCode::Ok);
        assert_eq!(response.payload.as_ref(), &[2]);
        assert!(device.logic().is_on());

        let off = RequestSpec::session(MessageType::Execute, id, 8, pw, &[0, COMMAND_OFF]);
        assert_eq!(send(&mut device, off).unwrap().payload.as_ref(), &[1]);

        let get = RequestSpec::session(MessageType::GetProperty, id, 12, pw, &[0, PROP_STATE]);
        assert_eq!(send(&mut device, get).unwrap().payload.as_ref(), &[1]);
    }

    #[test]
    fn rejects_unknown_enum_values() {
        let mut device = lamp();
        let id = session(&mut device);
        let pw = SAMPLE_PASSWORD.as_bytes();

        let set = RequestSpec::session(MessageType::SetProperty, id, 0, pw, &[0, 2, 255, 0]);
        let response = send(&mut device, set).unwrap();
        assert_eq!(response.code, ResponseCode::Ok);
        assert_eq!(response.payload.as_ref(), &[255, 0]);

        let set = RequestSpec::session(MessageType::SetProperty, id, 4, pw, &[0, 2, 3, 0]);
        let response = send(&mut device, set).unwrap();
        assert_eq!(response.code, ResponseCode::InvalidInterfacePropertyValue);

        let get = RequestSpec::session(MessageType::GetProperty, id, 8, pw, &[0, 2]);
        assert_eq!(send(&mut device, get).unwrap().payload.as_ref(), &[255, 0]);
    }

    #[test]
    fn state_is_read_only_and_password_locked() {
        let mut device = lamp();
        let id = session(&mut device);
        let pw = SAMPLE_PASSWORD.as_bytes();
        let set = RequestSpec::session(MessageType::SetProperty, id, 0, pw, &[0, 0, 1]);
        let response = send(&mut device, set).unwrap();
        assert_eq!(response.code, ResponseCode::InterfacePropertyReadOnly);

        let change = RequestSpec::system(Profile::Escaped, MessageType::ChangePassword, b"x");
        let response = send(&mut device, change).unwrap();
        assert_eq!(response.code, ResponseCode::PasswordReadOnly);
    }

    #[test]
    fn color_round_trip() {
        let mut device = lamp();
        let id = session(&mut device);
        let pw = SAMPLE_PASSWORD.as_bytes();
        let set = RequestSpec::session(MessageType::SetProperty, id, 0, pw, &[0, 1, 0x55, 0x1B, 0x33]);
        let response = send(&mut device, set).unwrap();
        assert_eq!(response.payload.as_ref(), &[0x55, 0x1B, 0x33]);
        assert_eq!(device.logic().color(), [0x55, 0x1B, 0x33]);
    }
}
