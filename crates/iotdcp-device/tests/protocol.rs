use std::net::SocketAddr;

use iotdcp_catalog::{
    AccessMode, Catalog, DataType, EnumEntry, Interface, InterfaceType, Property, Unit,
};
use iotdcp_device::{Call, Device, DeviceLogic, DeviceSettings, Reply, Responder};
use iotdcp_frame::{
    decode_response, encode_request, DeviceInfo, EnumInfo, InterfaceInfo, MessageType, Profile,
    RequestSpec, ResponseCode, ResponseFrame,
};
use uuid::Uuid;

const PASSWORD: &[u8] = b"Password";

const MODES: [EnumEntry<i16>; 4] = [
    EnumEntry::new("Off", 0),
    EnumEntry::new("Low", 1),
    EnumEntry::new("High", 2),
    EnumEntry::new("Auto", 255),
];

/// Lamp with an on/off state, a colour and a mode enum.
#[derive(Default)]
struct Lamp {
    on: bool,
    color: [u8; 3],
    mode: i16,
    switches: u32,
}

impl DeviceLogic for Lamp {
    fn execute(&mut self, call: &Call<'_>, reply: Responder<'_>) -> Reply {
        if !call.duplicate {
            self.on = call.index == 1;
            self.switches += 1;
        }
        reply.ok_u8(self.on as u8)
    }

    fn get_property(&mut self, call: &Call<'_>, reply: Responder<'_>) -> Reply {
        match call.index {
            0 => reply.ok_u8(self.on as u8),
            1 => reply.ok_rgb(self.color),
            _ => reply.ok_i16(self.mode),
        }
    }

    fn set_property(&mut self, call: &Call<'_>, reply: Responder<'_>) -> Reply {
        match call.index {
            1 => match <[u8; 3]>::try_from(call.payload) {
                Ok(color) => {
                    self.color = color;
                    reply.ok()
                }
                Err(_) => reply.error(ResponseCode::InvalidInterfacePropertyValue),
            },
            _ => {
                let mode = <[u8; 2]>::try_from(call.payload)
                    .ok()
                    .map(i16::from_le_bytes)
                    .filter(|mode| MODES.iter().any(|entry| entry.value == *mode));
                match mode {
                    Some(mode) => {
                        self.mode = mode;
                        reply.ok()
                    }
                    None => reply.error(ResponseCode::InvalidInterfacePropertyValue),
                }
            }
        }
    }

    fn describe_enum(&mut self, call: &Call<'_>, reply: Responder<'_>) -> Reply {
        match call.index {
            2 => reply.ok_enum(call, &MODES),
            _ => reply.error(ResponseCode::InvalidInterfaceProperty),
        }
    }

    fn change_password(&mut self, new_password: &[u8]) -> ResponseCode {
        if new_password.is_empty() {
            ResponseCode::InvalidPayload
        } else {
            ResponseCode::Ok
        }
    }
}

fn catalog() -> Catalog {
    Catalog {
        name: "Lamp".to_string(),
        category_uuid: Uuid::parse_str("774136a4-6fbc-49ee-b6c1-6abc8eb82cb0").unwrap(),
        device_uuid: Uuid::parse_str("7bd9a6ed-689b-4022-94d2-547ff177b419").unwrap(),
        interfaces: vec![Interface::new("Lamp", InterfaceType::OnOff)
            .with_property(
                Property::new("State", AccessMode::ReadOnly, DataType::U8).with_unit(Unit::Bool),
            )
            .with_property(
                Property::new("Color", AccessMode::ReadWrite, DataType::U8)
                    .with_elements(3)
                    .with_unit(Unit::Rgb),
            )
            .with_property(
                Property::new("Mode", AccessMode::ReadWrite, DataType::S16).with_unit(Unit::Enum),
            )],
    }
}

struct Harness {
    device: Device<Lamp>,
    profile: Profile,
    endpoint: SocketAddr,
}

impl Harness {
    fn new(settings: DeviceSettings) -> Self {
        let profile = settings.profile;
        Self {
            device: Device::new(settings, catalog(), Lamp::default()).unwrap(),
            profile,
            endpoint: endpoint(50000),
        }
    }

    fn escaped() -> Self {
        Self::new(DeviceSettings {
            password: Some("Password".to_string()),
            max_clients: 2,
            ..DeviceSettings::default()
        })
    }

    fn at(mut self, endpoint: SocketAddr) -> Self {
        self.endpoint = endpoint;
        self
    }

    fn send(&mut self, spec: RequestSpec<'_>) -> Option<ResponseFrame> {
        let wire = encode_request(self.profile, &spec).unwrap();
        let mut responses = self.device.handle_datagram(self.endpoint, &wire);
        assert!(responses.len() <= 1, "one frame, at most one response");
        responses
            .pop()
            .map(|frame| decode_response(self.profile, &frame).unwrap())
    }

    fn system(&mut self, message: MessageType, payload: &[u8]) -> ResponseFrame {
        self.send(RequestSpec::system(self.profile, message, payload))
            .unwrap()
    }

    fn handshake(&mut self) -> u8 {
        let spec = RequestSpec {
            password: PASSWORD,
            ..RequestSpec::system(self.profile, MessageType::Handshake, &[])
        };
        let response = self.send(spec).unwrap();
        assert_eq!(response.code, ResponseCode::Ok);
        assert_eq!(response.payload.len(), 1);
        response.payload[0]
    }

    fn session(
        &mut self,
        message: MessageType,
        id: u8,
        sequence: u16,
        payload: &[u8],
    ) -> Option<ResponseFrame> {
        self.send(RequestSpec::session(message, id, sequence, PASSWORD, payload))
    }
}

fn endpoint(port: u16) -> SocketAddr {
    SocketAddr::from(([192, 168, 1, 20], port))
}

#[test]
fn query_device_reports_catalog() {
    let mut harness = Harness::escaped();
    let response = harness.system(MessageType::QueryDevice, &[]);
    assert_eq!(response.code, ResponseCode::Ok);

    let info = DeviceInfo::parse(&response.payload).unwrap();
    let catalog = catalog();
    assert_eq!(info.category_uuid, catalog.category_uuid);
    assert_eq!(info.device_uuid, catalog.device_uuid);
    assert_eq!(info.interface_types, vec![InterfaceType::OnOff]);
    assert_eq!(info.name, "Lamp");
    assert!(harness.device.sessions().is_empty());
}

#[test]
fn describe_interface_and_enum() {
    let mut harness = Harness::escaped();
    let response = harness.system(MessageType::DescribeInterface, &[0]);
    assert_eq!(response.code, ResponseCode::Ok);
    let info = InterfaceInfo::parse(&response.payload).unwrap();
    assert_eq!(info.interface, catalog().interfaces[0]);

    let response = harness.system(MessageType::DescribeInterface, &[1]);
    assert_eq!(response.code, ResponseCode::InvalidInterface);

    let response = harness.system(MessageType::DescribeEnum, &[0, 2]);
    assert_eq!(response.code, ResponseCode::Ok);
    let info = EnumInfo::parse(&response.payload, 2).unwrap();
    assert_eq!((info.interface, info.property), (0, 2));
    let values: Vec<u32> = info.entries.iter().map(|(_, value)| *value).collect();
    assert_eq!(values, vec![0, 1, 2, 255]);
    assert_eq!(info.entries[3].0, "Auto");

    let response = harness.system(MessageType::DescribeEnum, &[0, 1]);
    assert_eq!(response.code, ResponseCode::InvalidInterfaceProperty);
}

#[test]
fn handshake_reuses_slot_for_same_endpoint() {
    let mut harness = Harness::escaped();
    let first = harness.handshake();
    assert_eq!(first, 0);
    assert_eq!(harness.device.sessions().get(0).unwrap().id, first);

    let again = harness.handshake();
    assert_eq!(again, first);
    assert_eq!(harness.device.sessions().len(), 1);
}

#[test]
fn session_table_never_exceeds_capacity() {
    let mut harness = Harness::escaped();
    let mut issued = Vec::new();
    for port in 0..10 {
        harness.endpoint = endpoint(51000 + port);
        issued.push(harness.handshake());
        assert!(harness.device.sessions().len() <= 2);

        let live: Vec<u8> = harness.device.sessions().iter().map(|s| s.id).collect();
        assert_eq!(live.len(), 2.min(port as usize + 1));
        assert!(live.len() < 2 || live[0] != live[1]);
    }
    // oldest endpoint was evicted
    harness.endpoint = endpoint(51000);
    let response = harness.session(MessageType::Ping, issued[0], 0, &[]).unwrap();
    assert_eq!(response.code, ResponseCode::UnknownClient);
}

#[test]
fn invalid_enum_value_keeps_stored_value() {
    let mut harness = Harness::escaped();
    let id = harness.handshake();

    let mut payload = vec![0, 2];
    payload.extend_from_slice(&2i16.to_le_bytes());
    let response = harness.session(MessageType::SetProperty, id, 0, &payload).unwrap();
    assert_eq!(response.code, ResponseCode::Ok);

    let mut payload = vec![0, 2];
    payload.extend_from_slice(&3i16.to_le_bytes());
    let response = harness.session(MessageType::SetProperty, id, 4, &payload).unwrap();
    assert_eq!(response.code, ResponseCode::InvalidInterfacePropertyValue);
    assert!(response.payload.is_empty());
    assert_eq!(harness.device.logic().mode, 2);

    let response = harness.session(MessageType::GetProperty, id, 8, &[0, 2]).unwrap();
    assert_eq!(response.payload.as_ref(), &2i16.to_le_bytes());
}

#[test]
fn goodbye_then_unknown_client() {
    let mut harness = Harness::escaped();
    let id = harness.handshake();
    let response = harness.session(MessageType::GoodBye, id, 0, &[]).unwrap();
    assert_eq!(response.code, ResponseCode::Ok);

    let response = harness.session(MessageType::Ping, id, 4, &[]).unwrap();
    assert_eq!(response.code, ResponseCode::UnknownClient);
}

#[test]
fn session_is_bound_to_endpoint() {
    let mut harness = Harness::escaped();
    let id = harness.handshake();
    let mut harness = harness.at(endpoint(50001));
    let response = harness.session(MessageType::Ping, id, 0, &[]).unwrap();
    assert_eq!(response.code, ResponseCode::UnknownClient);
}

#[test]
fn password_must_match_exactly() {
    let mut harness = Harness::escaped();
    let id = harness.handshake();
    let baseline = harness.device.sessions().get(0).unwrap().sequence;

    for password in [&b"Passwor"[..], b"Password!", b"password", b""] {
        let response = harness
            .send(RequestSpec::session(MessageType::Ping, id, 4, password, &[]))
            .unwrap();
        assert_eq!(response.code, ResponseCode::WrongPassword, "{password:?}");
        assert_eq!(harness.device.sessions().get(0).unwrap().sequence, baseline);
    }
    let response = harness.session(MessageType::Ping, id, 4, &[]).unwrap();
    assert_eq!(response.code, ResponseCode::Ok);
}

#[test]
fn sequence_window_over_the_wire() {
    let mut harness = Harness::escaped();
    let id = harness.handshake();

    let response = harness.session(MessageType::Execute, id, 0x4000, &[0, 1]).unwrap();
    assert_eq!(response.payload.as_ref(), &[1]);

    // duplicate: same answer, no second switch
    let response = harness.session(MessageType::Execute, id, 0x4000, &[0, 1]).unwrap();
    assert_eq!(response.payload.as_ref(), &[1]);
    assert_eq!(harness.device.logic().switches, 1);

    // half a window behind: silently dropped
    assert!(harness.session(MessageType::Execute, id, 0xC000, &[0, 0]).is_none());
    assert!(harness.device.logic().on);

    // full forward window still accepted, wrapping past zero
    let response = harness.session(MessageType::Execute, id, 0xBFFC, &[0, 0]).unwrap();
    assert_eq!(response.code, ResponseCode::Ok);
    let response = harness.session(MessageType::Execute, id, 0x0000, &[0, 1]).unwrap();
    assert_eq!(response.code, ResponseCode::Ok);
    assert_eq!(harness.device.logic().switches, 3);
}

#[test]
fn marker_bytes_survive_escaping() {
    let mut harness = Harness::escaped();
    let id = harness.handshake();
    let colors = [[0x55, 0x1B, 0x33], [0x1B, 0x1B, 0x1B], [0x55, 0x55, 0x00]];
    for (round, color) in colors.into_iter().enumerate() {
        let sequence = 8 * round as u16;
        let mut payload = vec![0, 1];
        payload.extend_from_slice(&color);
        let response = harness
            .session(MessageType::SetProperty, id, sequence, &payload)
            .unwrap();
        assert_eq!(response.code, ResponseCode::Ok);
        assert_eq!(harness.device.logic().color, color);

        let response = harness
            .session(MessageType::GetProperty, id, sequence + 4, &[0, 1])
            .unwrap();
        assert_eq!(response.payload.as_ref(), &color);
    }
}

#[test]
fn change_password_replaces_stored_password() {
    let mut harness = Harness::escaped();
    let response = harness.system(MessageType::ChangePassword, b"Secret");
    assert_eq!(response.code, ResponseCode::Ok);

    let spec = RequestSpec {
        password: PASSWORD,
        ..RequestSpec::system(Profile::Escaped, MessageType::Handshake, &[])
    };
    let response = harness.send(spec).unwrap();
    assert_eq!(response.code, ResponseCode::WrongPassword);

    let spec = RequestSpec {
        password: b"Secret",
        ..RequestSpec::system(Profile::Escaped, MessageType::Handshake, &[])
    };
    assert_eq!(harness.send(spec).unwrap().code, ResponseCode::Ok);
}

#[test]
fn malformed_frames_are_dropped() {
    let mut harness = Harness::escaped();
    let endpoint = harness.endpoint;
    // undefined message type
    assert!(harness
        .device
        .handle_datagram(endpoint, &[0x55, 0xFF, 0xFE, 0xFE, 0x00, 0x16, 0x00, 0x00, 0x33])
        .is_empty());
    // query device with the wrong reserved id
    assert!(harness
        .device
        .handle_datagram(endpoint, &[0x55, 0xF7, 0xFE, 0xFE, 0x00, 0x00, 0x00, 0x00, 0x33])
        .is_empty());
    // no start marker at all
    assert!(harness.device.handle_datagram(endpoint, &[0x00, 0x33]).is_empty());
}

#[test]
fn missing_terminator_is_reported() {
    let mut harness = Harness::escaped();
    let spec = RequestSpec::system(Profile::Escaped, MessageType::QueryDevice, &[]);
    let mut wire = encode_request(Profile::Escaped, &spec).unwrap().to_vec();
    let last = wire.len() - 1;
    wire[last] = 0x00;
    let responses = harness.device.handle_datagram(harness.endpoint, &wire);
    assert_eq!(responses.len(), 1);
    let response = decode_response(Profile::Escaped, &responses[0]).unwrap();
    assert_eq!(response.code, ResponseCode::EndOfPacketNotFound);
}

#[test]
fn oversized_payload_is_refused() {
    let mut harness = Harness::new(DeviceSettings {
        password: Some("Password".to_string()),
        max_payload: 64,
        ..DeviceSettings::default()
    });
    let id = harness.handshake();
    let response = harness
        .session(MessageType::SetProperty, id, 4, &[0x55; 40])
        .unwrap();
    assert_eq!(response.code, ResponseCode::PayloadTooLarge);
}

#[test]
fn unescaped_profile_end_to_end() {
    let mut harness = Harness::new(DeviceSettings {
        profile: Profile::Unescaped,
        password: Some("Password".to_string()),
        ..DeviceSettings::default()
    });
    let response = harness.system(MessageType::QueryDevice, &[]);
    assert_eq!(response.code, ResponseCode::Ok);
    assert_eq!(response.message, Some(MessageType::QueryDevice.as_u8()));
    assert_eq!(response.sequence, 0xFFFF);

    let id = harness.handshake();
    // any sequence value is representable here
    let response = harness.session(MessageType::Execute, id, 1, &[0, 1]).unwrap();
    assert_eq!(response.code, ResponseCode::Ok);
    assert_eq!(response.sequence, 1);
    assert_eq!(response.payload.as_ref(), &[1]);

    let response = harness.session(MessageType::SetProperty, id, 2, &[0, 1, 0x55, 0x1B, 0x33]).unwrap();
    assert_eq!(response.code, ResponseCode::Ok);
    assert_eq!(harness.device.logic().color, [0x55, 0x1B, 0x33]);
}

#[test]
fn unescaped_stale_frame_gets_no_response() {
    let mut harness = Harness::new(DeviceSettings {
        profile: Profile::Unescaped,
        password: Some("pw".to_string()),
        ..DeviceSettings::default()
    });
    let spec = RequestSpec {
        password: b"pw",
        ..RequestSpec::system(Profile::Unescaped, MessageType::Handshake, &[])
    };
    let id = harness.send(spec).unwrap().payload[0];

    let spec = RequestSpec::session(MessageType::SetProperty, id, 8, b"pw", &[0, 1, 1, 2, 3]);
    assert_eq!(harness.send(spec).unwrap().code, ResponseCode::Ok);

    // replayed frame carrying a complete QueryDevice frame as its value
    let query = encode_request(
        Profile::Unescaped,
        &RequestSpec::system(Profile::Unescaped, MessageType::QueryDevice, &[]),
    )
    .unwrap();
    let mut payload = vec![0, 1];
    payload.extend_from_slice(&query);
    let spec = RequestSpec::session(MessageType::SetProperty, id, 4, b"pw", &payload);
    let wire = encode_request(Profile::Unescaped, &spec).unwrap();
    assert!(harness.device.handle_datagram(harness.endpoint, &wire).is_empty());
    assert_eq!(harness.device.logic().color, [1, 2, 3]);

    // same for a frame refused at its header
    let spec = RequestSpec::session(MessageType::SetProperty, id, 12, b"pw", &payload);
    let wire = encode_request(Profile::Unescaped, &spec).unwrap();
    let responses = harness.device.handle_datagram(endpoint(50001), &wire);
    assert_eq!(responses.len(), 1);
    let response = decode_response(Profile::Unescaped, &responses[0]).unwrap();
    assert_eq!(response.code, ResponseCode::UnknownClient);
}
