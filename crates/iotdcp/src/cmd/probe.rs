use std::net::SocketAddr;
use std::time::{Duration, Instant};

use iotdcp_frame::{
    decode_response, encode_request, DeviceInfo, InterfaceInfo, MessageType, Profile,
    RequestSpec, ResponseFrame, DEFAULT_PORT,
};
use iotdcp_transport::{resolve, DatagramSocket, MAX_DATAGRAM};

use crate::cmd::{parse_timeout, ProbeArgs};
use crate::exit::{
    frame_error, refused, transport_error, CliError, CliResult, DATA_INVALID, SUCCESS,
    TIMEOUT,
};
use crate::output::{print_probe, InterfaceReport, OutputFormat, ProbeReport};

pub fn run(args: ProbeArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_timeout(&args.timeout)?;
    let profile = Profile::from(args.profile);
    let target =
        resolve(&args.target, DEFAULT_PORT).map_err(|err| transport_error("probe", err))?;

    let local = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let socket =
        DatagramSocket::bind(local).map_err(|err| transport_error("bind failed", err))?;
    let client = Client {
        socket,
        target,
        profile,
        timeout,
        retries: args.retries,
    };

    let response = client.request(MessageType::QueryDevice, &[])?;
    let info = DeviceInfo::parse(&response.payload)
        .map_err(|err| frame_error("malformed device description", err))?;
    tracing::debug!(name = %info.name, interfaces = info.interface_types.len(), "device found");

    let mut interfaces = Vec::with_capacity(info.interface_types.len());
    for index in 0..info.interface_types.len() {
        let index = u8::try_from(index)
            .map_err(|_| CliError::new(DATA_INVALID, "too many interfaces"))?;
        let response = client.request(MessageType::DescribeInterface, &[index])?;
        let described = InterfaceInfo::parse(&response.payload)
            .map_err(|err| frame_error("malformed interface description", err))?;
        interfaces.push(InterfaceReport {
            index: described.index,
            interface: described.interface,
        });
    }

    let report = ProbeReport {
        address: target,
        name: info.name,
        category_uuid: info.category_uuid.to_string(),
        device_uuid: info.device_uuid.to_string(),
        flags: info.flags.names(),
        interfaces,
    };
    print_probe(&report, format);
    Ok(SUCCESS)
}

struct Client {
    socket: DatagramSocket,
    target: SocketAddr,
    profile: Profile,
    timeout: Duration,
    retries: u32,
}

impl Client {
    /// Send a system message and wait for the matching OK response.
    fn request(&self, message: MessageType, payload: &[u8]) -> CliResult<ResponseFrame> {
        let spec = RequestSpec::system(self.profile, message, payload);
        let wire = encode_request(self.profile, &spec)
            .map_err(|err| frame_error("request encoding failed", err))?;

        for attempt in 0..=self.retries {
            if attempt > 0 {
                tracing::debug!(%message, attempt, "retrying");
            }
            self.socket
                .send_to(&wire, self.target)
                .map_err(|err| transport_error("send failed", err))?;
            if let Some(response) = self.await_response(&spec)? {
                if !response.code.is_ok() {
                    return Err(refused(message.name(), response.code));
                }
                return Ok(response);
            }
        }

        Err(CliError::new(
            TIMEOUT,
            format!("{message}: no response from {}", self.target),
        ))
    }

    fn await_response(&self, spec: &RequestSpec<'_>) -> CliResult<Option<ResponseFrame>> {
        let deadline = Instant::now() + self.timeout;
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            self.socket
                .set_read_timeout(Some(remaining))
                .map_err(|err| transport_error("receive failed", err))?;
            let Some((len, from)) = self
                .socket
                .recv_from(&mut buf)
                .map_err(|err| transport_error("receive failed", err))?
            else {
                return Ok(None);
            };
            if from != self.target {
                continue;
            }
            match decode_response(self.profile, &buf[..len]) {
                Ok(response)
                    if response.client_id == spec.client_id
                        && response.sequence == spec.sequence =>
                {
                    return Ok(Some(response));
                }
                Ok(response) => {
                    tracing::debug!(
                        client_id = response.client_id,
                        sequence = response.sequence,
                        "ignoring unrelated response"
                    );
                }
                Err(err) => tracing::warn!(error = %err, "ignoring malformed response"),
            }
        }
    }
}
