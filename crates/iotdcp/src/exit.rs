use std::fmt;
use std::io;

use iotdcp_device::DeviceError;
use iotdcp_frame::{FrameError, ResponseCode};
use iotdcp_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const TRANSPORT_ERROR: i32 = 3;
/// The device answered with a non-OK response code.
pub const DEVICE_REFUSED: i32 = 10;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const CONFIG_INVALID: i32 = 78;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::AddrInUse | io::ErrorKind::AddrNotAvailable => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. } | TransportError::Io(source) => {
            io_error(context, source)
        }
        TransportError::Resolve(_) => CliError::new(USAGE, format!("{context}: {err}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

pub fn device_error(context: &str, err: DeviceError) -> CliError {
    match err {
        DeviceError::Transport(err) => transport_error(context, err),
        DeviceError::Frame(err) => frame_error(context, err),
        DeviceError::Catalog(_) | DeviceError::Json(_) | DeviceError::InvalidConfig(_) => {
            CliError::new(CONFIG_INVALID, format!("{context}: {err}"))
        }
    }
}

pub fn refused(context: &str, code: ResponseCode) -> CliError {
    CliError::new(DEVICE_REFUSED, format!("{context}: device answered {code}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_timeouts() {
        let err = io_error("probe", io::Error::from(io::ErrorKind::TimedOut));
        assert_eq!(err.code, TIMEOUT);
        assert_eq!(err.to_string(), "probe: timed out");
    }

    #[test]
    fn maps_config_errors() {
        let err = device_error(
            "manifest",
            DeviceError::InvalidConfig("max_clients must be within 1..=128".to_string()),
        );
        assert_eq!(err.code, CONFIG_INVALID);
        assert!(err.message.starts_with("manifest: invalid configuration"));
    }

    #[test]
    fn maps_resolve_errors_to_usage() {
        let err = transport_error("probe", TransportError::Resolve("nowhere".to_string()));
        assert_eq!(err.code, USAGE);
    }
}
