//! IoT device control protocol.
//!
//! A compact request/response protocol for controlling small devices over
//! UDP. Controllers discover a device's interfaces and properties, open a
//! session with a password and then execute commands and read or write
//! properties.
//!
//! # Crate Structure
//!
//! - [`catalog`]: Capability catalog of interfaces, properties and units
//! - [`frame`]: Wire codec, request decoder and response encoder
//! - [`transport`]: UDP datagram endpoint
//! - [`device`]: Session table, device engine and receive loops (behind `device` feature)

/// Re-export catalog types.
pub mod catalog {
    pub use iotdcp_catalog::*;
}

/// Re-export frame types.
pub mod frame {
    pub use iotdcp_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use iotdcp_transport::*;
}

/// Re-export device types (requires `device` feature).
#[cfg(feature = "device")]
pub mod device {
    pub use iotdcp_device::*;
}
