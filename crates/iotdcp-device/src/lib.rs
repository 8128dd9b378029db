//! IoTDCP device engine.
//!
//! A [`Device`] owns everything one protocol instance needs: the capability
//! catalog, the session table, the frame decoder and a reusable response
//! buffer. Bytes go in through [`Device::process`] or
//! [`Device::handle_datagram`]; complete response frames come out. Requests
//! that only device-specific code can answer are handed to a
//! [`DeviceLogic`] implementation after every protocol-level check passed.

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod server;
pub mod session;

pub use config::{DeviceSettings, Manifest};
pub use dispatch::{Call, DeviceLogic, Reply, Responder};
pub use engine::{Device, Processed};
pub use error::{DeviceError, Result};
#[cfg(feature = "async")]
pub use server::serve_async;
pub use server::{serve, ServeStats, POLL_INTERVAL};
pub use session::{
    classify, Allocation, SequenceCheck, Session, SessionTable, DEFAULT_MAX_CLIENTS, MAX_CLIENTS,
};
