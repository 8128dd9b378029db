//! UDP datagram endpoint for IoTDCP.
//!
//! IoTDCP runs over an unreliable, packet-oriented transport. This crate
//! wraps a UDP socket with the options devices and controllers need
//! (broadcast, timeouts) and maps failures onto [`TransportError`]. The
//! protocol engine itself never depends on it.

pub mod error;
pub mod udp;

pub use error::{Result, TransportError};
pub use udp::{resolve, DatagramSocket, MAX_DATAGRAM};
