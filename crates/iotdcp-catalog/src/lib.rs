//! Device catalog model for IoTDCP.
//!
//! A catalog describes what a device exposes: its name, identity UUIDs and an
//! ordered list of interfaces, each with typed properties. Catalogs can be
//! built in code or loaded from JSON and are validated against the protocol's
//! unit and data-type rules before use.

pub mod catalog;
pub mod config;
pub mod error;
pub mod units;
mod validator;

pub use catalog::{
    uuid_from_wire, uuid_wire_bytes, Catalog, EnumEntry, EnumValue, Interface, Property,
    DEFAULT_DEVICE_NAME,
};
pub use config::CatalogLimits;
pub use error::{CatalogError, Result};
pub use units::{AccessMode, DataType, IecMultiplier, InterfaceType, Scale, Unit};
