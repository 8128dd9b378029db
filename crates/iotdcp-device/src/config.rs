use std::fmt;
use std::io::Read;
use std::path::Path;

use iotdcp_catalog::Catalog;
use iotdcp_frame::{
    CapabilityFlags, DecoderConfig, Profile, DEFAULT_MAX_PASSWORD, DEFAULT_MAX_PAYLOAD,
    MAX_MAX_PASSWORD, MAX_MAX_PAYLOAD, MIN_MAX_PAYLOAD,
};
use serde::{Deserialize, Serialize};

use crate::error::{DeviceError, Result};
use crate::session::{DEFAULT_MAX_CLIENTS, MAX_CLIENTS};

/// Largest manifest file read from disk.
const MAX_MANIFEST_SIZE: u64 = 1024 * 1024;

/// Device behaviour fixed at startup.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceSettings {
    /// Framing profile. Default: escaped.
    pub profile: Profile,
    /// Session table size. Default: 8, at most 128.
    pub max_clients: usize,
    /// Maximum payload length in wire bytes. Default: 512, range 64..=4096.
    pub max_payload: usize,
    /// Maximum password length in bytes. Default: 32, range 1..=32.
    pub max_password: usize,
    /// Initial password. `None` means an empty password.
    pub password: Option<String>,
    /// The device has no password at all; it can never be changed.
    pub no_password: bool,
    /// The password cannot be changed over the wire.
    pub password_read_only: bool,
    /// Reset messages are forwarded to the device logic.
    pub reset_supported: bool,
    /// Advertised only; the protocol does not encrypt.
    pub encryption_required: bool,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            profile: Profile::Escaped,
            max_clients: DEFAULT_MAX_CLIENTS,
            max_payload: DEFAULT_MAX_PAYLOAD,
            max_password: DEFAULT_MAX_PASSWORD,
            password: None,
            no_password: false,
            password_read_only: false,
            reset_supported: false,
            encryption_required: false,
        }
    }
}

impl fmt::Debug for DeviceSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSettings")
            .field("profile", &self.profile)
            .field("max_clients", &self.max_clients)
            .field("max_payload", &self.max_payload)
            .field("max_password", &self.max_password)
            .field(
                "password",
                &self
                    .password
                    .as_ref()
                    .map(|password| format!("<redacted:{} bytes>", password.len())),
            )
            .field("no_password", &self.no_password)
            .field("password_read_only", &self.password_read_only)
            .field("reset_supported", &self.reset_supported)
            .field("encryption_required", &self.encryption_required)
            .finish()
    }
}

impl DeviceSettings {
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_CLIENTS).contains(&self.max_clients) {
            return Err(invalid(format!(
                "max_clients must be within 1..={MAX_CLIENTS}, got {}",
                self.max_clients
            )));
        }
        if !(MIN_MAX_PAYLOAD..=MAX_MAX_PAYLOAD).contains(&self.max_payload) {
            return Err(invalid(format!(
                "max_payload must be within {MIN_MAX_PAYLOAD}..={MAX_MAX_PAYLOAD}, got {}",
                self.max_payload
            )));
        }
        if !(1..=MAX_MAX_PASSWORD).contains(&self.max_password) {
            return Err(invalid(format!(
                "max_password must be within 1..={MAX_MAX_PASSWORD}, got {}",
                self.max_password
            )));
        }
        if self.max_payload < self.max_password * 2 {
            return Err(invalid(
                "max_payload must hold an escaped password (2 * max_password)".to_string(),
            ));
        }
        match &self.password {
            Some(_) if self.no_password => {
                return Err(invalid(
                    "password cannot be set when no_password is enabled".to_string(),
                ))
            }
            Some(password) if password.len() > self.max_password => {
                return Err(invalid(format!(
                    "password is {} bytes, max_password is {}",
                    password.len(),
                    self.max_password
                )))
            }
            _ => {}
        }
        Ok(())
    }

    /// The password can never change over the wire.
    pub fn password_locked(&self) -> bool {
        self.no_password || self.password_read_only
    }

    /// Flags reported by QueryDevice.
    pub fn flags(&self) -> CapabilityFlags {
        let mut flags = CapabilityFlags::empty();
        flags.set(CapabilityFlags::PASSWORD_PROTECTED, !self.no_password);
        flags.set(CapabilityFlags::PASSWORD_READ_ONLY, self.password_locked());
        flags.set(CapabilityFlags::RESET_SUPPORTED, self.reset_supported);
        flags.set(CapabilityFlags::ENCRYPTION_REQUIRED, self.encryption_required);
        flags
    }

    pub fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig {
            profile: self.profile,
            max_payload: self.max_payload,
            max_password: self.max_password,
        }
    }

    pub fn initial_password(&self) -> Vec<u8> {
        self.password
            .as_deref()
            .map(|password| password.as_bytes().to_vec())
            .unwrap_or_default()
    }
}

/// Settings and catalog in one JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub settings: DeviceSettings,
    pub catalog: Catalog,
}

impl Manifest {
    pub fn from_json(json: &str) -> Result<Self> {
        let manifest: Self = serde_json::from_str(json)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Load and validate a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|err| {
            DeviceError::InvalidConfig(format!("cannot open {}: {err}", path.display()))
        })?;
        let mut content = String::new();
        file.take(MAX_MANIFEST_SIZE + 1)
            .read_to_string(&mut content)
            .map_err(|err| {
                DeviceError::InvalidConfig(format!("cannot read {}: {err}", path.display()))
            })?;
        if content.len() as u64 > MAX_MANIFEST_SIZE {
            return Err(invalid(format!(
                "manifest too large (max {MAX_MANIFEST_SIZE} bytes): {}",
                path.display()
            )));
        }
        let manifest = Self::from_json(&content)?;
        tracing::debug!(path = %path.display(), "manifest loaded");
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<()> {
        self.settings.validate()?;
        self.catalog.validate()?;
        Ok(())
    }
}

fn invalid(message: String) -> DeviceError {
    DeviceError::InvalidConfig(message)
}
