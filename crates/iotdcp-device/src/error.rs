/// Errors that can occur while configuring or running a device.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] iotdcp_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] iotdcp_frame::FrameError),

    /// Catalog loading or validation error.
    #[error("catalog error: {0}")]
    Catalog(#[from] iotdcp_catalog::CatalogError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Settings out of range or contradictory.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, DeviceError>;
