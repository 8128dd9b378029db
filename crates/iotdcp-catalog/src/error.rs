/// Errors that can occur while loading or validating a capability catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("failed to load catalog: {0}")]
    LoadFailed(String),

    /// The catalog is not valid JSON or does not match the catalog shape.
    #[error("catalog is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The catalog declares no interfaces, or more than the protocol allows.
    #[error("interface count {count} out of range (1..={max})")]
    InterfaceCount { count: usize, max: usize },

    /// An interface declares more properties than fit in a count byte.
    #[error("interface {interface} declares {count} properties (max {max})")]
    PropertyCount {
        interface: usize,
        count: usize,
        max: usize,
    },

    /// A name is longer than its one-byte length prefix allows.
    #[error("name too long ({len} bytes, max {max}): {name}")]
    NameTooLong { name: String, len: usize, max: usize },

    /// A property descriptor violates the rules of its unit or data type.
    #[error("invalid property {interface}.{property}: {reason}")]
    InvalidProperty {
        interface: usize,
        property: usize,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, CatalogError>;
