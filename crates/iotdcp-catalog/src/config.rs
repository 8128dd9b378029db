/// Bounds applied when loading and validating a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogLimits {
    /// Maximum number of interfaces. The protocol allows at most 128.
    pub max_interfaces: usize,
    /// Maximum number of properties per interface.
    pub max_properties: usize,
    /// Maximum length of any name in bytes.
    pub max_name_length: usize,
    /// Maximum bytes read from a catalog file.
    pub max_file_size: usize,
}

/// Protocol ceiling for the interface count.
pub const MAX_INTERFACES: usize = 128;

impl Default for CatalogLimits {
    fn default() -> Self {
        Self {
            max_interfaces: MAX_INTERFACES,
            max_properties: u8::MAX as usize,
            max_name_length: u8::MAX as usize,
            max_file_size: 256 * 1024,
        }
    }
}
