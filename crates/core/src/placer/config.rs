//! Configuration for the placer module.

use serde::{Deserialize, Serialize};

use super::types::ChecksumType;

/// Configuration for the file system placer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacerConfig {
    /// Buffer size for file copies in bytes.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Try a hardlink before copying.
    #[serde(default = "default_true")]
    pub prefer_hardlinks: bool,

    /// Algorithm used when a copy is verified.
    #[serde(default = "default_checksum")]
    pub checksum_type: ChecksumType,
}

fn default_buffer_size() -> usize {
    8 * 1024 * 1024 // 8 MB
}

fn default_true() -> bool {
    true
}

fn default_checksum() -> ChecksumType {
    ChecksumType::Sha256
}

impl Default for PlacerConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            prefer_hardlinks: true,
            checksum_type: default_checksum(),
        }
    }
}

impl PlacerConfig {
    pub fn with_hardlinks(mut self, enabled: bool) -> Self {
        self.prefer_hardlinks = enabled;
        self
    }

    /// Sets the buffer size for copies.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    pub fn with_checksum_type(mut self, checksum_type: ChecksumType) -> Self {
        self.checksum_type = checksum_type;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlacerConfig::default();
        assert_eq!(config.buffer_size, 8 * 1024 * 1024);
        assert!(config.prefer_hardlinks);
        assert_eq!(config.checksum_type, ChecksumType::Sha256);
    }

    #[test]
    fn test_config_builder() {
        let config = PlacerConfig::default()
            .with_hardlinks(false)
            .with_checksum_type(ChecksumType::Md5)
            .with_buffer_size(0);

        assert!(!config.prefer_hardlinks);
        assert_eq!(config.checksum_type, ChecksumType::Md5);
        assert_eq!(config.buffer_size, 1);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: PlacerConfig = toml::from_str("checksum_type = \"md5\"").unwrap();
        assert_eq!(config.checksum_type, ChecksumType::Md5);
        assert!(config.prefer_hardlinks);
    }
}
