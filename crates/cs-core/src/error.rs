//! Error types for the cs-core crate.
//!
//! This module provides the [`ConfigError`] type for configuration errors
//! that can occur across the workspace.

use camino::Utf8PathBuf;

/// Errors that can occur during configuration loading and validation.
///
/// # Examples
///
/// ```
/// use cs_core::ConfigError;
///
/// let error = ConfigError::invalid_option("server.port", "out of range");
/// assert!(error.to_string().contains("server.port"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The provided path is invalid or does not exist.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath {
        /// The invalid path.
        path: Utf8PathBuf,
        /// Explanation of why the path is invalid.
        reason: String,
    },

    /// A configuration option has an invalid value.
    #[error("invalid configuration option '{option}': {reason}")]
    InvalidOption {
        /// The name of the invalid option.
        option: String,
        /// Explanation of why the option is invalid.
        reason: String,
    },

    /// An I/O error occurred while reading configuration.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    /// Creates a new [`ConfigError::InvalidOption`] error.
    pub fn invalid_option(option: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            option: option.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_path_display() {
        let error = ConfigError::InvalidPath {
            path: Utf8PathBuf::from("/etc/codestream.json"),
            reason: "configuration file not found".to_owned(),
        };
        let msg = error.to_string();
        assert!(msg.contains("/etc/codestream.json"));
        assert!(msg.contains("not found"));
    }

    #[test]
    fn test_invalid_option_display() {
        let error = ConfigError::invalid_option("server.client_queue_capacity", "must be positive");
        let msg = error.to_string();
        assert!(msg.contains("client_queue_capacity"));
        assert!(msg.contains("must be positive"));
    }
}
