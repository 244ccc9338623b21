//! Error types for gosv-log.
//!
//! Event hooks never surface these to the host runtime; they are used by
//! construction, configuration loading and the file helpers, and are logged
//! and swallowed at the hook boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for gosv-log operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for gosv-log.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Log Directory Errors
    // ========================================================================
    /// The run log directory could not be created.
    #[error("Failed to create log directory '{path}': {source}")]
    LogDirCreate {
        /// Directory that was being created
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The "current" link could not be swapped.
    #[error("Failed to point '{link}' at '{target}': {source}")]
    LinkSwap {
        /// Path of the link
        link: PathBuf,
        /// Directory the link should point at
        target: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Copying the run directory into the archive directory failed.
    #[error("Failed to archive '{from}' into '{to}': {message}")]
    Archive {
        /// Source directory
        from: PathBuf,
        /// Destination directory
        to: PathBuf,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Input File Errors
    // ========================================================================
    /// The testing vars file does not exist.
    #[error("Testing vars file not found: {0}")]
    VarsFileNotFound(PathBuf),

    /// The OS release info file has an unexpected shape.
    #[error("Unexpected OS release info layout in '{path}': {message}")]
    OsReleaseLayout {
        /// Path to the JSON file
        path: PathBuf,
        /// What was wrong with it
        message: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid configuration value.
    #[error("Invalid configuration for '{key}': {message}")]
    InvalidConfig {
        /// Configuration key
        key: String,
        /// Error message
        message: String,
    },

    /// Unsupported configuration file format.
    #[error("Unsupported configuration file format: {0}")]
    ConfigFormat(PathBuf),

    // ========================================================================
    // Event Stream Errors
    // ========================================================================
    /// A recorded event line could not be decoded.
    #[error("Invalid event at line {line}: {message}")]
    EventDecode {
        /// 1-based line number in the event stream
        line: usize,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Wrapped Errors
    // ========================================================================
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl Error {
    /// Creates an archive error from any displayable cause.
    pub fn archive(
        from: impl Into<PathBuf>,
        to: impl Into<PathBuf>,
        message: impl std::fmt::Display,
    ) -> Self {
        Error::Archive {
            from: from.into(),
            to: to.into(),
            message: message.to_string(),
        }
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::LogDirCreate { .. } | Error::LinkSwap { .. } | Error::Archive { .. } => 2,
            Error::InvalidConfig { .. } | Error::ConfigFormat(_) | Error::TomlParse(_) => 3,
            Error::EventDecode { .. } => 4,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::VarsFileNotFound(PathBuf::from("/tmp/vars/test.yml"));
        assert_eq!(
            err.to_string(),
            "Testing vars file not found: /tmp/vars/test.yml"
        );

        let err = Error::EventDecode {
            line: 7,
            message: "missing field `task`".to_string(),
        };
        assert!(err.to_string().contains("line 7"));
    }

    #[test]
    fn test_exit_codes() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::LogDirCreate {
            path: PathBuf::from("/logs"),
            source: io,
        };
        assert_eq!(err.exit_code(), 2);
        assert_eq!(
            Error::ConfigFormat(PathBuf::from("x.ini")).exit_code(),
            3
        );
        assert_eq!(
            Error::EventDecode {
                line: 1,
                message: String::new()
            }
            .exit_code(),
            4
        );
    }
}
