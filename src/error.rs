//! # Error Types
//!
//! Custom error types for Pad Mapper using `thiserror`.
//!
//! Missing calibration entries, missing profiles and unmapped inputs are
//! not errors: the tick loop logs them and keeps going. The variants here
//! cover startup, persistence and device I/O.

use thiserror::Error;

/// Main error type for Pad Mapper
#[derive(Debug, Error)]
pub enum MapperError {
    /// Configuration parsing or validation errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration could not be serialized back to TOML
    #[error("Configuration write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input recording serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Controller device errors
    #[error("Controller error: {0}")]
    Controller(String),

    /// No usable controller was found
    #[error("No game controller found under /dev/input")]
    ControllerNotFound,

    /// A mapping edit referred to an invalid input or action
    #[error("Invalid mapping: {0}")]
    InvalidMapping(String),

    /// A profile name did not match any configured profile
    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    /// Action executor errors
    #[error("Executor error: {0}")]
    Executor(String),
}

/// Result type alias for Pad Mapper
pub type Result<T> = std::result::Result<T, MapperError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MapperError::UnknownProfile("racing".to_string());
        assert_eq!(err.to_string(), "Unknown profile: racing");

        let err = MapperError::ControllerNotFound;
        assert!(err.to_string().contains("/dev/input"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: MapperError = io.into();
        assert!(matches!(err, MapperError::Io(_)));
    }
}
