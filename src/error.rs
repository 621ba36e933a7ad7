//! Structured error types for configuration resolution.

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Optional inputs
    ConfigNotFound,
    ProfileNotFound,

    // Malformed inputs
    ParseError,
    ValidationError,
    UnsafeCommand,

    // Structural failures of the hierarchy
    CircularReference,
    RecursionDepthExceeded,

    // Profile store conflicts
    ProfileExists,
    ReservedProfile,

    // Environment
    IoError,
    HomeDirUnavailable,
}

/// Errors raised while locating, loading, validating, or resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid value for {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("circular configuration reference: {} was already visited", path.display())]
    CircularReference { path: PathBuf },

    #[error("maximum configuration depth of {max} exceeded at {}", path.display())]
    RecursionDepthExceeded { max: usize, path: PathBuf },

    #[error("{operation} {}: {source}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "unsafe hook command {command:?}: contains shell metacharacter {metachar:?}; move the logic into a script file and invoke that instead"
    )]
    UnsafeCommand { command: String, metachar: String },

    #[error("profile not found: {name}")]
    ProfileNotFound { name: String },

    #[error("profile already exists: {name}")]
    ProfileExists { name: String },

    #[error("profile '{name}' is reserved and cannot be deleted")]
    ReservedProfile { name: String },

    #[error("cannot expand '{path}': home directory is unavailable")]
    HomeDirUnavailable { path: String },
}

impl ConfigError {
    /// Stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Self::Parse { .. } => ErrorCode::ParseError,
            Self::Validation { .. } => ErrorCode::ValidationError,
            Self::CircularReference { .. } => ErrorCode::CircularReference,
            Self::RecursionDepthExceeded { .. } => ErrorCode::RecursionDepthExceeded,
            Self::Io { .. } => ErrorCode::IoError,
            Self::UnsafeCommand { .. } => ErrorCode::UnsafeCommand,
            Self::ProfileNotFound { .. } => ErrorCode::ProfileNotFound,
            Self::ProfileExists { .. } => ErrorCode::ProfileExists,
            Self::ReservedProfile { .. } => ErrorCode::ReservedProfile,
            Self::HomeDirUnavailable { .. } => ErrorCode::HomeDirUnavailable,
        }
    }

    // Convenience constructors

    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn io(operation: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn parse(path: &Path, source: serde_yaml::Error) -> Self {
        Self::Parse {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn profile_not_found(name: &str) -> Self {
        Self::ProfileNotFound {
            name: name.to_string(),
        }
    }
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_variants() {
        let err = ConfigError::validation("provider", "must be one of github, gitlab, gitea");
        assert_eq!(err.code(), ErrorCode::ValidationError);

        let err = ConfigError::CircularReference {
            path: PathBuf::from("/a/.gz-git.yaml"),
        };
        assert_eq!(err.code(), ErrorCode::CircularReference);
    }

    #[test]
    fn test_error_code_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::RecursionDepthExceeded).unwrap();
        assert_eq!(json, "\"RECURSION_DEPTH_EXCEEDED\"");
    }

    #[test]
    fn test_display_includes_context() {
        let err = ConfigError::RecursionDepthExceeded {
            max: 10,
            path: PathBuf::from("/w/.gz-git.yaml"),
        };
        let msg = err.to_string();
        assert!(msg.contains("10"));
        assert!(msg.contains("/w/.gz-git.yaml"));

        let err = ConfigError::io(
            "reading",
            Path::new("/x/config.yaml"),
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(err.to_string().starts_with("reading /x/config.yaml"));
        assert_eq!(err.code(), ErrorCode::IoError);
    }
}
