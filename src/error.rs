use std::path::PathBuf;
use thiserror::Error;

use crate::validation::ValidationReport;

/// The main error type for labelforge operations.
#[derive(Debug, Error)]
pub enum LabelforgeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog error: {0}")]
    Catalog(#[from] rusqlite::Error),

    #[error("Request rejected with {error_count} error(s) and {warning_count} warning(s)")]
    ValidationFailed {
        error_count: usize,
        warning_count: usize,
        report: ValidationReport,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Failed to parse request JSON from {path}: {source}")]
    RequestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Failed to read image header from {path}: {source}")]
    ImageProbe {
        path: PathBuf,
        #[source]
        source: imagesize::ImageError,
    },

    #[error("Failed to copy {from} to {to}: {source}")]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write label file {path}: {source}")]
    LabelWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove {path}: {source}")]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write manifest {path}: {message}")]
    ManifestWrite { path: PathBuf, message: String },

    #[error("Failed to parse manifest {path}: {source}")]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Inconsistent version state at {path}: {message}")]
    Inconsistent { path: PathBuf, message: String },

    #[error("Failed to render output: {0}")]
    Render(#[source] serde_json::Error),
}

/// Coarse classification of failures, used to pick a client or server response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed request fields.
    Validation,
    /// A referenced dataset, version, asset or job does not exist for the caller.
    NotFound,
    /// Filesystem copy, write or delete failure.
    Io,
    /// Relational store failure.
    Store,
    /// On-disk state cannot be reconciled with the catalog.
    Consistency,
}

impl LabelforgeError {
    /// Shorthand for a `NotFound` error.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for an `InvalidInput` error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ValidationFailed { .. }
            | Self::InvalidInput { .. }
            | Self::RequestParse { .. }
            | Self::ImageProbe { .. } => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Io(_)
            | Self::CopyFailed { .. }
            | Self::LabelWrite { .. }
            | Self::RemoveFailed { .. }
            | Self::ManifestWrite { .. }
            | Self::Render(_) => ErrorKind::Io,
            Self::Catalog(_) => ErrorKind::Store,
            Self::ManifestParse { .. } | Self::Inconsistent { .. } => ErrorKind::Consistency,
        }
    }

    /// Returns true when the caller is at fault (4xx-equivalent).
    pub fn is_client_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::Validation | ErrorKind::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_validation_and_not_found() {
        assert!(LabelforgeError::invalid("bad ratio").is_client_error());
        assert!(LabelforgeError::not_found("dataset", 7).is_client_error());

        let io = LabelforgeError::RemoveFailed {
            path: PathBuf::from("/tmp/x"),
            source: std::io::Error::other("busy"),
        };
        assert_eq!(io.kind(), ErrorKind::Io);
        assert!(!io.is_client_error());

        let drift = LabelforgeError::Inconsistent {
            path: PathBuf::from("/tmp/v1"),
            message: "missing image".to_string(),
        };
        assert_eq!(drift.kind(), ErrorKind::Consistency);
    }

    #[test]
    fn not_found_message_names_entity() {
        let err = LabelforgeError::not_found("asset", 42);
        assert_eq!(err.to_string(), "asset 42 not found");
    }
}
