//! Error types and result handling for hashguard.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for hashguard operations.
#[derive(Error, Debug)]
pub enum Error {
    // ===== I/O Errors =====
    #[error("Failed to read file: {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to access directory: {path}")]
    DirectoryAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ===== Configuration Errors =====
    #[error("Failed to load configuration: {0}")]
    ConfigLoad(String),

    #[error("Failed to save configuration: {0}")]
    ConfigSave(String),

    #[error("Invalid configuration value: {field} - {message}")]
    ConfigInvalid { field: String, message: String },

    // ===== Signature Database Errors =====
    #[error("Malformed signature in {path} at line {line}: {reason}")]
    MalformedSignature {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Signature loading was cancelled")]
    LoadCancelled,

    #[error("Signature database is not ready (state: {state})")]
    DatabaseNotReady { state: String },

    #[error("Signature database has already been loaded; create a new instance to reload")]
    DatabaseAlreadyLoaded,

    // ===== Scanning Errors =====
    #[error("Failed to scan file: {path} - {reason}")]
    ScanError { path: PathBuf, reason: String },

    #[error("Scan was cancelled")]
    ScanCancelled,

    // ===== Concurrency Errors =====
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },

    // ===== Serialization Errors =====
    #[error("JSON serialization error")]
    JsonSerialize(#[from] serde_json::Error),

    // ===== Generic Errors =====
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl Error {
    /// Create a file read error.
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Create a file write error.
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Create a malformed signature error for a 1-based line number.
    pub fn malformed(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedSignature {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error.
    pub fn config_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a scan error.
    pub fn scan_error(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ScanError {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a lock poisoned error.
    pub fn lock_poisoned(context: impl Into<String>) -> Self {
        Self::LockPoisoned {
            context: context.into(),
        }
    }

    /// Check if this error is recoverable (scan can continue with the next file).
    ///
    /// Everything raised while loading signatures is fatal: a partially loaded
    /// database would silently report infected files as clean.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::FileRead { .. } | Error::ScanError { .. })
    }

    /// Check if this error is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::LoadCancelled | Error::ScanCancelled)
    }

    /// Get a user-friendly suggestion for how to resolve this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigLoad(_) | Error::ConfigInvalid { .. } => {
                Some("Check your configuration file for syntax errors or invalid values")
            }
            Error::MalformedSignature { .. } => {
                Some("Fix or remove the offending signature file and run again")
            }
            Error::DatabaseNotReady { .. } => {
                Some("Load the signature database successfully before scanning")
            }
            Error::DatabaseAlreadyLoaded => {
                Some("Create a new signature database instance to reload signatures")
            }
            Error::LockPoisoned { .. } => Some("Internal error: restart the application"),
            Error::LoadCancelled | Error::ScanCancelled => {
                Some("The operation was interrupted by user request")
            }
            _ => None,
        }
    }

    /// Get the error category for logging.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::FileRead { .. }
            | Error::FileWrite { .. }
            | Error::DirectoryAccess { .. }
            | Error::Io(_) => ErrorCategory::Io,

            Error::ConfigLoad(_) | Error::ConfigSave(_) | Error::ConfigInvalid { .. } => {
                ErrorCategory::Configuration
            }

            Error::MalformedSignature { .. }
            | Error::LoadCancelled
            | Error::DatabaseNotReady { .. }
            | Error::DatabaseAlreadyLoaded => ErrorCategory::Database,

            Error::ScanError { .. } | Error::ScanCancelled => ErrorCategory::Scanning,

            Error::LockPoisoned { .. } => ErrorCategory::Concurrency,

            Error::JsonSerialize(_) => ErrorCategory::Serialization,
        }
    }
}

/// Error category for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Io,
    Configuration,
    Database,
    Scanning,
    Concurrency,
    Serialization,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io => write!(f, "I/O"),
            Self::Configuration => write!(f, "Configuration"),
            Self::Database => write!(f, "Database"),
            Self::Scanning => write!(f, "Scanning"),
            Self::Concurrency => write!(f, "Concurrency"),
            Self::Serialization => write!(f, "Serialization"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config_invalid("database.path", "/sigs does not exist");
        assert_eq!(
            err.to_string(),
            "Invalid configuration value: database.path - /sigs does not exist"
        );
    }

    #[test]
    fn test_malformed_display() {
        let err = Error::malformed("/sigs/main.hdb", 7, "expected at least 3 fields, found 1");
        assert_eq!(
            err.to_string(),
            "Malformed signature in /sigs/main.hdb at line 7: expected at least 3 fields, found 1"
        );
        assert_eq!(err.category(), ErrorCategory::Database);
    }

    #[test]
    fn test_recoverable_errors() {
        let err = Error::scan_error("/test", "test reason");
        assert!(err.is_recoverable());

        let err = Error::malformed("/sigs/a.csv", 1, "bad size");
        assert!(!err.is_recoverable());

        let err = Error::LoadCancelled;
        assert!(!err.is_recoverable());
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_scan_cancelled() {
        let err = Error::ScanCancelled;
        assert!(err.is_cancelled());
        assert!(!err.is_recoverable());
        assert_eq!(err.category(), ErrorCategory::Scanning);
        assert_eq!(err.to_string(), "Scan was cancelled");
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn test_suggestions() {
        assert!(Error::DatabaseAlreadyLoaded.suggestion().is_some());
        assert!(Error::Io("boom".to_string()).suggestion().is_none());
    }
}
