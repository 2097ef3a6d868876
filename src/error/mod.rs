//! # Error Module
//!
//! User-friendly error types for the image preprocessing pipeline.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - file names, formats, what went wrong
//! - **Classify everything** - every per-file error maps to an [`ErrorClass`]
//!   so the recovery policy can decide between retry, fallback and abort
//! - **Recovery hints** - see `core::recovery` for the user-facing messages

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Failure taxonomy shared by conversion and duplicate detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorClass {
    /// Resource exhaustion (decoded buffers too large, allocation refused)
    Memory,
    /// Format or codec not available in this runtime
    Compatibility,
    /// Malformed or undecodable input
    Corruption,
    /// Transient I/O on a remote or flaky source
    Network,
    /// An operation exceeded its time bound
    Timeout,
    /// Anything else
    Generic,
}

impl ErrorClass {
    /// Classify an I/O error by its kind.
    pub fn from_io(error: &io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::TimedOut
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe => ErrorClass::Network,
            io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => ErrorClass::Corruption,
            io::ErrorKind::OutOfMemory => ErrorClass::Memory,
            io::ErrorKind::Unsupported => ErrorClass::Compatibility,
            _ => ErrorClass::Generic,
        }
    }

    /// Whether a retry has any chance of succeeding
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorClass::Network)
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorClass::Memory => write!(f, "memory"),
            ErrorClass::Compatibility => write!(f, "compatibility"),
            ErrorClass::Corruption => write!(f, "corruption"),
            ErrorClass::Network => write!(f, "network"),
            ErrorClass::Timeout => write!(f, "timeout"),
            ErrorClass::Generic => write!(f, "generic"),
        }
    }
}

/// Anything the recovery policy can reason about
pub trait Classify {
    fn class(&self) -> ErrorClass;
}

/// Top-level application error
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Conversion error: {0}")]
    Convert(#[from] ConversionError),

    #[error("Duplicate detection error: {0}")]
    Detect(#[from] DetectError),

    #[error("Invalid settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("Failed to write output {path}: {source}")]
    Output {
        path: std::path::PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors reading the bytes behind a source file
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to read {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: io::Error,
    },
}

impl Classify for SourceError {
    fn class(&self) -> ErrorClass {
        match self {
            SourceError::Read { source, .. } => ErrorClass::from_io(source),
        }
    }
}

/// Per-file conversion failures
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Not enough memory to process {name}: {detail}")]
    Memory { name: String, detail: String },

    #[error("{format} output is not supported by this runtime")]
    Unsupported { format: String },

    #[error("Could not decode {name}: {reason}")]
    Corrupt { name: String, reason: String },

    #[error("{operation} timed out for {name} after {timeout_ms} ms")]
    Timeout {
        name: String,
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("Encoding {name} as {format} failed: {reason}")]
    Encode {
        name: String,
        format: String,
        reason: String,
    },

    #[error("{primary}; low-memory fallback also failed: {fallback}")]
    Combined {
        primary: Box<ConversionError>,
        fallback: Box<ConversionError>,
    },

    #[error("Conversion was cancelled")]
    Cancelled,
}

impl Classify for ConversionError {
    fn class(&self) -> ErrorClass {
        match self {
            ConversionError::Source(e) => e.class(),
            ConversionError::Memory { .. } | ConversionError::Combined { .. } => {
                ErrorClass::Memory
            }
            ConversionError::Unsupported { .. } => ErrorClass::Compatibility,
            ConversionError::Corrupt { .. } => ErrorClass::Corruption,
            ConversionError::Timeout { .. } => ErrorClass::Timeout,
            ConversionError::Encode { .. } | ConversionError::Cancelled => ErrorClass::Generic,
        }
    }
}

/// Errors that occur during duplicate detection
#[derive(Error, Debug)]
pub enum DetectError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Could not decode {name} for content comparison: {reason}")]
    Undecodable { name: String, reason: String },

    #[error("Content hashing timed out for {name} after {timeout_ms} ms")]
    Timeout { name: String, timeout_ms: u64 },

    #[error("Worker pool failure: {0}")]
    WorkerFailed(String),

    #[error("{pending} chunk(s) did not report within {timeout_ms} ms")]
    ChunkTimeout { pending: usize, timeout_ms: u64 },

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("Duplicate detection was cancelled")]
    Cancelled,
}

impl Classify for DetectError {
    fn class(&self) -> ErrorClass {
        match self {
            DetectError::Source(e) => e.class(),
            DetectError::Undecodable { .. } => ErrorClass::Corruption,
            DetectError::Timeout { .. } | DetectError::ChunkTimeout { .. } => ErrorClass::Timeout,
            DetectError::WorkerFailed(_)
            | DetectError::Settings(_)
            | DetectError::Cancelled => ErrorClass::Generic,
        }
    }
}

/// Invalid options or settings, rejected at construction time
#[derive(Error, Debug, PartialEq)]
pub enum SettingsError {
    #[error("Invalid threshold: {value} (must be between 0 and 1)")]
    InvalidThreshold { value: f64 },

    #[error("Invalid quality: {value} (must be 1-100)")]
    InvalidQuality { value: u8 },

    #[error("Invalid resize: at least one of width or height must be non-zero")]
    InvalidResize,

    #[error("Invalid chunking: {0}")]
    InvalidChunking(String),

    #[error("Unknown value '{value}' for {field}")]
    UnknownValue { field: &'static str, value: String },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_error_includes_name() {
        let error = ConversionError::Corrupt {
            name: "holiday.jpg".to_string(),
            reason: "invalid JPEG marker".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("holiday.jpg"));
        assert!(message.contains("invalid JPEG marker"));
    }

    #[test]
    fn io_errors_are_classified_by_kind() {
        let timed_out = io::Error::new(io::ErrorKind::TimedOut, "slow share");
        let truncated = io::Error::new(io::ErrorKind::UnexpectedEof, "short read");
        let missing = io::Error::new(io::ErrorKind::NotFound, "gone");

        assert_eq!(ErrorClass::from_io(&timed_out), ErrorClass::Network);
        assert_eq!(ErrorClass::from_io(&truncated), ErrorClass::Corruption);
        assert_eq!(ErrorClass::from_io(&missing), ErrorClass::Generic);
    }

    #[test]
    fn combined_error_names_both_failures() {
        let error = ConversionError::Combined {
            primary: Box::new(ConversionError::Memory {
                name: "big.png".to_string(),
                detail: "decoded buffer of 800 MB exceeds budget".to_string(),
            }),
            fallback: Box::new(ConversionError::Memory {
                name: "big.png".to_string(),
                detail: "allocation refused".to_string(),
            }),
        };

        let message = error.to_string();
        assert!(message.contains("exceeds budget"));
        assert!(message.contains("allocation refused"));
        assert_eq!(error.class(), ErrorClass::Memory);
    }

    #[test]
    fn source_errors_keep_their_io_class() {
        let error = ConversionError::from(SourceError::Read {
            name: "remote.jpg".to_string(),
            source: io::Error::new(io::ErrorKind::ConnectionReset, "reset"),
        });
        assert_eq!(error.class(), ErrorClass::Network);
        assert!(error.class().is_transient());
    }

    #[test]
    fn settings_error_mentions_range() {
        let error = SettingsError::InvalidThreshold { value: 1.5 };
        assert!(error.to_string().contains("between 0 and 1"));
    }
}
