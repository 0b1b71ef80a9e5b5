//! Error types for `BnkForge`

use std::path::PathBuf;

use thiserror::Error;

/// The error type for `BnkForge` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A required input file does not exist.
    #[error("file not found: {path}")]
    FileNotFound {
        /// The missing path.
        path: PathBuf,
    },

    // ==================== SoundBank Errors ====================
    /// The buffer cannot hold even a single record.
    #[error("buffer too short: {len} bytes (a record needs {min})")]
    BufferTooShort {
        /// Length of the buffer.
        len: usize,
        /// Minimum length of one record.
        min: usize,
    },

    /// No record references the requested source ID.
    #[error("no records found for source ID {source_id}")]
    SourceNotFound {
        /// The source ID that was searched for.
        source_id: u32,
    },

    /// Every signature hit for the source ID ran past the end of the buffer.
    #[error("all {count} candidate records for source ID {source_id} are truncated")]
    MalformedRecords {
        /// The source ID that was searched for.
        source_id: u32,
        /// Number of truncated candidates.
        count: usize,
    },

    /// A size value does not fit the 32-bit record field.
    #[error("size {value} exceeds the 32-bit file size field")]
    SizeOverflow {
        /// The requested size.
        value: u64,
    },

    // ==================== Encoding Errors ====================
    /// No quality and sample rate combination produced an artifact within the target.
    #[error("cannot encode to {target} bytes: smallest achievable size is {}", min_size.map_or_else(|| "unknown".to_string(), |s| format!("{s} bytes")))]
    EncodeInfeasible {
        /// The requested target size.
        target: u64,
        /// The smallest artifact size observed during the search, if any probe succeeded.
        min_size: Option<u64>,
    },

    /// The external encoder exited unsuccessfully or produced no artifact.
    #[error("encoder failed: {message}")]
    ExternalTool {
        /// Description of the failure (usually stderr).
        message: String,
    },

    /// The external encoder exceeded its time budget and was killed.
    #[error("encoder timed out after {secs}s")]
    EncoderTimeout {
        /// The configured timeout.
        secs: u64,
    },

    /// The external encoder executable could not be located.
    #[error("encoder executable not found: {program}")]
    EncoderNotFound {
        /// The configured program name or path.
        program: String,
    },

    /// The operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// An artifact is already larger than the size it must be padded to.
    #[error("artifact is {actual} bytes, larger than target {target}")]
    PaddingOverflow {
        /// Current artifact size.
        actual: u64,
        /// Requested size.
        target: u64,
    },

    /// Padding finished but the artifact length does not equal the target.
    #[error("padded artifact is {actual} bytes, expected {target}")]
    PaddingMismatch {
        /// Size after padding.
        actual: u64,
        /// Requested size.
        target: u64,
    },

    /// The source audio cannot be resampled (not a readable PCM WAV).
    #[error("unsupported source audio {path}: {message}")]
    UnsupportedSource {
        /// The source path.
        path: PathBuf,
        /// Why it was rejected.
        message: String,
    },

    /// WAV reading or writing failed.
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    // ==================== WEM Errors ====================
    /// The file is not a RIFF/WAVE container.
    #[error("invalid WEM file: {message}")]
    InvalidWem {
        /// Description of what is invalid.
        message: String,
    },

    // ==================== Configuration Errors ====================
    /// Configuration is unreadable or inconsistent.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },

    /// TOML parse error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    // ==================== Parsing Errors ====================
    /// JSON serialization error (record listings).
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// XML writing error.
    #[error("XML error: {0}")]
    XmlError(#[from] quick_xml::Error),

    // ==================== File System Errors ====================
    /// Invalid file path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Directory traversal error.
    #[error("directory walk error: {0}")]
    WalkDirError(String),
}

impl Error {
    /// Whether a failed encoder probe should be treated as "too large" by the searches.
    ///
    /// Tool failures and timeouts narrow the search; cancellation and IO errors abort it.
    #[must_use]
    pub fn is_probe_failure(&self) -> bool {
        matches!(
            self,
            Error::ExternalTool { .. } | Error::EncoderTimeout { .. }
        )
    }

    /// Whether the requested source has no usable record
    ///
    /// Covers plain misses and sources whose every candidate was truncated.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::SourceNotFound { .. } | Error::MalformedRecords { .. }
        )
    }
}

// Add conversion from walkdir::Error
impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::WalkDirError(err.to_string())
    }
}

// Add conversion from tempfile::PersistError
impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::Io(err.error)
    }
}

/// A specialized Result type for `BnkForge` operations.
pub type Result<T> = std::result::Result<T, Error>;
