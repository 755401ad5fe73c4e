//! Error types for record sources, cursors and the stream iterator

use std::fmt;
use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Errors reported by a record source.
///
/// Cloneable so a source can keep its terminal error in its error state
/// and still hand a copy back from `close()`.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// File system error
    #[error("File system error: {0}")]
    FileSystemError(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(Arc<io::Error>),
    /// Path not found
    #[error("Not found: {0}")]
    NotFound(String),
    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    /// Corrupt content at a known offset
    #[error("Corrupt data at offset {offset}: {message}")]
    Corrupt { offset: u64, message: String },
    /// Incomplete record at the end of the file
    #[error("Truncated record at offset {offset}")]
    TruncatedTail { offset: u64 },
    /// File header missing or malformed
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
    /// Position token that this source cannot seek to
    #[error("Invalid position: {0}")]
    InvalidPosition(String),
    /// Operation on a source that was already closed
    #[error("Source is closed")]
    Closed,
}

impl From<io::Error> for SourceError {
    fn from(err: io::Error) -> Self {
        SourceError::Io(Arc::new(err))
    }
}

impl SourceError {
    /// Map an `io::Error` raised while accessing `path` to the closest variant.
    pub fn from_io(path: &str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => SourceError::NotFound(path.to_string()),
            io::ErrorKind::PermissionDenied => SourceError::PermissionDenied(path.to_string()),
            _ => SourceError::FileSystemError(format!("{}: {}", path, err)),
        }
    }
}

/// Why a region was skipped during recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipCause {
    /// Malformed content followed by readable records
    Corruption,
    /// The damaged region runs to the end of the file (partially written record)
    TruncatedTail,
}

/// A corrupted range bypassed by `RecordSource::recover`.
///
/// `begin` and `end` are in the source's own offset units: bytes for the
/// framed file source, entry indices for the memory source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRegion {
    /// First offset of the skipped range
    pub begin: u64,
    /// Offset just past the skipped range
    pub end: u64,
    /// Human-readable cause
    pub message: String,
    /// Kind of damage
    pub cause: SkipCause,
}

impl SkippedRegion {
    /// Create a region caused by corruption.
    pub fn new(begin: u64, end: u64, message: impl Into<String>) -> Self {
        Self {
            begin,
            end,
            message: message.into(),
            cause: SkipCause::Corruption,
        }
    }

    /// Create a region that ends at the end of the file.
    pub fn truncated_tail(begin: u64, end: u64, message: impl Into<String>) -> Self {
        Self {
            begin,
            end,
            message: message.into(),
            cause: SkipCause::TruncatedTail,
        }
    }

    /// Number of offset units skipped.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.begin)
    }

    /// Check if the region is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if the region is a truncated tail.
    pub fn is_truncated_tail(&self) -> bool {
        self.cause == SkipCause::TruncatedTail
    }
}

impl fmt::Display for SkippedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}..{}): {}", self.begin, self.end, self.message)
    }
}

/// Per-call failures of the stream iterator.
///
/// Neither variant ends the scan: calling `next_record` again continues
/// past the skipped region or with the next file.
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    /// A corrupt region was skipped; the file stays open
    #[error("Skipping invalid region of {file}: {region}")]
    DataLoss { file: String, region: SkippedRegion },

    /// The file could not be read to the end; iteration moves to the next file
    #[error("Failed to read {file} (file {file_index}): {source}")]
    FileFailed {
        file: String,
        file_index: usize,
        #[source]
        source: SourceError,
    },
}

impl StreamError {
    /// Check if this is a non-fatal data-loss notification.
    pub fn is_data_loss(&self) -> bool {
        matches!(self, StreamError::DataLoss { .. })
    }

    /// The identifier of the file the error belongs to.
    pub fn file(&self) -> &str {
        match self {
            StreamError::DataLoss { file, .. } => file,
            StreamError::FileFailed { file, .. } => file,
        }
    }
}

/// Errors decoding a variable-length integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VarintError {
    /// Input ended before the last byte
    #[error("Unexpected end of data")]
    UnexpectedEof,
    /// More than 10 bytes
    #[error("Invalid varint encoding")]
    Overlong,
}

/// Errors decoding a serialized cursor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CursorError {
    /// Magic bytes don't match
    #[error("Invalid cursor magic: found {0:?}")]
    InvalidMagic([u8; 3]),
    /// Codec version not understood by this build
    #[error("Unsupported cursor version: {0}")]
    UnsupportedVersion(u8),
    /// Input ended early
    #[error("Unexpected end of cursor data")]
    UnexpectedEof,
    /// Invalid varint encoding
    #[error("Invalid varint encoding")]
    InvalidVarint,
    /// Reserved flag bits set
    #[error("Unknown cursor flags: {0:#04x}")]
    UnknownFlags(u8),
    /// Position length larger than the remaining input
    #[error("Position length {0} exceeds cursor size")]
    PositionTooLong(u64),
    /// Checksum doesn't match the payload
    #[error("Cursor checksum mismatch: expected {expected:#010x}, found {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
    /// Extra bytes after the checksum
    #[error("{0} trailing bytes after cursor")]
    TrailingBytes(usize),
}

impl From<VarintError> for CursorError {
    fn from(err: VarintError) -> Self {
        match err {
            VarintError::UnexpectedEof => CursorError::UnexpectedEof,
            VarintError::Overlong => CursorError::InvalidVarint,
        }
    }
}

/// Errors restoring an iterator from a cursor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckpointError {
    /// Malformed cursor bytes
    #[error("Cursor format error: {0}")]
    Cursor(#[from] CursorError),
    /// File index beyond the file list
    #[error("File index {file_index} out of range for {file_count} files")]
    FileIndexOutOfRange { file_index: u64, file_count: usize },
    /// Position recorded for the end-of-sequence index
    #[error("Cursor has a position but file index {file_index} is the end of the sequence")]
    PositionAtEnd { file_index: u64 },
}
