//! Framed record file source
//!
//! A framed file is a small header followed by a sequence of frames:
//! - Magic bytes ("RCF\x01")
//! - 16-byte sync marker
//! - Frames: sync marker, varint payload length, payload, crc32 of payload
//!
//! Every frame starts with the file's sync marker, so after a damaged frame
//! the reader can resynchronise by scanning forward for the next marker.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use bytes::Bytes;
use tracing::debug;

use super::traits::{Position, RecordSource, SourceOpener};
use crate::error::{SkippedRegion, SourceError, VarintError};
use crate::varint::{decode_varint, put_varint, varint_len, MAX_VARINT_LEN};

/// Magic bytes identifying a framed record file
pub const FRAMED_MAGIC: [u8; 4] = [b'R', b'C', b'F', 0x01];

/// Size of the sync marker in bytes
pub const SYNC_MARKER_SIZE: usize = 16;

/// Header size: magic (4) + sync marker (16)
pub const HEADER_SIZE: u64 = (FRAMED_MAGIC.len() + SYNC_MARKER_SIZE) as u64;

/// Size of the trailing frame checksum
const CRC_SIZE: usize = 4;

/// Default chunk size when scanning for sync markers (64KB)
const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Default upper bound for a single record (64MB)
const DEFAULT_MAX_RECORD_SIZE: u64 = 64 * 1024 * 1024;

/// Configuration for reading framed files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedConfig {
    /// Chunk size used when scanning for the next sync marker (default: 64KB).
    pub read_buffer_size: usize,
    /// Largest accepted payload; longer lengths count as corruption (default: 64MB).
    pub max_record_size: u64,
}

impl Default for FramedConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
        }
    }
}

impl FramedConfig {
    /// Create a new FramedConfig with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scan chunk size. Values below the sync marker size are raised to it.
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(SYNC_MARKER_SIZE);
        self
    }

    /// Set the maximum record size.
    pub fn with_max_record_size(mut self, size: u64) -> Self {
        self.max_record_size = size;
        self
    }
}

/// Encode one frame (sync marker, length, payload, checksum).
pub fn encode_frame(sync_marker: &[u8; SYNC_MARKER_SIZE], payload: &[u8]) -> Vec<u8> {
    let capacity =
        SYNC_MARKER_SIZE + varint_len(payload.len() as u64) + payload.len() + CRC_SIZE;
    let mut frame = Vec::with_capacity(capacity);
    frame.extend_from_slice(sync_marker);
    put_varint(&mut frame, payload.len() as u64);
    frame.extend_from_slice(payload);
    frame.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());
    frame
}

/// Encode a file header.
pub fn encode_header(sync_marker: &[u8; SYNC_MARKER_SIZE]) -> Vec<u8> {
    let mut header = Vec::with_capacity(HEADER_SIZE as usize);
    header.extend_from_slice(&FRAMED_MAGIC);
    header.extend_from_slice(sync_marker);
    header
}

/// A record source reading a framed file from the local filesystem.
///
/// Positions are byte offsets of frame starts. Opening and seeking never
/// fail directly; problems are kept in the error state and reported by the
/// next read.
pub struct FramedFileSource {
    path: String,
    file: Option<File>,
    file_size: u64,
    sync_marker: [u8; SYNC_MARKER_SIZE],
    offset: u64,
    failure: Option<SourceError>,
    closed: bool,
    config: FramedConfig,
}

impl FramedFileSource {
    /// Open a framed file for reading.
    pub fn open(path: impl Into<String>, config: FramedConfig) -> Self {
        let mut source = Self {
            path: path.into(),
            file: None,
            file_size: 0,
            sync_marker: [0u8; SYNC_MARKER_SIZE],
            offset: HEADER_SIZE,
            failure: None,
            closed: false,
            config,
        };

        match source.read_header() {
            Ok(()) => debug!(path = %source.path, file_size = source.file_size, "Opened framed file"),
            Err(err) => {
                debug!(path = %source.path, error = %err, "Failed to open framed file");
                source.failure = Some(err);
            }
        }
        source
    }

    fn read_header(&mut self) -> Result<(), SourceError> {
        let file = File::open(&self.path).map_err(|e| SourceError::from_io(&self.path, e))?;
        let metadata = file.metadata().map_err(|e| {
            SourceError::FileSystemError(format!(
                "Failed to get metadata for {}: {}",
                self.path, e
            ))
        })?;
        self.file = Some(file);
        self.file_size = metadata.len();

        if self.file_size < HEADER_SIZE {
            return Err(SourceError::InvalidHeader(format!(
                "{}: expected at least {} bytes, got {}",
                self.path, HEADER_SIZE, self.file_size
            )));
        }

        let header = self.read_range(0, HEADER_SIZE as usize)?;
        let (magic, sync_marker) = header.split_at(FRAMED_MAGIC.len());
        if magic != FRAMED_MAGIC {
            return Err(SourceError::InvalidHeader(format!(
                "{}: invalid magic bytes {:?}",
                self.path, magic
            )));
        }
        self.sync_marker.copy_from_slice(sync_marker);
        Ok(())
    }

    /// Read up to `length` bytes at `offset`, clamped to the file size.
    fn read_range(&mut self, offset: u64, length: usize) -> Result<Vec<u8>, SourceError> {
        let available = self.file_size.saturating_sub(offset);
        let actual_length = (length as u64).min(available) as usize;
        let file = self.file.as_mut().ok_or(SourceError::Closed)?;

        file.seek(SeekFrom::Start(offset)).map_err(|e| {
            SourceError::FileSystemError(format!(
                "Failed to seek to offset {} in {}: {}",
                offset, self.path, e
            ))
        })?;

        let mut buffer = vec![0u8; actual_length];
        file.read_exact(&mut buffer).map_err(|e| {
            SourceError::FileSystemError(format!(
                "Failed to read {} bytes at offset {} from {}: {}",
                actual_length, offset, self.path, e
            ))
        })?;
        Ok(buffer)
    }

    fn read_frame(&mut self) -> Result<Option<Bytes>, SourceError> {
        if self.offset >= self.file_size {
            return Ok(None);
        }

        let offset = self.offset;
        let remaining = self.file_size - offset;
        let corrupt = |message: String| SourceError::Corrupt { offset, message };

        let head = self.read_range(offset, SYNC_MARKER_SIZE + MAX_VARINT_LEN)?;
        if head.len() <= SYNC_MARKER_SIZE {
            return Err(SourceError::TruncatedTail { offset });
        }
        if head[..SYNC_MARKER_SIZE] != self.sync_marker {
            return Err(corrupt("invalid sync marker".to_string()));
        }

        let mut cursor = &head[SYNC_MARKER_SIZE..];
        let length = match decode_varint(&mut cursor) {
            Ok(length) => length,
            Err(VarintError::UnexpectedEof) => return Err(SourceError::TruncatedTail { offset }),
            Err(VarintError::Overlong) => return Err(corrupt("invalid record length".to_string())),
        };
        if length > self.config.max_record_size {
            return Err(corrupt(format!(
                "record length {} exceeds maximum {}",
                length, self.config.max_record_size
            )));
        }

        let header_len = (SYNC_MARKER_SIZE + varint_len(length)) as u64;
        let frame_len = header_len + length + CRC_SIZE as u64;
        if frame_len > remaining {
            // A later frame means the length itself is damaged
            if self.find_next_sync(offset + 1)?.is_some() {
                return Err(corrupt(format!(
                    "record length {} overruns the next frame",
                    length
                )));
            }
            return Err(SourceError::TruncatedTail { offset });
        }

        let mut body = self.read_range(offset + header_len, length as usize + CRC_SIZE)?;
        let crc_bytes = body.split_off(length as usize);
        let expected = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        let actual = crc32fast::hash(&body);
        if actual != expected {
            return Err(corrupt(format!(
                "checksum mismatch: expected {:#010x}, found {:#010x}",
                expected, actual
            )));
        }

        self.offset += frame_len;
        Ok(Some(Bytes::from(body)))
    }

    /// Scan forward from `start_from` for the next sync marker.
    ///
    /// Returns the offset of the marker, or `None` if there is none before EOF.
    fn find_next_sync(&mut self, start_from: u64) -> Result<Option<u64>, SourceError> {
        let sync_marker = self.sync_marker;
        let mut scan_offset = start_from;

        while scan_offset + SYNC_MARKER_SIZE as u64 <= self.file_size {
            let data = self.read_range(scan_offset, self.config.read_buffer_size)?;
            if data.len() < SYNC_MARKER_SIZE {
                break;
            }

            if let Some(marker_pos) = find_sync_marker(&data, &sync_marker) {
                return Ok(Some(scan_offset + marker_pos as u64));
            }

            // Overlap by sync_marker_size - 1 to catch markers spanning chunks
            scan_offset += (data.len() - SYNC_MARKER_SIZE + 1) as u64;
        }
        Ok(None)
    }

    /// Path of the file.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Size of the file in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Byte offset of the next frame.
    pub fn current_offset(&self) -> u64 {
        self.offset
    }
}

impl RecordSource for FramedFileSource {
    fn read_next(&mut self) -> Option<Bytes> {
        if self.closed {
            self.failure.get_or_insert(SourceError::Closed);
        }
        if self.failure.is_some() {
            return None;
        }
        match self.read_frame() {
            Ok(record) => record,
            Err(err) => {
                self.failure = Some(err);
                None
            }
        }
    }

    fn recover(&mut self) -> Option<SkippedRegion> {
        let failure = self.failure.as_ref()?;
        let begin = match failure {
            SourceError::Corrupt { offset, .. } | SourceError::TruncatedTail { offset } => *offset,
            _ => return None,
        };
        let truncated = matches!(failure, SourceError::TruncatedTail { .. });
        let message = failure.to_string();

        match self.find_next_sync(begin + 1) {
            Ok(Some(marker_offset)) => {
                self.offset = marker_offset;
                self.failure = None;
                Some(SkippedRegion::new(begin, marker_offset, message))
            }
            Ok(None) => {
                // No later frame: skip to EOF, keeping the cause of the failure
                self.offset = self.file_size;
                self.failure = None;
                if truncated {
                    Some(SkippedRegion::truncated_tail(begin, self.file_size, message))
                } else {
                    Some(SkippedRegion::new(begin, self.file_size, message))
                }
            }
            Err(err) => {
                self.failure = Some(err);
                None
            }
        }
    }

    fn seek(&mut self, position: &Position) {
        if self.closed {
            self.failure.get_or_insert(SourceError::Closed);
        }
        if self.failure.is_some() {
            return;
        }
        match position.to_offset() {
            Some(offset) if (HEADER_SIZE..=self.file_size).contains(&offset) => {
                debug!(path = %self.path, offset, "Seeking framed file");
                self.offset = offset;
            }
            Some(offset) => {
                self.failure = Some(SourceError::InvalidPosition(format!(
                    "offset {} outside {}..={} in {}",
                    offset, HEADER_SIZE, self.file_size, self.path
                )));
            }
            None => {
                self.failure = Some(SourceError::InvalidPosition(format!(
                    "malformed position for {}",
                    self.path
                )));
            }
        }
    }

    fn position(&self) -> Position {
        Position::from_offset(self.offset)
    }

    fn close(&mut self) -> Result<(), SourceError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.file = None;
        debug!(path = %self.path, offset = self.offset, "Closed framed file");
        match self.failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn error(&self) -> Option<&SourceError> {
        self.failure.as_ref()
    }
}

impl std::fmt::Debug for FramedFileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramedFileSource")
            .field("path", &self.path)
            .field("file_size", &self.file_size)
            .field("offset", &self.offset)
            .field("failure", &self.failure)
            .finish()
    }
}

/// Opens [`FramedFileSource`]s with a shared configuration.
#[derive(Debug, Clone, Default)]
pub struct FramedOpener {
    config: FramedConfig,
}

impl FramedOpener {
    /// Create an opener using `config` for every file.
    pub fn new(config: FramedConfig) -> Self {
        Self { config }
    }
}

impl SourceOpener for FramedOpener {
    type Source = FramedFileSource;

    fn open(&self, file: &str) -> FramedFileSource {
        FramedFileSource::open(file, self.config.clone())
    }
}

/// Find the position of a sync marker in a byte slice.
fn find_sync_marker(data: &[u8], sync_marker: &[u8; SYNC_MARKER_SIZE]) -> Option<usize> {
    data.windows(SYNC_MARKER_SIZE)
        .position(|window| window == sync_marker)
}
