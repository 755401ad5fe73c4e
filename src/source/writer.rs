//! Writer for framed record files

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::framed::{encode_frame, encode_header, HEADER_SIZE, SYNC_MARKER_SIZE};
use super::traits::Position;
use crate::error::SourceError;

/// Writes records to a framed file readable by [`super::FramedFileSource`].
///
/// # Example
/// ```no_run
/// use recordchain::source::FramedWriter;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut writer = FramedWriter::create("part-0000.rcf")?;
/// writer.write_record(b"first")?;
/// writer.write_record(b"second")?;
/// writer.finish()?;
/// # Ok(())
/// # }
/// ```
pub struct FramedWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    sync_marker: [u8; SYNC_MARKER_SIZE],
    offset: u64,
    records_written: u64,
}

impl FramedWriter {
    /// Create (or truncate) a framed file with a random sync marker.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        Self::create_with_sync_marker(path, rand::random())
    }

    /// Create (or truncate) a framed file with the given sync marker.
    pub fn create_with_sync_marker<P: AsRef<Path>>(
        path: P,
        sync_marker: [u8; SYNC_MARKER_SIZE],
    ) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let path_name = path.display().to_string();
        let file = File::create(&path).map_err(|e| SourceError::from_io(&path_name, e))?;

        let mut writer = BufWriter::new(file);
        writer.write_all(&encode_header(&sync_marker))?;
        debug!(path = %path_name, "Created framed file");

        Ok(Self {
            path,
            writer,
            sync_marker,
            offset: HEADER_SIZE,
            records_written: 0,
        })
    }

    /// Append one record, returning the position it starts at.
    pub fn write_record(&mut self, record: &[u8]) -> Result<Position, SourceError> {
        let position = self.position();
        let frame = encode_frame(&self.sync_marker, record);
        self.writer.write_all(&frame)?;
        self.offset += frame.len() as u64;
        self.records_written += 1;
        Ok(position)
    }

    /// Position the next record will be written at.
    pub fn position(&self) -> Position {
        Position::from_offset(self.offset)
    }

    /// The sync marker of this file.
    pub fn sync_marker(&self) -> &[u8; SYNC_MARKER_SIZE] {
        &self.sync_marker
    }

    /// Number of records written so far.
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Flush buffered frames and sync the file to disk.
    pub fn finish(mut self) -> Result<(), SourceError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        debug!(
            path = %self.path.display(),
            records = self.records_written,
            bytes = self.offset,
            "Finished framed file"
        );
        Ok(())
    }
}

impl std::fmt::Debug for FramedWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramedWriter")
            .field("path", &self.path)
            .field("offset", &self.offset)
            .field("records_written", &self.records_written)
            .finish()
    }
}
