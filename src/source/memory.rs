//! In-memory record source
//!
//! A scripted source whose "file" is a list of entries: valid records,
//! corrupt regions, a truncated tail or a fatal error. Positions and
//! skipped-region offsets are entry indices.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;

use super::traits::{Position, RecordSource, SourceOpener};
use crate::error::{SkippedRegion, SourceError};

/// One entry of an in-memory file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryEntry {
    /// A valid record
    Record(Bytes),
    /// A corrupt entry that recovery can skip
    Corrupt(String),
    /// An incomplete final record; everything from here to the end is lost
    TruncatedTail,
    /// An unrecoverable read error
    Fatal(String),
}

/// Contents of one in-memory file.
#[derive(Debug, Clone, Default)]
pub struct MemoryFile {
    entries: Vec<MemoryEntry>,
    close_error: Option<SourceError>,
}

impl MemoryFile {
    /// Create an empty file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a file holding only valid records.
    pub fn from_records<I, R>(records: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Bytes>,
    {
        records
            .into_iter()
            .fold(Self::new(), |file, record| file.record(record))
    }

    /// Append a valid record.
    pub fn record(mut self, record: impl Into<Bytes>) -> Self {
        self.entries.push(MemoryEntry::Record(record.into()));
        self
    }

    /// Append a corrupt entry.
    pub fn corrupt(mut self, message: impl Into<String>) -> Self {
        self.entries.push(MemoryEntry::Corrupt(message.into()));
        self
    }

    /// Append a truncated final record.
    pub fn truncated_tail(mut self) -> Self {
        self.entries.push(MemoryEntry::TruncatedTail);
        self
    }

    /// Append an unrecoverable error.
    pub fn fatal(mut self, message: impl Into<String>) -> Self {
        self.entries.push(MemoryEntry::Fatal(message.into()));
        self
    }

    /// Make `close()` fail with `error` even when all reads succeeded.
    pub fn fail_close(mut self, error: SourceError) -> Self {
        self.close_error = Some(error);
        self
    }

    /// The entries of this file.
    pub fn entries(&self) -> &[MemoryEntry] {
        &self.entries
    }

    /// Valid records in order, skipping damaged entries.
    pub fn records(&self) -> impl Iterator<Item = &Bytes> {
        self.entries.iter().filter_map(|entry| match entry {
            MemoryEntry::Record(record) => Some(record),
            _ => None,
        })
    }
}

/// Counters shared between an opener and the sources it produced.
#[derive(Debug, Default)]
pub struct OpenStats {
    opened: AtomicUsize,
    closed: AtomicUsize,
    open_now: AtomicUsize,
    max_open: AtomicUsize,
}

impl OpenStats {
    fn on_open(&self) {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let now = self.open_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_open.fetch_max(now, Ordering::SeqCst);
    }

    fn on_release(&self) {
        self.open_now.fetch_sub(1, Ordering::SeqCst);
    }

    /// Number of sources opened so far.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of explicit `close()` calls that released a source.
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Sources currently open (not yet closed or dropped).
    pub fn open_now(&self) -> usize {
        self.open_now.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously open sources.
    pub fn max_open(&self) -> usize {
        self.max_open.load(Ordering::SeqCst)
    }
}

/// A record source reading from a [`MemoryFile`].
#[derive(Debug)]
pub struct MemorySource {
    entries: Arc<[MemoryEntry]>,
    close_error: Option<SourceError>,
    index: usize,
    failure: Option<SourceError>,
    closed: bool,
    stats: Option<Arc<OpenStats>>,
}

impl MemorySource {
    /// Create a source over `file`.
    pub fn new(file: MemoryFile) -> Self {
        Self {
            entries: file.entries.into(),
            close_error: file.close_error,
            index: 0,
            failure: None,
            closed: false,
            stats: None,
        }
    }

    /// Create a source whose opening failed with `error`.
    pub fn failed(error: SourceError) -> Self {
        let mut source = Self::new(MemoryFile::new());
        source.failure = Some(error);
        source
    }

    fn tracked(mut self, stats: Arc<OpenStats>) -> Self {
        stats.on_open();
        self.stats = Some(stats);
        self
    }

    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            if let Some(stats) = &self.stats {
                stats.on_release();
            }
        }
    }

    /// Index of the next entry.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl RecordSource for MemorySource {
    fn read_next(&mut self) -> Option<Bytes> {
        if self.closed {
            self.failure.get_or_insert(SourceError::Closed);
        }
        if self.failure.is_some() {
            return None;
        }

        let offset = self.index as u64;
        match self.entries.get(self.index)? {
            MemoryEntry::Record(record) => {
                self.index += 1;
                Some(record.clone())
            }
            MemoryEntry::Corrupt(message) => {
                self.failure = Some(SourceError::Corrupt {
                    offset,
                    message: message.clone(),
                });
                None
            }
            MemoryEntry::TruncatedTail => {
                self.failure = Some(SourceError::TruncatedTail { offset });
                None
            }
            MemoryEntry::Fatal(message) => {
                self.failure = Some(SourceError::FileSystemError(message.clone()));
                None
            }
        }
    }

    fn recover(&mut self) -> Option<SkippedRegion> {
        let region = match self.failure.as_ref()? {
            SourceError::Corrupt { offset, message } => {
                let begin = *offset as usize;
                let end = self.entries[begin..]
                    .iter()
                    .position(|entry| !matches!(entry, MemoryEntry::Corrupt(_)))
                    .map_or(self.entries.len(), |skipped| begin + skipped);
                self.index = end;
                SkippedRegion::new(begin as u64, end as u64, message.clone())
            }
            SourceError::TruncatedTail { offset } => {
                self.index = self.entries.len();
                SkippedRegion::truncated_tail(
                    *offset,
                    self.entries.len() as u64,
                    "incomplete record at end of file",
                )
            }
            _ => return None,
        };
        self.failure = None;
        Some(region)
    }

    fn seek(&mut self, position: &Position) {
        if self.closed {
            self.failure.get_or_insert(SourceError::Closed);
        }
        if self.failure.is_some() {
            return;
        }
        match position.to_offset() {
            Some(index) if index <= self.entries.len() as u64 => self.index = index as usize,
            Some(index) => {
                self.failure = Some(SourceError::InvalidPosition(format!(
                    "entry {} is beyond {} entries",
                    index,
                    self.entries.len()
                )))
            }
            None => {
                self.failure = Some(SourceError::InvalidPosition(
                    "malformed memory position".to_string(),
                ))
            }
        }
    }

    fn position(&self) -> Position {
        Position::from_offset(self.index as u64)
    }

    fn close(&mut self) -> Result<(), SourceError> {
        if self.closed {
            return Ok(());
        }
        self.release();
        if let Some(stats) = &self.stats {
            stats.closed.fetch_add(1, Ordering::SeqCst);
        }
        match self.failure.take().or_else(|| self.close_error.take()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn error(&self) -> Option<&SourceError> {
        self.failure.as_ref()
    }
}

impl Drop for MemorySource {
    fn drop(&mut self) {
        self.release();
    }
}

/// Opens [`MemorySource`]s from a set of named in-memory files.
///
/// Unknown names produce a source that fails with `SourceError::NotFound`.
#[derive(Debug, Clone, Default)]
pub struct MemoryOpener {
    files: HashMap<String, MemoryFile>,
    stats: Arc<OpenStats>,
}

impl MemoryOpener {
    /// Create an opener with no files.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a named file.
    pub fn with_file(mut self, name: impl Into<String>, file: MemoryFile) -> Self {
        self.files.insert(name.into(), file);
        self
    }

    /// Add (or replace) a named file.
    pub fn insert(&mut self, name: impl Into<String>, file: MemoryFile) {
        self.files.insert(name.into(), file);
    }

    /// Open/close counters for the sources produced by this opener.
    pub fn stats(&self) -> Arc<OpenStats> {
        Arc::clone(&self.stats)
    }
}

impl SourceOpener for MemoryOpener {
    type Source = MemorySource;

    fn open(&self, file: &str) -> MemorySource {
        let source = match self.files.get(file) {
            Some(contents) => MemorySource::new(contents.clone()),
            None => MemorySource::failed(SourceError::NotFound(file.to_string())),
        };
        source.tracked(Arc::clone(&self.stats))
    }
}
