//! Multi-file stream iterator
//!
//! `StreamIterator` reads the files of a `FileList` in order through a
//! `SourceOpener`, keeping at most one source open. Corrupt regions are
//! skipped and reported once; a file that cannot be read to the end is
//! reported once and the scan moves on to the next file. The iterator can
//! be checkpointed with `save()` and resumed with `restore()`.

use std::iter::FusedIterator;

use bytes::Bytes;
use tracing::{debug, warn};

use super::sequencer::FileList;
use crate::cursor::Cursor;
use crate::error::{CheckpointError, SkippedRegion, SourceError, StreamError};
use crate::source::{RecordSource, SourceOpener};

/// What to do when a read fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryMode {
    /// Skip corrupt regions, report them as data loss and keep reading the file.
    #[default]
    Skip,
    /// Treat every read failure as fatal for the current file.
    Strict,
}

/// How to treat damage that runs to the end of a file (an incomplete last record).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TruncatedTailPolicy {
    /// Report a data-loss notification like any other skipped region.
    #[default]
    ReportDataLoss,
    /// End the file cleanly; the skipped tail is only logged.
    TreatAsEndOfFile,
    /// Close the file and report it as failed.
    FailFile,
}

/// Configuration for the StreamIterator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IteratorConfig {
    /// Recovery mode (default: skip).
    pub recovery_mode: RecoveryMode,
    /// Handling of truncated file tails (default: report data loss).
    pub truncated_tail: TruncatedTailPolicy,
}

impl IteratorConfig {
    /// Create a new IteratorConfig with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the recovery mode.
    pub fn with_recovery_mode(mut self, mode: RecoveryMode) -> Self {
        self.recovery_mode = mode;
        self
    }

    /// Set the truncated tail policy.
    pub fn with_truncated_tail(mut self, policy: TruncatedTailPolicy) -> Self {
        self.truncated_tail = policy;
        self
    }

    /// Enable strict mode (a read failure fails the whole file).
    pub fn strict(mut self) -> Self {
        self.recovery_mode = RecoveryMode::Strict;
        self
    }

    /// Enable skip mode (skip corrupt regions and continue).
    pub fn skip_errors(mut self) -> Self {
        self.recovery_mode = RecoveryMode::Skip;
        self
    }
}

/// Observable state of a StreamIterator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IteratorState {
    /// Between files; the next call opens the current file.
    NoFileOpen,
    /// Reading the current file.
    FileOpen,
    /// All files consumed.
    EndOfSequence,
}

/// Running counters of a scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Records returned to the caller
    pub records: u64,
    /// Data-loss notifications returned
    pub data_loss_events: u64,
    /// Files that ended with an error
    pub failed_files: u64,
    /// Files read to a clean end
    pub completed_files: u64,
}

/// Checkpointable iterator over the records of an ordered list of files.
///
/// Every state transition takes `&mut self`; share an iterator between
/// threads with [`super::SharedStreamIterator`].
///
/// # Example
/// ```no_run
/// use recordchain::iter::{FileList, StreamIterator};
/// use recordchain::source::{FramedConfig, FramedOpener};
///
/// let files = FileList::new(["part-0.rcf", "part-1.rcf"]);
/// let mut iter = StreamIterator::new(files, FramedOpener::new(FramedConfig::default()));
///
/// loop {
///     match iter.next_record() {
///         Ok(Some(record)) => println!("{} bytes", record.len()),
///         Ok(None) => break,
///         Err(err) => eprintln!("{}", err),
///     }
/// }
/// ```
pub struct StreamIterator<O: SourceOpener> {
    files: FileList,
    opener: O,
    config: IteratorConfig,
    current_file_index: usize,
    open_source: Option<O::Source>,
    stats: ScanStats,
}

impl<O: SourceOpener> StreamIterator<O> {
    /// Create an iterator with the default configuration.
    pub fn new(files: FileList, opener: O) -> Self {
        Self::with_config(files, opener, IteratorConfig::default())
    }

    /// Create an iterator with an explicit configuration.
    pub fn with_config(files: FileList, opener: O, config: IteratorConfig) -> Self {
        Self {
            files,
            opener,
            config,
            current_file_index: 0,
            open_source: None,
            stats: ScanStats::default(),
        }
    }

    /// Produce the next record.
    ///
    /// # Returns
    /// - `Ok(Some(record))` - the next record
    /// - `Ok(None)` - all files consumed; every later call returns `Ok(None)` too
    /// - `Err(StreamError::DataLoss)` - a corrupt region was skipped, the file stays open
    /// - `Err(StreamError::FileFailed)` - the current file failed, the next call moves on
    pub fn next_record(&mut self) -> Result<Option<Bytes>, StreamError> {
        loop {
            let Some(source) = self.open_source.as_mut() else {
                if self.current_file_index >= self.files.len() {
                    return Ok(None);
                }
                self.open_current_file();
                continue;
            };

            if let Some(record) = source.read_next() {
                self.stats.records += 1;
                return Ok(Some(record));
            }

            let region = match self.config.recovery_mode {
                RecoveryMode::Skip => source.recover(),
                RecoveryMode::Strict => None,
            };
            match region {
                Some(region) => self.handle_skipped_region(region)?,
                // Clean end of file, or a failure that can't be skipped
                None => self.close_current_file()?,
            }
        }
    }

    fn handle_skipped_region(&mut self, region: SkippedRegion) -> Result<(), StreamError> {
        let file = self.files[self.current_file_index].to_string();

        if region.is_truncated_tail() {
            match self.config.truncated_tail {
                TruncatedTailPolicy::ReportDataLoss => {}
                TruncatedTailPolicy::TreatAsEndOfFile => {
                    debug!(file = %file, region = %region, "Ignoring truncated tail");
                    return Ok(());
                }
                TruncatedTailPolicy::FailFile => {
                    let file_index = self.current_file_index;
                    let result = self.take_and_close_source();
                    self.current_file_index += 1;
                    self.stats.failed_files += 1;
                    let source = result
                        .err()
                        .unwrap_or(SourceError::TruncatedTail {
                            offset: region.begin,
                        });
                    warn!(file = %file, file_index, error = %source, "Truncated file");
                    return Err(StreamError::FileFailed {
                        file,
                        file_index,
                        source,
                    });
                }
            }
        }

        self.stats.data_loss_events += 1;
        warn!(file = %file, region = %region, "Skipping invalid region");
        Err(StreamError::DataLoss { file, region })
    }

    fn open_current_file(&mut self) {
        let file = &self.files[self.current_file_index];
        debug!(file, file_index = self.current_file_index, "Opening file");
        self.open_source = Some(self.opener.open(file));
    }

    /// Close the open source, returning its terminal error if any.
    fn take_and_close_source(&mut self) -> Result<(), SourceError> {
        let Some(mut source) = self.open_source.take() else {
            return Ok(());
        };
        let pending = source.error().cloned();
        match (source.close(), pending) {
            (Err(err), _) | (Ok(()), Some(err)) => Err(err),
            (Ok(()), None) => Ok(()),
        }
    }

    fn close_current_file(&mut self) -> Result<(), StreamError> {
        let file_index = self.current_file_index;
        let result = self.take_and_close_source();
        self.current_file_index += 1;

        match result {
            Ok(()) => {
                self.stats.completed_files += 1;
                debug!(file = &self.files[file_index], file_index, "Finished file");
                Ok(())
            }
            Err(source) => {
                self.stats.failed_files += 1;
                let file = self.files[file_index].to_string();
                warn!(file = %file, file_index, error = %source, "Failed to read file");
                Err(StreamError::FileFailed {
                    file,
                    file_index,
                    source,
                })
            }
        }
    }

    /// Capture the resume point.
    ///
    /// Includes the open source's position (the next unread record) when a
    /// file is open.
    pub fn save(&self) -> Cursor {
        Cursor {
            file_index: self.current_file_index as u64,
            position: self.open_source.as_ref().map(|source| source.position()),
        }
    }

    /// Resume from a cursor.
    ///
    /// Validation happens before any state changes. A seek failure is not
    /// returned here; it surfaces on the next `next_record` call.
    ///
    /// # Errors
    /// - `CheckpointError::FileIndexOutOfRange` if the index exceeds the file count
    /// - `CheckpointError::PositionAtEnd` if a position is given for the end index
    pub fn restore(&mut self, cursor: &Cursor) -> Result<(), CheckpointError> {
        let file_count = self.files.len();
        if cursor.file_index > file_count as u64 {
            return Err(CheckpointError::FileIndexOutOfRange {
                file_index: cursor.file_index,
                file_count,
            });
        }
        if cursor.position.is_some() && cursor.file_index == file_count as u64 {
            return Err(CheckpointError::PositionAtEnd {
                file_index: cursor.file_index,
            });
        }

        if let Err(err) = self.take_and_close_source() {
            warn!(
                file_index = self.current_file_index,
                error = %err,
                "Discarding error of file closed by restore"
            );
        }
        self.current_file_index = cursor.file_index as usize;

        if let Some(position) = &cursor.position {
            self.open_current_file();
            if let Some(source) = self.open_source.as_mut() {
                source.seek(position);
            }
        }

        debug!(
            file_index = self.current_file_index,
            has_position = cursor.position.is_some(),
            "Restored iterator"
        );
        Ok(())
    }

    /// Capture the resume point in its serialized form.
    pub fn save_bytes(&self) -> Vec<u8> {
        self.save().encode()
    }

    /// Resume from a serialized cursor; decoding completes before any state changes.
    pub fn restore_bytes(&mut self, bytes: &[u8]) -> Result<(), CheckpointError> {
        let cursor = Cursor::decode(bytes)?;
        self.restore(&cursor)
    }

    /// Close the open file, if any, and drop the iterator.
    ///
    /// # Errors
    /// `StreamError::FileFailed` if the open source reports a terminal error.
    pub fn close(mut self) -> Result<(), StreamError> {
        let file_index = self.current_file_index;
        self.take_and_close_source()
            .map_err(|source| StreamError::FileFailed {
                file: self.files[file_index].to_string(),
                file_index,
                source,
            })
    }

    /// The files being read.
    pub fn files(&self) -> &FileList {
        &self.files
    }

    /// Index of the current file (equal to the file count at the end).
    pub fn current_file_index(&self) -> usize {
        self.current_file_index
    }

    /// Identifier of the current file, or `None` at the end of the sequence.
    pub fn current_file(&self) -> Option<&str> {
        self.files.get(self.current_file_index)
    }

    /// Check if a file is currently open.
    pub fn is_file_open(&self) -> bool {
        self.open_source.is_some()
    }

    /// Check if all files have been consumed.
    pub fn is_finished(&self) -> bool {
        self.state() == IteratorState::EndOfSequence
    }

    /// Current state of the state machine.
    pub fn state(&self) -> IteratorState {
        if self.open_source.is_some() {
            IteratorState::FileOpen
        } else if self.current_file_index >= self.files.len() {
            IteratorState::EndOfSequence
        } else {
            IteratorState::NoFileOpen
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &IteratorConfig {
        &self.config
    }

    /// Counters for the scan so far.
    pub fn stats(&self) -> ScanStats {
        self.stats
    }
}

impl<O: SourceOpener> Iterator for StreamIterator<O> {
    type Item = Result<Bytes, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

impl<O: SourceOpener> FusedIterator for StreamIterator<O> {}

impl<O: SourceOpener> Drop for StreamIterator<O> {
    fn drop(&mut self) {
        if let Err(err) = self.take_and_close_source() {
            debug!(error = %err, "Error closing file on drop");
        }
    }
}

impl<O: SourceOpener> std::fmt::Debug for StreamIterator<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamIterator")
            .field("files", &self.files.len())
            .field("current_file_index", &self.current_file_index)
            .field("state", &self.state())
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish()
    }
}
