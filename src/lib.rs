//! Checkpointable streaming over ordered lists of record files
//!
//! This library reads the records of several files as one stream, skipping
//! corrupt regions and failed files while reporting each loss exactly once.
//! The scan position can be saved as a compact cursor and restored later,
//! including across processes.
//!
//! # Example
//! ```no_run
//! use recordchain::iter::{FileList, StreamIterator};
//! use recordchain::source::{FramedConfig, FramedOpener};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let files = FileList::from_patterns(&["data/*.rcf"], true)?;
//! let mut iter = StreamIterator::new(files, FramedOpener::new(FramedConfig::default()));
//!
//! let mut count = 0;
//! while let Some(record) = iter.next() {
//!     match record {
//!         Ok(_) => count += 1,
//!         Err(err) if err.is_data_loss() => eprintln!("warning: {}", err),
//!         Err(err) => eprintln!("error: {}", err),
//!     }
//!     if count % 1000 == 0 {
//!         std::fs::write("checkpoint.bin", iter.save_bytes())?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod cursor;
pub mod error;
pub mod iter;
pub mod source;
pub mod varint;

// Re-export main types
pub use cursor::Cursor;
pub use error::{
    CheckpointError, CursorError, SkipCause, SkippedRegion, SourceError, StreamError, VarintError,
};
pub use iter::{
    FileList, IteratorConfig, IteratorState, RecoveryMode, ScanStats, SharedStreamIterator,
    StreamIterator, TruncatedTailPolicy,
};
pub use source::{
    FramedConfig, FramedFileSource, FramedOpener, FramedWriter, MemoryFile, MemoryOpener,
    MemorySource, Position, RecordSource, SourceOpener,
};
