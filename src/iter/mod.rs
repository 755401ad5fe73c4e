//! Checkpointable iteration over an ordered list of record files
//!
//! - `FileList` holds the ordered file identifiers (optionally glob-expanded)
//! - `StreamIterator` reads them one at a time with skip/recover semantics
//! - `SharedStreamIterator` wraps an iterator for use from several threads

mod sequencer;
mod shared;
mod stream;

pub use sequencer::{expand_local_glob, is_glob_pattern, FileList};
pub use shared::SharedStreamIterator;
pub use stream::{
    IteratorConfig, IteratorState, RecoveryMode, ScanStats, StreamIterator, TruncatedTailPolicy,
};
