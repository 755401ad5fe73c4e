//! Record source abstractions
//!
//! This module defines the `RecordSource` contract consumed by the stream
//! iterator, plus two implementations: an in-memory scripted source and a
//! framed file source with a matching writer.

mod framed;
mod memory;
mod traits;
mod writer;

pub use framed::{
    encode_frame, encode_header, FramedConfig, FramedFileSource, FramedOpener, FRAMED_MAGIC,
    HEADER_SIZE, SYNC_MARKER_SIZE,
};
pub use memory::{MemoryEntry, MemoryFile, MemoryOpener, MemorySource, OpenStats};
pub use traits::{BoxedOpener, BoxedSource, Position, RecordSource, SourceOpener};
pub use writer::FramedWriter;
