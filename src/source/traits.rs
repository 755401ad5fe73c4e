//! RecordSource trait definition
//!
//! A `RecordSource` gives sequential access to the records of one file,
//! with corruption recovery and random access by position. Errors from
//! opening and seeking are deferred: they show up in the source's error
//! state and make the next read fail.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{SkippedRegion, SourceError};
use crate::varint::{decode_varint, encode_varint};

/// Opaque position token reported by a source.
///
/// Only the kind of source that produced a position can interpret it.
/// Sources that track a single offset can use [`Position::from_offset`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position(Bytes);

impl Position {
    /// Wrap raw position bytes.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Encode a single offset.
    pub fn from_offset(offset: u64) -> Self {
        Self(Bytes::from(encode_varint(offset)))
    }

    /// Decode a position created by [`Position::from_offset`].
    ///
    /// Returns `None` if the bytes are not exactly one varint.
    pub fn to_offset(&self) -> Option<u64> {
        let mut cursor: &[u8] = &self.0;
        let offset = decode_varint(&mut cursor).ok()?;
        cursor.is_empty().then_some(offset)
    }

    /// Raw position bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length of the raw position in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the position is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Bytes> for Position {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

/// Sequential and random access to one file's record stream.
///
/// `read_next` returns `None` both at a clean end of file and on failure;
/// `error()` tells them apart. After a failure, `recover` either skips the
/// damaged region (returning its description and making the source healthy
/// again) or returns `None` when nothing can be recovered.
pub trait RecordSource: Send {
    /// Read the next record.
    fn read_next(&mut self) -> Option<Bytes>;

    /// Skip past the region that made the last read fail.
    ///
    /// Returns `None` if the source is healthy or the failure is fatal.
    fn recover(&mut self) -> Option<SkippedRegion>;

    /// Reposition to a previously reported position.
    ///
    /// Failures are recorded in the error state and surface on the next read.
    fn seek(&mut self, position: &Position);

    /// Position before the next record would be read.
    fn position(&self) -> Position;

    /// Release resources, returning the terminal error if the source is unhealthy.
    fn close(&mut self) -> Result<(), SourceError>;

    /// Current error state, `None` while healthy.
    fn error(&self) -> Option<&SourceError>;

    /// Check if the source is healthy.
    fn is_healthy(&self) -> bool {
        self.error().is_none()
    }
}

/// Opens a [`RecordSource`] for a file identifier.
///
/// Opening never fails directly: a source that could not be opened reports
/// the problem through its error state.
pub trait SourceOpener {
    /// The source type produced by this opener
    type Source: RecordSource;

    /// Open `file` for reading.
    fn open(&self, file: &str) -> Self::Source;
}

impl<F, S> SourceOpener for F
where
    F: Fn(&str) -> S,
    S: RecordSource,
{
    type Source = S;

    fn open(&self, file: &str) -> S {
        self(file)
    }
}

/// A boxed RecordSource for dynamic dispatch
pub type BoxedSource = Box<dyn RecordSource>;

/// Implement RecordSource for BoxedSource to allow using it with generic code
impl RecordSource for BoxedSource {
    fn read_next(&mut self) -> Option<Bytes> {
        (**self).read_next()
    }

    fn recover(&mut self) -> Option<SkippedRegion> {
        (**self).recover()
    }

    fn seek(&mut self, position: &Position) {
        (**self).seek(position)
    }

    fn position(&self) -> Position {
        (**self).position()
    }

    fn close(&mut self) -> Result<(), SourceError> {
        (**self).close()
    }

    fn error(&self) -> Option<&SourceError> {
        (**self).error()
    }
}

/// Adapts an opener so it produces [`BoxedSource`]s.
///
/// Lets iterators over different source kinds share one type.
#[derive(Debug, Clone)]
pub struct BoxedOpener<O>(pub O);

impl<O> SourceOpener for BoxedOpener<O>
where
    O: SourceOpener,
    O::Source: 'static,
{
    type Source = BoxedSource;

    fn open(&self, file: &str) -> BoxedSource {
        Box::new(self.0.open(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_offset_roundtrip() {
        for offset in [0u64, 20, 300, u64::MAX] {
            assert_eq!(Position::from_offset(offset).to_offset(), Some(offset));
        }
    }

    #[test]
    fn test_position_rejects_trailing_bytes() {
        let position = Position::new(vec![0x05, 0x00]);
        assert_eq!(position.to_offset(), None);
        assert_eq!(Position::default().to_offset(), None);
    }

    #[test]
    fn test_position_serde_json() {
        let position = Position::from_offset(1234);
        let json = serde_json::to_string(&position).unwrap();
        let back: Position = serde_json::from_str(&json).unwrap();
        assert_eq!(back, position);
    }
}
