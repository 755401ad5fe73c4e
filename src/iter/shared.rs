//! Thread-safe wrapper around `StreamIterator`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

use super::stream::StreamIterator;
use crate::cursor::Cursor;
use crate::error::{CheckpointError, StreamError};
use crate::source::SourceOpener;

/// A `StreamIterator` that can be shared between threads.
///
/// Every operation runs under one lock, so a `save()` never observes a
/// half-finished `next_record()`. Clones share the same iterator.
pub struct SharedStreamIterator<O: SourceOpener> {
    inner: Arc<Mutex<StreamIterator<O>>>,
}

impl<O: SourceOpener> SharedStreamIterator<O> {
    /// Wrap `iterator` for shared use.
    pub fn new(iterator: StreamIterator<O>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(iterator)),
        }
    }

    // Only caller code run by `with_lock` can poison the lock; iterator
    // operations never leave it half-updated.
    fn lock(&self) -> MutexGuard<'_, StreamIterator<O>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// See [`StreamIterator::next_record`].
    pub fn next_record(&self) -> Result<Option<Bytes>, StreamError> {
        self.lock().next_record()
    }

    /// See [`StreamIterator::save`].
    pub fn save(&self) -> Cursor {
        self.lock().save()
    }

    /// See [`StreamIterator::restore`].
    pub fn restore(&self, cursor: &Cursor) -> Result<(), CheckpointError> {
        self.lock().restore(cursor)
    }

    /// See [`StreamIterator::save_bytes`].
    pub fn save_bytes(&self) -> Vec<u8> {
        self.lock().save_bytes()
    }

    /// See [`StreamIterator::restore_bytes`].
    pub fn restore_bytes(&self, bytes: &[u8]) -> Result<(), CheckpointError> {
        self.lock().restore_bytes(bytes)
    }

    /// Run `f` with exclusive access to the iterator.
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut StreamIterator<O>) -> R) -> R {
        f(&mut self.lock())
    }

    /// Unwrap the iterator if this is the last handle.
    pub fn into_inner(self) -> Option<StreamIterator<O>> {
        Arc::try_unwrap(self.inner)
            .ok()
            .map(|mutex| mutex.into_inner().unwrap_or_else(PoisonError::into_inner))
    }
}

impl<O: SourceOpener> Clone for SharedStreamIterator<O> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<O: SourceOpener> From<StreamIterator<O>> for SharedStreamIterator<O> {
    fn from(iterator: StreamIterator<O>) -> Self {
        Self::new(iterator)
    }
}

impl<O: SourceOpener> std::fmt::Debug for SharedStreamIterator<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SharedStreamIterator").field(&*self.lock()).finish()
    }
}
