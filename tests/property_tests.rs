//! Property-based tests for recordchain.
//!
//! These tests use proptest to check iteration and checkpoint properties
//! over generated file layouts.

use proptest::prelude::*;

use bytes::Bytes;
use recordchain::source::{MemoryFile, MemoryOpener, Position};
use recordchain::varint::{decode_varint, encode_varint, varint_len};
use recordchain::{Cursor, FileList, StreamError, StreamIterator};

// ============================================================================
// Generators
// ============================================================================

/// One entry of a generated file.
#[derive(Debug, Clone)]
enum Entry {
    Record(Vec<u8>),
    Corrupt,
}

fn arb_entry() -> impl Strategy<Value = Entry> {
    prop_oneof![
        4 => prop::collection::vec(any::<u8>(), 0..16).prop_map(Entry::Record),
        1 => Just(Entry::Corrupt),
    ]
}

/// Generate up to 5 files of up to 8 entries each.
fn arb_files() -> impl Strategy<Value = Vec<Vec<Entry>>> {
    prop::collection::vec(prop::collection::vec(arb_entry(), 0..8), 0..5)
}

fn arb_cursor() -> impl Strategy<Value = Cursor> {
    (
        any::<u64>(),
        prop::option::of(prop::collection::vec(any::<u8>(), 0..32)),
    )
        .prop_map(|(file_index, position)| Cursor {
            file_index,
            position: position.map(Position::new),
        })
}

fn build(files: &[Vec<Entry>]) -> StreamIterator<MemoryOpener> {
    let mut opener = MemoryOpener::new();
    let mut names = Vec::new();
    for (i, entries) in files.iter().enumerate() {
        let name = format!("file-{}", i);
        let file = entries
            .iter()
            .fold(MemoryFile::new(), |file, entry| match entry {
                Entry::Record(bytes) => file.record(bytes.clone()),
                Entry::Corrupt => file.corrupt("generated corruption"),
            });
        opener.insert(name.clone(), file);
        names.push(name);
    }
    StreamIterator::new(FileList::new(names), opener)
}

fn drain(iter: &mut StreamIterator<MemoryOpener>) -> Vec<Result<Bytes, String>> {
    iter.by_ref()
        .map(|item| item.map_err(|err: StreamError| err.to_string()))
        .collect()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Iteration yields the concatenation of each file's records.
    #[test]
    fn prop_records_are_concatenation(files in arb_files()) {
        let expected: Vec<Bytes> = files
            .iter()
            .flatten()
            .filter_map(|entry| match entry {
                Entry::Record(bytes) => Some(Bytes::from(bytes.clone())),
                Entry::Corrupt => None,
            })
            .collect();

        let mut iter = build(&files);
        let records: Vec<Bytes> = drain(&mut iter).into_iter().filter_map(Result::ok).collect();
        prop_assert_eq!(records, expected);
        prop_assert!(iter.is_finished());
    }

    /// Each run of corrupt entries yields exactly one data-loss notification.
    #[test]
    fn prop_one_notification_per_corrupt_run(files in arb_files()) {
        let expected_runs: usize = files
            .iter()
            .map(|entries| {
                entries
                    .iter()
                    .enumerate()
                    .filter(|(i, entry)| {
                        matches!(entry, Entry::Corrupt)
                            && (*i == 0 || !matches!(entries[i - 1], Entry::Corrupt))
                    })
                    .count()
            })
            .sum();

        let mut iter = build(&files);
        let notifications = drain(&mut iter).into_iter().filter(Result::is_err).count();
        prop_assert_eq!(notifications, expected_runs);
        prop_assert_eq!(iter.stats().data_loss_events as usize, expected_runs);
    }

    /// Restoring a saved cursor into a fresh iterator reproduces the rest of the scan.
    #[test]
    fn prop_save_restore_equivalence(files in arb_files(), steps in 0usize..50) {
        let mut original = build(&files);
        for _ in 0..steps {
            if original.next().is_none() {
                break;
            }
        }
        let checkpoint = original.save_bytes();

        let mut resumed = build(&files);
        resumed.restore_bytes(&checkpoint).unwrap();
        prop_assert_eq!(drain(&mut resumed), drain(&mut original));
    }

    /// Cursor encoding is lossless.
    #[test]
    fn prop_cursor_roundtrip(cursor in arb_cursor()) {
        prop_assert_eq!(Cursor::decode(&cursor.encode()), Ok(cursor));
    }

    /// Any single-byte change to an encoded cursor is rejected.
    #[test]
    fn prop_cursor_detects_corruption(cursor in arb_cursor(), index in any::<prop::sample::Index>(), flip in 1u8..=255) {
        let mut bytes = cursor.encode();
        let i = index.index(bytes.len());
        bytes[i] ^= flip;
        prop_assert!(Cursor::decode(&bytes).is_err());
    }

    /// Varints decode to the encoded value and use the predicted length.
    #[test]
    fn prop_varint_roundtrip(value in any::<u64>()) {
        let encoded = encode_varint(value);
        prop_assert_eq!(encoded.len(), varint_len(value));
        let mut slice = encoded.as_slice();
        prop_assert_eq!(decode_varint(&mut slice), Ok(value));
        prop_assert!(slice.is_empty());
    }
}
