//! Cursor codec
//!
//! A cursor is the resume point of a stream iterator: the index of the
//! current file plus, when a file was open, the source position of the next
//! unread record. The binary form is:
//! - Magic bytes ("RCC") followed by the codec version byte
//! - Flags byte (bit 0: position present)
//! - File index (varint)
//! - Position length (varint) and bytes, if present
//! - CRC32 of everything above (little-endian)

use serde::{Deserialize, Serialize};

use crate::error::CursorError;
use crate::source::Position;
use crate::varint::{decode_varint, put_varint, MAX_VARINT_LEN};

/// Magic bytes identifying a serialized cursor
pub const CURSOR_MAGIC: [u8; 3] = [b'R', b'C', b'C'];

/// Current codec version
pub const CURSOR_VERSION: u8 = 1;

const FLAG_HAS_POSITION: u8 = 0x01;
const KNOWN_FLAGS: u8 = FLAG_HAS_POSITION;
const CRC_SIZE: usize = 4;

/// Resume point of a stream iterator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor {
    /// Index of the current file; equal to the file count at end of sequence
    pub file_index: u64,
    /// Position of the next unread record, present only while a file is open
    pub position: Option<Position>,
}

impl Cursor {
    /// Cursor for a point between files (no file open).
    pub fn at_file(file_index: u64) -> Self {
        Self {
            file_index,
            position: None,
        }
    }

    /// Cursor inside an open file.
    pub fn within_file(file_index: u64, position: Position) -> Self {
        Self {
            file_index,
            position: Some(position),
        }
    }

    /// Serialize the cursor.
    pub fn encode(&self) -> Vec<u8> {
        let position_len = self.position.as_ref().map_or(0, |p| p.len() + MAX_VARINT_LEN);
        let mut out =
            Vec::with_capacity(CURSOR_MAGIC.len() + 2 + MAX_VARINT_LEN + position_len + CRC_SIZE);

        out.extend_from_slice(&CURSOR_MAGIC);
        out.push(CURSOR_VERSION);
        out.push(if self.position.is_some() {
            FLAG_HAS_POSITION
        } else {
            0
        });
        put_varint(&mut out, self.file_index);
        if let Some(position) = &self.position {
            put_varint(&mut out, position.len() as u64);
            out.extend_from_slice(position.as_bytes());
        }

        let crc = crc32fast::hash(&out);
        out.extend_from_slice(&crc.to_le_bytes());
        out
    }

    /// Deserialize a cursor produced by [`Cursor::encode`].
    ///
    /// # Errors
    /// - `CursorError::InvalidMagic` / `UnsupportedVersion` for foreign data
    /// - `CursorError::ChecksumMismatch` if the bytes were altered
    /// - `CursorError::UnexpectedEof`, `InvalidVarint`, `UnknownFlags`,
    ///   `PositionTooLong`, `TrailingBytes` for malformed content
    pub fn decode(bytes: &[u8]) -> Result<Self, CursorError> {
        let mut cursor = bytes;

        let magic = take(&mut cursor, CURSOR_MAGIC.len())?;
        if magic != CURSOR_MAGIC {
            let mut found = [0u8; 3];
            found.copy_from_slice(magic);
            return Err(CursorError::InvalidMagic(found));
        }

        let version = take(&mut cursor, 1)?[0];
        if version != CURSOR_VERSION {
            return Err(CursorError::UnsupportedVersion(version));
        }

        let flags = take(&mut cursor, 1)?[0];
        if flags & !KNOWN_FLAGS != 0 {
            return Err(CursorError::UnknownFlags(flags));
        }

        let file_index = decode_varint(&mut cursor)?;

        let position = if flags & FLAG_HAS_POSITION != 0 {
            let len = decode_varint(&mut cursor)?;
            if len > cursor.len().saturating_sub(CRC_SIZE) as u64 {
                return Err(CursorError::PositionTooLong(len));
            }
            Some(Position::new(take(&mut cursor, len as usize)?.to_vec()))
        } else {
            None
        };

        let payload_len = bytes.len() - cursor.len();
        let crc_bytes = take(&mut cursor, CRC_SIZE)?;
        if !cursor.is_empty() {
            return Err(CursorError::TrailingBytes(cursor.len()));
        }

        let expected = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        let actual = crc32fast::hash(&bytes[..payload_len]);
        if expected != actual {
            return Err(CursorError::ChecksumMismatch { expected, actual });
        }

        Ok(Self {
            file_index,
            position,
        })
    }
}

fn take<'a>(cursor: &mut &'a [u8], len: usize) -> Result<&'a [u8], CursorError> {
    if cursor.len() < len {
        return Err(CursorError::UnexpectedEof);
    }
    let (head, rest) = cursor.split_at(len);
    *cursor = rest;
    Ok(head)
}
