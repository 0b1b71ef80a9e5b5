//! Fixed-field decoding of a single sound record

use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;

use super::{FILE_SIZE_OFFSET, OVERRIDE_FX_OFFSET, RECORD_LEN, SOUND_ID_OFFSET, SOURCE_ID_OFFSET};

/// A sound record located inside a SoundBank buffer
///
/// This is a snapshot of the buffer at parse time. It is never stored apart
/// from the buffer it came from; re-parse after patching to see new values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SoundEntry {
    /// Byte offset of the record start within the buffer
    pub offset: usize,
    /// Sound object ID
    pub sound_id: u32,
    /// ID of the referenced media source
    pub source_id: u32,
    /// Size of the referenced media in bytes
    pub file_size: u32,
    /// Whether the sound overrides its parent's effects
    pub override_fx: bool,
}

/// Decode the record starting at `record_start`
///
/// Returns `None` if the record would run past the end of the buffer.
#[must_use]
pub fn parse_entry(buffer: &[u8], record_start: usize) -> Option<SoundEntry> {
    let end = record_start.checked_add(RECORD_LEN)?;
    let record = buffer.get(record_start..end)?;

    Some(SoundEntry {
        offset: record_start,
        sound_id: LittleEndian::read_u32(&record[SOUND_ID_OFFSET..SOUND_ID_OFFSET + 4]),
        source_id: LittleEndian::read_u32(&record[SOURCE_ID_OFFSET..SOURCE_ID_OFFSET + 4]),
        file_size: LittleEndian::read_u32(&record[FILE_SIZE_OFFSET..FILE_SIZE_OFFSET + 4]),
        override_fx: record[OVERRIDE_FX_OFFSET] != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fields() {
        let mut buf = vec![0u8; 32];
        buf[2..6].copy_from_slice(&7u32.to_le_bytes());
        buf[11..15].copy_from_slice(&1234u32.to_le_bytes());
        buf[15..19].copy_from_slice(&2000u32.to_le_bytes());
        buf[20] = 3;

        let entry = parse_entry(&buf, 2).unwrap();
        assert_eq!(entry.offset, 2);
        assert_eq!(entry.sound_id, 7);
        assert_eq!(entry.source_id, 1234);
        assert_eq!(entry.file_size, 2000);
        assert!(entry.override_fx);
    }

    #[test]
    fn test_out_of_bounds() {
        let buf = vec![0u8; 19];
        assert!(parse_entry(&buf, 0).is_some());
        assert!(parse_entry(&buf, 1).is_none());
        assert!(parse_entry(&buf, usize::MAX).is_none());
    }
}
