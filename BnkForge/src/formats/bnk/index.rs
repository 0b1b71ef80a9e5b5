//! Signature scanning and the source ID index

use std::collections::HashMap;
use std::fmt;

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use super::entry::{SoundEntry, parse_entry};
use super::{RECORD_LEN, SIGNATURE_LEN, SIGNATURE_OFFSET, SOURCE_ID_OFFSET};

/// The byte pattern that precedes the source ID of a sound record
///
/// The default is the Wwise Vorbis plugin ID (`0x00040001`, LE) followed by
/// the "streamed" source type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(pub [u8; SIGNATURE_LEN]);

impl Signature {
    /// Vorbis plugin, streamed source
    pub const VORBIS_STREAMED: Self = Self([0x01, 0x00, 0x04, 0x00, 0x02]);

    /// Vorbis plugin, data embedded in the bank
    pub const VORBIS_EMBEDDED: Self = Self([0x01, 0x00, 0x04, 0x00, 0x00]);

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self::VORBIS_STREAMED
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Map of source ID to every record offset that references it
///
/// Built by a single linear scan. It is an exact inverse of that scan and
/// must be rebuilt whenever the buffer is replaced.
#[derive(Debug, Clone, Default)]
pub struct EntryIndex {
    /// Source ID → record offsets, in ascending buffer order
    offsets: HashMap<u32, Vec<usize>>,
    /// Source ID → number of signature hits whose record runs past EOF
    truncated: HashMap<u32, usize>,
    /// Total number of complete records
    record_count: usize,
    /// Length of the buffer the index was built from
    buffer_len: usize,
    signature: Signature,
}

impl EntryIndex {
    /// Record offsets for a source ID, in buffer order
    #[must_use]
    pub fn offsets(&self, source_id: u32) -> &[usize] {
        self.offsets.get(&source_id).map_or(&[], Vec::as_slice)
    }

    /// Number of truncated candidates seen for a source ID
    #[must_use]
    pub fn truncated_count(&self, source_id: u32) -> usize {
        self.truncated.get(&source_id).copied().unwrap_or(0)
    }

    /// Whether any complete record references the source ID
    #[must_use]
    pub fn contains(&self, source_id: u32) -> bool {
        self.offsets.contains_key(&source_id)
    }

    /// Total number of complete records
    #[must_use]
    pub fn len(&self) -> usize {
        self.record_count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }

    /// Number of distinct source IDs
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.offsets.len()
    }

    /// Distinct source IDs, sorted ascending
    #[must_use]
    pub fn source_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.offsets.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Every record offset, sorted ascending
    #[must_use]
    pub fn all_offsets(&self) -> Vec<usize> {
        let mut all: Vec<usize> = self.offsets.values().flatten().copied().collect();
        all.sort_unstable();
        all
    }

    /// Length of the buffer this index describes
    #[must_use]
    pub fn buffer_len(&self) -> usize {
        self.buffer_len
    }

    /// Signature used to build the index
    #[must_use]
    pub fn signature(&self) -> Signature {
        self.signature
    }
}

/// Scan a buffer for sound records
///
/// Signature hits whose record would start before the buffer or end past it
/// are skipped rather than treated as errors. Hits that are not real records
/// are tolerated; no field plausibility checks happen at this layer.
#[must_use]
pub fn build_index(buffer: &[u8], signature: Signature) -> EntryIndex {
    let start = std::time::Instant::now();
    let mut index = EntryIndex {
        buffer_len: buffer.len(),
        signature,
        ..EntryIndex::default()
    };

    if buffer.len() < SIGNATURE_LEN {
        return index;
    }

    let pattern = signature.as_bytes();
    let mut skipped = 0usize;

    for (sig_offset, window) in buffer.windows(SIGNATURE_LEN).enumerate() {
        if window != pattern {
            continue;
        }

        let Some(record_start) = sig_offset.checked_sub(SIGNATURE_OFFSET) else {
            skipped += 1;
            continue;
        };

        let source_pos = record_start + SOURCE_ID_OFFSET;
        if record_start + RECORD_LEN <= buffer.len() {
            let source_id = LittleEndian::read_u32(&buffer[source_pos..source_pos + 4]);
            index.offsets.entry(source_id).or_default().push(record_start);
            index.record_count += 1;
        } else {
            skipped += 1;
            if source_pos + 4 <= buffer.len() {
                let source_id = LittleEndian::read_u32(&buffer[source_pos..source_pos + 4]);
                *index.truncated.entry(source_id).or_default() += 1;
            }
            tracing::debug!("Skipping truncated record candidate at {:#x}", record_start);
        }
    }

    tracing::debug!(
        "Indexed {} records ({} sources, {} skipped) in {:.2}ms",
        index.record_count,
        index.offsets.len(),
        skipped,
        start.elapsed().as_secs_f64() * 1000.0
    );

    index
}

/// Parse every record that references `source_id`
///
/// With `expected_size`, only records whose current file size equals it are
/// returned. This separates records already patched from those still holding
/// the old value.
#[must_use]
pub fn find_by_source_id(
    buffer: &[u8],
    index: &EntryIndex,
    source_id: u32,
    expected_size: Option<u32>,
) -> Vec<SoundEntry> {
    index
        .offsets(source_id)
        .iter()
        .filter_map(|&offset| parse_entry(buffer, offset))
        .filter(|entry| expected_size.is_none_or(|size| entry.file_size == size))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(sound_id: u32, source_id: u32, file_size: u32) -> Vec<u8> {
        let mut rec = Vec::with_capacity(RECORD_LEN);
        rec.extend_from_slice(&sound_id.to_le_bytes());
        rec.extend_from_slice(Signature::default().as_bytes());
        rec.extend_from_slice(&source_id.to_le_bytes());
        rec.extend_from_slice(&file_size.to_le_bytes());
        rec.push(0);
        rec.push(0);
        rec
    }

    #[test]
    fn test_index_multiple_sources() {
        let mut buf = vec![0xAAu8; 10];
        buf.extend(record(1, 100, 50));
        buf.extend(vec![0u8; 7]);
        buf.extend(record(2, 200, 60));
        buf.extend(record(3, 100, 70));

        let index = build_index(&buf, Signature::default());
        assert_eq!(index.len(), 3);
        assert_eq!(index.source_count(), 2);
        assert_eq!(index.offsets(100), &[10, 10 + 19 + 7 + 19]);
        assert_eq!(index.offsets(200), &[10 + 19 + 7]);
        assert_eq!(index.source_ids(), vec![100, 200]);
    }

    #[test]
    fn test_truncated_record_is_skipped() {
        let mut buf = vec![0u8; 8];
        let rec = record(1, 42, 300);
        // Drop the flag bytes so the record runs past EOF
        buf.extend_from_slice(&rec[..RECORD_LEN - 2]);

        let index = build_index(&buf, Signature::default());
        assert!(index.is_empty());
        assert!(!index.contains(42));
        assert_eq!(index.truncated_count(42), 1);
    }

    #[test]
    fn test_signature_too_close_to_start() {
        // Signature at offset 2 would put the record start at -2
        let mut buf = vec![0u8; 2];
        buf.extend_from_slice(Signature::default().as_bytes());
        buf.extend(vec![0u8; 20]);

        let index = build_index(&buf, Signature::default());
        assert!(index.is_empty());
    }

    #[test]
    fn test_find_with_expected_size() {
        let mut buf = record(1, 42, 300);
        buf.extend(record(2, 42, 400));
        let index = build_index(&buf, Signature::default());

        assert_eq!(find_by_source_id(&buf, &index, 42, None).len(), 2);
        let filtered = find_by_source_id(&buf, &index, 42, Some(400));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].sound_id, 2);
        assert!(find_by_source_id(&buf, &index, 43, None).is_empty());
    }

    #[test]
    fn test_custom_signature() {
        let sig = Signature::VORBIS_EMBEDDED;
        let mut buf = 9u32.to_le_bytes().to_vec();
        buf.extend_from_slice(sig.as_bytes());
        buf.extend_from_slice(&5u32.to_le_bytes());
        buf.extend_from_slice(&10u32.to_le_bytes());
        buf.extend_from_slice(&[0, 1]);

        assert!(build_index(&buf, Signature::default()).is_empty());
        let index = build_index(&buf, sig);
        assert_eq!(index.offsets(5), &[0]);
    }

    #[test]
    fn test_signature_display() {
        assert_eq!(Signature::default().to_string(), "01 00 04 00 02");
    }
}
