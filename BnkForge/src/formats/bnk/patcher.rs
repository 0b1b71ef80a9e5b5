//! In-place fixed-width field mutation

use byteorder::{ByteOrder, LittleEndian};

use super::index::{EntryIndex, find_by_source_id};
use super::{FILE_SIZE_OFFSET, OVERRIDE_FX_OFFSET};

/// A mutation of every record referencing one source ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PatchRequest {
    pub source_id: u32,
    /// New file size; values above `u32::MAX` are rejected for this field only
    pub new_size: Option<u64>,
    /// New override-FX flag
    pub override_fx: Option<bool>,
    /// Only touch records whose current file size equals this
    pub expected_size: Option<u32>,
}

impl PatchRequest {
    #[must_use]
    pub fn new(source_id: u32) -> Self {
        Self {
            source_id,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn size(mut self, new_size: u64) -> Self {
        self.new_size = Some(new_size);
        self
    }

    #[must_use]
    pub fn override_fx(mut self, flag: bool) -> Self {
        self.override_fx = Some(flag);
        self
    }

    #[must_use]
    pub fn expect_size(mut self, size: u32) -> Self {
        self.expected_size = Some(size);
        self
    }
}

/// What a patch call actually did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    pub source_id: u32,
    /// Offsets of every record the request matched
    pub offsets: Vec<usize>,
    /// Whether the size field was written to every matched record
    pub size_written: bool,
    /// Whether the flag byte was written to every matched record
    pub flag_written: bool,
    /// A requested size that did not fit the 32-bit field
    pub overflow: Option<u64>,
}

impl PatchOutcome {
    /// Whether any record matched the request
    #[must_use]
    pub fn matched(&self) -> bool {
        !self.offsets.is_empty()
    }

    /// Whether every requested field was written
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.matched() && self.overflow.is_none()
    }

    /// Whether the buffer was modified in any way
    #[must_use]
    pub fn wrote_anything(&self) -> bool {
        self.size_written || self.flag_written
    }
}

/// Apply a patch request to every matching record
///
/// The buffer is a slice, so its length cannot change. When nothing matches,
/// the buffer is left untouched. A size that overflows the field skips the
/// size writes but still applies the flag.
pub fn patch(buffer: &mut [u8], index: &EntryIndex, request: &PatchRequest) -> PatchOutcome {
    let offsets: Vec<usize> =
        find_by_source_id(buffer, index, request.source_id, request.expected_size)
            .iter()
            .map(|entry| entry.offset)
            .collect();

    let mut outcome = PatchOutcome {
        source_id: request.source_id,
        offsets,
        size_written: false,
        flag_written: false,
        overflow: None,
    };

    if !outcome.matched() {
        tracing::debug!(
            "No records matched source {} (expected size {:?})",
            request.source_id,
            request.expected_size
        );
        return outcome;
    }

    let size_bytes = match request.new_size.map(u32::try_from) {
        Some(Ok(size)) => Some(size),
        Some(Err(_)) => {
            let value = request.new_size.unwrap_or_default();
            tracing::warn!(
                "Size {} for source {} exceeds the 32-bit field, size not written",
                value,
                request.source_id
            );
            outcome.overflow = Some(value);
            None
        }
        None => None,
    };

    for &offset in &outcome.offsets {
        if let Some(size) = size_bytes {
            let pos = offset + FILE_SIZE_OFFSET;
            LittleEndian::write_u32(&mut buffer[pos..pos + 4], size);
        }
        if let Some(flag) = request.override_fx {
            buffer[offset + OVERRIDE_FX_OFFSET] = u8::from(flag);
        }
    }

    outcome.size_written = size_bytes.is_some();
    outcome.flag_written = request.override_fx.is_some();

    tracing::debug!(
        "Patched source {} at {} offset(s): size={:?} override_fx={:?}",
        request.source_id,
        outcome.offsets.len(),
        size_bytes,
        request.override_fx
    );

    outcome
}
