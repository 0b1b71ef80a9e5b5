//! High-level SoundBank operations

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::SearchConfig;
use crate::encode::{
    CancelToken, ConversionCache, EncodeRequest, EncodedResult, Encoder, ProgressCallback,
};
use crate::error::{Error, Result};
use crate::formats::bnk::{PatchOutcome, PatchRequest, Signature, SoundBank, SoundEntry};

/// Extension of replacement artifacts written by [`BankOperations::replace_source`]
pub const REPLACEMENT_EXTENSION: &str = "wem";

/// Occurrences of one source ID in a bank
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub source_id: u32,
    /// Number of records referencing the source
    pub occurrences: usize,
    /// Distinct file sizes recorded for it, ascending
    pub sizes: Vec<u32>,
}

/// Replace one streamed source with new audio
#[derive(Debug, Clone)]
pub struct ReplaceRequest {
    pub source_id: u32,
    /// Replacement audio
    pub audio: PathBuf,
    /// Directory receiving `<source_id>.wem`
    pub output_dir: PathBuf,
    /// Flag to write on every matching record, if any
    pub override_fx: Option<bool>,
    pub adaptive: bool,
}

impl ReplaceRequest {
    #[must_use]
    pub fn new(source_id: u32, audio: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_id,
            audio: audio.into(),
            output_dir: output_dir.into(),
            override_fx: None,
            adaptive: true,
        }
    }

    #[must_use]
    pub fn override_fx(mut self, flag: bool) -> Self {
        self.override_fx = Some(flag);
        self
    }

    #[must_use]
    pub fn adaptive(mut self, adaptive: bool) -> Self {
        self.adaptive = adaptive;
        self
    }

    /// `<output_dir>/<source_id>.wem`
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}.{REPLACEMENT_EXTENSION}", self.source_id))
    }
}

/// Outcome of a replacement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceResult {
    pub source_id: u32,
    /// Size taken from the bank record
    pub target_size: u32,
    /// Records referencing the source
    pub records: usize,
    pub encoded: EncodedResult,
    /// Flag patch applied in memory, if one was requested
    pub flag_patch: Option<PatchOutcome>,
}

/// Entry points for SoundBank work
pub struct BankOperations;

impl BankOperations {
    /// Load a bank and return every complete record in buffer order
    pub fn locate_entries<P: AsRef<Path>>(path: P, signature: Signature) -> Result<Vec<SoundEntry>> {
        let start = std::time::Instant::now();
        let mut bank = SoundBank::open_with_signature(path.as_ref(), signature)?;
        let entries = bank.entries();
        tracing::info!(
            "Located {} records in {} ({:.1} ms)",
            entries.len(),
            path.as_ref().display(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(entries)
    }

    /// Records for one source ID, optionally filtered by current size
    pub fn find_source<P: AsRef<Path>>(
        path: P,
        signature: Signature,
        source_id: u32,
        expected_size: Option<u32>,
    ) -> Result<Vec<SoundEntry>> {
        let mut bank = SoundBank::open_with_signature(path, signature)?;
        bank.find(source_id, expected_size)
    }

    /// Group records by source ID
    #[must_use]
    pub fn summarize(entries: &[SoundEntry]) -> Vec<SourceSummary> {
        let mut grouped: BTreeMap<u32, (usize, Vec<u32>)> = BTreeMap::new();
        for entry in entries {
            let (count, sizes) = grouped.entry(entry.source_id).or_default();
            *count += 1;
            if !sizes.contains(&entry.file_size) {
                sizes.push(entry.file_size);
            }
        }

        grouped
            .into_iter()
            .map(|(source_id, (occurrences, mut sizes))| {
                sizes.sort_unstable();
                SourceSummary {
                    source_id,
                    occurrences,
                    sizes,
                }
            })
            .collect()
    }

    /// Patch a bank file in place
    ///
    /// The file is rewritten only if a field was written. A size that
    /// overflows the field is reported in the outcome when the flag write of
    /// the same request still went through; with nothing else to write it is
    /// [`Error::SizeOverflow`] and the file is left alone.
    pub fn patch_entry<P: AsRef<Path>>(
        path: P,
        signature: Signature,
        request: &PatchRequest,
    ) -> Result<PatchOutcome> {
        let mut bank = SoundBank::open_with_signature(path, signature)?;
        let outcome = bank.patch(request);

        if !outcome.matched() {
            // Distinguishes truncated candidates from a plain miss
            bank.find(request.source_id, request.expected_size)?;
            return Err(Error::SourceNotFound {
                source_id: request.source_id,
            });
        }

        if let Some(value) = outcome.overflow.filter(|_| !outcome.wrote_anything()) {
            return Err(Error::SizeOverflow { value });
        }

        if bank.is_dirty() {
            bank.save()?;
        }
        Ok(outcome)
    }

    /// Render a record listing or source summary as pretty-printed JSON
    pub fn to_json<T: Serialize + ?Sized>(listing: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(listing)?)
    }

    /// Encode audio to exactly `request.target_size` bytes
    pub fn encode_to_size(
        encoder: &dyn Encoder,
        cache: &mut ConversionCache,
        settings: &SearchConfig,
        request: &EncodeRequest,
        cancel: &CancelToken,
        progress: ProgressCallback<'_>,
    ) -> Result<EncodedResult> {
        crate::encode::encode_to_size(encoder, cache, settings, request, cancel, progress)
    }

    /// Replace a source inside an open bank session
    ///
    /// The target size comes from the first matching record. Only the flag
    /// is patched (in memory); saving is left to the caller so a batch
    /// writes the bank once.
    pub fn replace_in_bank(
        bank: &mut SoundBank,
        encoder: &dyn Encoder,
        cache: &mut ConversionCache,
        settings: &SearchConfig,
        request: &ReplaceRequest,
        cancel: &CancelToken,
        progress: ProgressCallback<'_>,
    ) -> Result<ReplaceResult> {
        let records = bank.find(request.source_id, None)?;
        let Some(first) = records.first() else {
            return Err(Error::SourceNotFound {
                source_id: request.source_id,
            });
        };
        let target_size = first.file_size;

        if records.iter().any(|r| r.file_size != target_size) {
            tracing::warn!(
                "Records for source {} disagree on size; using {} from offset {}",
                request.source_id,
                target_size,
                first.offset
            );
        }

        let encode = EncodeRequest::new(&request.audio, u64::from(target_size), request.output_path())
            .adaptive(request.adaptive);
        let encoded =
            crate::encode::encode_to_size(encoder, cache, settings, &encode, cancel, progress)?;

        let flag_patch = request
            .override_fx
            .map(|flag| bank.patch(&PatchRequest::new(request.source_id).override_fx(flag)));

        Ok(ReplaceResult {
            source_id: request.source_id,
            target_size,
            records: records.len(),
            encoded,
            flag_patch,
        })
    }

    /// Replace a source and save the bank if its flag changed
    pub fn replace_source<P: AsRef<Path>>(
        bank_path: P,
        signature: Signature,
        encoder: &dyn Encoder,
        cache: &mut ConversionCache,
        settings: &SearchConfig,
        request: &ReplaceRequest,
        cancel: &CancelToken,
        progress: ProgressCallback<'_>,
    ) -> Result<ReplaceResult> {
        let mut bank = SoundBank::open_with_signature(bank_path, signature)?;
        let result =
            Self::replace_in_bank(&mut bank, encoder, cache, settings, request, cancel, progress)?;
        if bank.is_dirty() {
            bank.save()?;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(source_id: u32, file_size: u32, offset: usize) -> SoundEntry {
        SoundEntry {
            offset,
            sound_id: 1,
            source_id,
            file_size,
            override_fx: false,
        }
    }

    #[test]
    fn test_summarize() {
        let entries = [entry(9, 100, 0), entry(3, 5, 40), entry(9, 100, 80), entry(9, 120, 120)];
        let summary = BankOperations::summarize(&entries);
        assert_eq!(
            summary,
            vec![
                SourceSummary {
                    source_id: 3,
                    occurrences: 1,
                    sizes: vec![5]
                },
                SourceSummary {
                    source_id: 9,
                    occurrences: 3,
                    sizes: vec![100, 120]
                },
            ]
        );
    }

    #[test]
    fn test_summary_json() {
        let summary = BankOperations::summarize(&[entry(9, 100, 0), entry(9, 120, 80)]);
        let json = BankOperations::to_json(&summary).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["source_id"], 9);
        assert_eq!(value[0]["occurrences"], 2);
        assert_eq!(value[0]["sizes"], serde_json::json!([100, 120]));
    }

    #[test]
    fn test_output_path() {
        let request = ReplaceRequest::new(613_287_406, "a.wav", "/out");
        assert_eq!(request.output_path(), PathBuf::from("/out/613287406.wem"));
    }
}
