//! Conversion cache for encoder probes
//!
//! Memoizes encoder invocations by `(input path, quality)`. The cache never
//! looks at file contents: if an input changes on disk, stale results are
//! returned until the caller clears the cache. Batch runners clear it once
//! at the start of each batch.
//!
//! ## Usage Pattern
//!
//! ```ignore
//! let mut cache = ConversionCache::new();
//!
//! // Probes go through the cache; repeated (input, quality) pairs are free
//! let attempt = cache.get_or_encode(&encoder, &input, 4, None, &work_dir, &cancel)?;
//!
//! // New batch: drop everything
//! cache.clear();
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::Result;

use super::encoder::Encoder;
use super::progress::CancelToken;

/// One completed encoder probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeAttempt {
    /// Input that was encoded
    pub input: PathBuf,
    /// Quality value used
    pub quality: i32,
    /// Sample rate of the input (`None` = the untouched source)
    pub sample_rate: Option<u32>,
    /// Size of the artifact in bytes
    pub size: u64,
    /// Where the artifact was kept
    pub path: PathBuf,
}

/// Cache key: input path and quality
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    input: PathBuf,
    quality: i32,
}

impl CacheKey {
    fn new(input: &Path, quality: i32) -> Self {
        Self {
            input: input.to_path_buf(),
            quality,
        }
    }
}

/// Cache statistics for debugging
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    /// Entries dropped because their artifact disappeared
    pub stale: usize,
}

/// In-memory memo of encoder invocations
#[derive(Debug, Default)]
pub struct ConversionCache {
    entries: HashMap<CacheKey, EncodeAttempt>,
    stats: CacheStats,
}

impl ConversionCache {
    /// Create a new empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a previous probe
    ///
    /// An entry whose artifact no longer exists (its job directory was
    /// removed) is dropped and reported as a miss.
    pub fn get(&mut self, input: &Path, quality: i32) -> Option<EncodeAttempt> {
        let key = CacheKey::new(input, quality);

        match self.entries.get(&key) {
            Some(attempt) if attempt.path.exists() => {
                self.stats.hits += 1;
                Some(attempt.clone())
            }
            Some(_) => {
                self.entries.remove(&key);
                self.stats.stale += 1;
                self.stats.misses += 1;
                None
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Check if a probe is cached without touching statistics
    #[must_use]
    pub fn contains(&self, input: &Path, quality: i32) -> bool {
        self.entries.contains_key(&CacheKey::new(input, quality))
    }

    /// Record a probe result
    pub fn insert(&mut self, attempt: EncodeAttempt) {
        let key = CacheKey::new(&attempt.input, attempt.quality);
        self.entries.insert(key, attempt);
    }

    /// Return the cached probe, or run the encoder and cache the result
    ///
    /// Returns the attempt and whether it came from the cache. The encoder's
    /// artifact is renamed to a quality-specific name so the next probe on
    /// the same input cannot overwrite it.
    pub fn get_or_encode(
        &mut self,
        encoder: &dyn Encoder,
        input: &Path,
        quality: i32,
        sample_rate: Option<u32>,
        out_dir: &Path,
        cancel: &CancelToken,
    ) -> Result<(EncodeAttempt, bool)> {
        if let Some(hit) = self.get(input, quality) {
            tracing::debug!("Cache hit: {} q={} ({} bytes)", input.display(), quality, hit.size);
            return Ok((hit, true));
        }

        let artifact = encoder.encode(input, quality, out_dir, cancel)?;
        let kept = keep_path(&artifact.path, quality);
        std::fs::rename(&artifact.path, &kept)?;

        let attempt = EncodeAttempt {
            input: input.to_path_buf(),
            quality,
            sample_rate,
            size: artifact.size,
            path: kept,
        };
        self.insert(attempt.clone());
        Ok((attempt, false))
    }

    /// Drop every entry for one input
    pub fn invalidate(&mut self, input: &Path) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.input != input);
        before - self.entries.len()
    }

    /// Clear all cached probes
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Get the number of cached probes
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get cache statistics
    #[must_use]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

/// `<dir>/<stem>.q<quality>.<ext>` next to the encoder's artifact
fn keep_path(artifact: &Path, quality: i32) -> PathBuf {
    let stem = artifact
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = artifact
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    artifact.with_file_name(format!("{stem}.q{quality}.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::encoder::EncodedArtifact;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Writes `100 * quality + 500` bytes
    struct LinearStub {
        calls: AtomicUsize,
    }

    impl Encoder for LinearStub {
        fn encode(
            &self,
            input: &Path,
            quality: i32,
            out_dir: &Path,
            _cancel: &CancelToken,
        ) -> Result<EncodedArtifact> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::fs::create_dir_all(out_dir)?;
            let path = out_dir.join(input.file_stem().unwrap()).with_extension("wem");
            let size = (100 * quality + 500) as usize;
            std::fs::write(&path, vec![1u8; size])?;
            EncodedArtifact::from_path(path)
        }
    }

    #[test]
    fn test_get_or_encode_memoizes() {
        let dir = tempfile::tempdir().unwrap();
        let stub = LinearStub {
            calls: AtomicUsize::new(0),
        };
        let cancel = CancelToken::new();
        let mut cache = ConversionCache::new();
        let input = Path::new("/audio/a.wav");

        let (first, hit) = cache
            .get_or_encode(&stub, input, 2, None, dir.path(), &cancel)
            .unwrap();
        assert!(!hit);
        assert_eq!(first.size, 700);
        assert_eq!(first.path, dir.path().join("a.q2.wem"));

        let (second, hit) = cache
            .get_or_encode(&stub, input, 2, None, dir.path(), &cancel)
            .unwrap();
        assert!(hit);
        assert_eq!(second, first);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);

        // A different quality does not overwrite the kept artifact
        cache
            .get_or_encode(&stub, input, 3, None, dir.path(), &cancel)
            .unwrap();
        assert_eq!(std::fs::metadata(&first.path).unwrap().len(), 700);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_stale_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ConversionCache::new();
        cache.insert(EncodeAttempt {
            input: PathBuf::from("/audio/a.wav"),
            quality: 0,
            sample_rate: None,
            size: 10,
            path: dir.path().join("gone.wem"),
        });

        assert!(cache.get(Path::new("/audio/a.wav"), 0).is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().stale, 1);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let mut cache = ConversionCache::new();
        for (input, quality) in [("/a.wav", 0), ("/a.wav", 1), ("/b.wav", 0)] {
            cache.insert(EncodeAttempt {
                input: PathBuf::from(input),
                quality,
                sample_rate: None,
                size: 1,
                path: PathBuf::from("/x.wem"),
            });
        }

        assert_eq!(cache.invalidate(Path::new("/a.wav")), 2);
        assert!(cache.contains(Path::new("/b.wav"), 0));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_keep_path_negative_quality() {
        assert_eq!(
            keep_path(Path::new("/w/out/a.wem"), -2),
            PathBuf::from("/w/out/a.q-2.wem")
        );
    }
}
