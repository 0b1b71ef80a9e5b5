//! Quality binary search
//!
//! Output size is assumed to be non-decreasing in quality. That holds for
//! the Vorbis encoder in practice but is not guaranteed; in a non-monotonic
//! region the search can miss the true optimum. Every fitting probe is
//! tracked, so the result is always the best fit actually observed and is
//! never larger than the target.

use std::path::Path;

use crate::error::Result;

use super::cache::{ConversionCache, EncodeAttempt};
use super::encoder::Encoder;
use super::progress::{CancelToken, EncodePhase, EncodeProgress, ProgressCallback};

/// Inclusive range of encoder quality values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityRange {
    pub min: i32,
    pub max: i32,
}

impl QualityRange {
    /// Create a range; the bounds are swapped if given in the wrong order
    #[must_use]
    pub fn new(min: i32, max: i32) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// Number of quality values in the range
    #[must_use]
    pub fn len(&self) -> usize {
        (i64::from(self.max) - i64::from(self.min) + 1) as usize
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[must_use]
    pub fn contains(&self, quality: i32) -> bool {
        (self.min..=self.max).contains(&quality)
    }
}

impl Default for QualityRange {
    fn default() -> Self {
        Self::new(-2, 10)
    }
}

/// Shared inputs for one job's probes
pub struct SearchContext<'a> {
    pub encoder: &'a dyn Encoder,
    /// Working directory reused by every probe of the job
    pub work_dir: &'a Path,
    pub cancel: &'a CancelToken,
    pub progress: ProgressCallback<'a>,
    pub target: u64,
}

impl SearchContext<'_> {
    /// Run one probe through the cache and report it
    pub(crate) fn probe(
        &self,
        cache: &mut ConversionCache,
        phase: EncodePhase,
        probe: usize,
        input: &Path,
        quality: i32,
        sample_rate: Option<u32>,
    ) -> Result<EncodeAttempt> {
        self.cancel.check()?;

        let mut event = EncodeProgress::new(phase, self.target);
        event.probe = probe;
        event.quality = Some(quality);
        event.sample_rate = sample_rate;
        (self.progress)(&event);

        let (attempt, cache_hit) = cache.get_or_encode(
            self.encoder,
            input,
            quality,
            sample_rate,
            &self.work_dir.join("out"),
            self.cancel,
        )?;

        event.size = Some(attempt.size);
        event.cache_hit = cache_hit;
        (self.progress)(&event);

        Ok(attempt)
    }
}

/// Result of a quality search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    /// Largest fitting probe, if any fit
    pub best: Option<EncodeAttempt>,
    /// Smallest artifact size observed
    pub min_size: Option<u64>,
    /// Number of probes made (cache hits included)
    pub probes: usize,
}

impl SearchOutcome {
    #[must_use]
    pub fn fits(&self) -> bool {
        self.best.is_some()
    }
}

/// Finds the quality whose artifact is the largest one not exceeding the target
#[derive(Debug, Clone, Copy, Default)]
pub struct SizeMatchingEncoder {
    range: QualityRange,
}

impl SizeMatchingEncoder {
    #[must_use]
    pub fn new(range: QualityRange) -> Self {
        Self { range }
    }

    #[must_use]
    pub fn range(&self) -> QualityRange {
        self.range
    }

    /// Binary search the quality range for `input`
    ///
    /// Encoder failures and timeouts count as "too large" and move the upper
    /// bound down. Cancellation and IO errors abort the search.
    pub fn search(
        &self,
        ctx: &SearchContext<'_>,
        cache: &mut ConversionCache,
        input: &Path,
        sample_rate: Option<u32>,
    ) -> Result<SearchOutcome> {
        let mut low = self.range.min;
        let mut high = self.range.max;
        let mut outcome = SearchOutcome {
            best: None,
            min_size: None,
            probes: 0,
        };

        while low <= high {
            let mid = ((i64::from(low) + i64::from(high)).div_euclid(2)) as i32;
            outcome.probes += 1;

            let attempt = match ctx.probe(
                cache,
                EncodePhase::QualitySearch,
                outcome.probes,
                input,
                mid,
                sample_rate,
            ) {
                Ok(attempt) => attempt,
                Err(e) if e.is_probe_failure() => {
                    tracing::warn!("Probe q={} failed, treating as too large: {}", mid, e);
                    let Some(below) = mid.checked_sub(1) else { break };
                    high = below;
                    continue;
                }
                Err(e) => return Err(e),
            };

            outcome.min_size = Some(outcome.min_size.map_or(attempt.size, |m| m.min(attempt.size)));

            if attempt.size <= ctx.target {
                tracing::debug!("q={} fits: {} <= {}", mid, attempt.size, ctx.target);
                let better = outcome
                    .best
                    .as_ref()
                    .is_none_or(|best| attempt.size >= best.size);
                if better {
                    outcome.best = Some(attempt);
                }
                let Some(above) = mid.checked_add(1) else { break };
                low = above;
            } else {
                tracing::debug!("q={} too large: {} > {}", mid, attempt.size, ctx.target);
                let Some(below) = mid.checked_sub(1) else { break };
                high = below;
            }
        }

        match &outcome.best {
            Some(best) => tracing::info!(
                "Best fit for {}: q={} ({} of {} bytes, {} probes)",
                input.display(),
                best.quality,
                best.size,
                ctx.target,
                outcome.probes
            ),
            None => tracing::info!(
                "No quality fits {} bytes for {} (smallest {:?})",
                ctx.target,
                input.display(),
                outcome.min_size
            ),
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::encoder::EncodedArtifact;
    use crate::encode::progress::no_progress;
    use crate::error::Error;
    use std::sync::Mutex;

    /// Writes `size(quality)` bytes; `None` simulates an encoder failure
    struct FnStub<F: Fn(i32) -> Option<u64>> {
        size: F,
        probed: Mutex<Vec<i32>>,
    }

    impl<F: Fn(i32) -> Option<u64>> FnStub<F> {
        fn new(size: F) -> Self {
            Self {
                size,
                probed: Mutex::new(Vec::new()),
            }
        }
    }

    impl<F: Fn(i32) -> Option<u64>> Encoder for FnStub<F> {
        fn encode(
            &self,
            input: &Path,
            quality: i32,
            out_dir: &Path,
            _cancel: &CancelToken,
        ) -> Result<EncodedArtifact> {
            self.probed.lock().unwrap().push(quality);
            let size = (self.size)(quality).ok_or_else(|| Error::ExternalTool {
                message: "stub failure".to_string(),
            })?;
            std::fs::create_dir_all(out_dir)?;
            let path = out_dir.join(input.file_stem().unwrap()).with_extension("wem");
            std::fs::write(&path, vec![0u8; size as usize])?;
            EncodedArtifact::from_path(path)
        }
    }

    fn run<F: Fn(i32) -> Option<u64>>(
        stub: &FnStub<F>,
        range: QualityRange,
        target: u64,
    ) -> SearchOutcome {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancelToken::new();
        let ctx = SearchContext {
            encoder: stub,
            work_dir: dir.path(),
            cancel: &cancel,
            progress: &no_progress,
            target,
        };
        let mut cache = ConversionCache::new();
        SizeMatchingEncoder::new(range)
            .search(&ctx, &mut cache, Path::new("/audio/src.wav"), None)
            .unwrap()
    }

    #[test]
    fn test_linear_stub_scenario() {
        let stub = FnStub::new(|q| Some((100 * q + 500) as u64));
        let outcome = run(&stub, QualityRange::new(-2, 10), 850);
        let best = outcome.best.unwrap();
        assert_eq!(best.quality, 3);
        assert_eq!(best.size, 800);
    }

    #[test]
    fn test_matches_exhaustive_scan() {
        let sizes = |q: i32| Some(u64::from((q + 3) as u32 * (q + 3) as u32 * 37 + 200));
        let range = QualityRange::new(-2, 10);

        for target in [0u64, 199, 348, 349, 500, 1000, 3000, 6500, 10_000] {
            let stub = FnStub::new(sizes);
            let outcome = run(&stub, range, target);

            let expected = (range.min..=range.max)
                .filter(|&q| sizes(q).unwrap() <= target)
                .max();
            assert_eq!(
                outcome.best.map(|b| b.quality),
                expected,
                "target {target}"
            );
        }
    }

    #[test]
    fn test_no_fit_reports_minimum() {
        let stub = FnStub::new(|q| Some((100 * q + 5000) as u64));
        let outcome = run(&stub, QualityRange::new(-2, 10), 1000);
        assert!(!outcome.fits());
        assert_eq!(outcome.min_size, Some(4800));
        // The lowest quality is always probed when nothing fits
        assert!(stub.probed.lock().unwrap().contains(&-2));
    }

    #[test]
    fn test_tool_failure_shrinks_search() {
        // Qualities above 5 crash the encoder
        let stub = FnStub::new(|q| if q > 5 { None } else { Some((10 * q + 100) as u64) });
        let outcome = run(&stub, QualityRange::new(0, 10), 10_000);
        assert_eq!(outcome.best.unwrap().quality, 5);
    }

    #[test]
    fn test_probe_count_is_logarithmic() {
        let stub = FnStub::new(|q| Some((100 * q + 500) as u64));
        let outcome = run(&stub, QualityRange::new(-2, 10), 850);
        assert!(outcome.probes <= 4, "{} probes", outcome.probes);
        assert_eq!(stub.probed.lock().unwrap().len(), outcome.probes);
    }

    #[test]
    fn test_cancelled_before_first_probe() {
        let stub = FnStub::new(|_| Some(1));
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let ctx = SearchContext {
            encoder: &stub,
            work_dir: dir.path(),
            cancel: &cancel,
            progress: &no_progress,
            target: 10,
        };
        let mut cache = ConversionCache::new();
        let result = SizeMatchingEncoder::default().search(
            &ctx,
            &mut cache,
            Path::new("/a.wav"),
            None,
        );
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(stub.probed.lock().unwrap().is_empty());
    }

    #[test]
    fn test_extreme_quality_bounds() {
        let always_fits = FnStub::new(|_| Some(10));
        let outcome = run(&always_fits, QualityRange::new(i32::MAX - 3, i32::MAX), 100);
        assert_eq!(outcome.best.unwrap().quality, i32::MAX);

        let never_fits = FnStub::new(|_| Some(1000));
        let outcome = run(&never_fits, QualityRange::new(i32::MIN, i32::MIN + 3), 100);
        assert!(!outcome.fits());
        assert_eq!(outcome.min_size, Some(1000));

        let step = FnStub::new(|q| Some(if q > 0 { 1000 } else { 10 }));
        let outcome = run(&step, QualityRange::new(i32::MIN, i32::MAX), 100);
        assert_eq!(outcome.best.unwrap().quality, 0);
        assert!(outcome.probes <= 33, "{} probes", outcome.probes);
    }

    #[test]
    fn test_single_value_range() {
        let stub = FnStub::new(|_| Some(10));
        let outcome = run(&stub, QualityRange::new(4, 4), 10);
        assert_eq!(outcome.best.unwrap().quality, 4);
        assert_eq!(outcome.probes, 1);
    }
}
