//! Sample-rate fallback search and linear resampling
//!
//! When no quality fits at the source's own rate, lower rates are tried.
//! Resampling is plain linear interpolation: the goal is hitting a byte
//! budget, not audio fidelity.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

use super::cache::ConversionCache;
use super::progress::{EncodePhase, EncodeProgress};
use super::search::{SearchContext, SearchOutcome, SizeMatchingEncoder};

/// Default candidate rates, descending
pub const DEFAULT_SAMPLE_RATES: [u32; 8] = [48000, 44100, 32000, 24000, 22050, 16000, 11025, 8000];

/// Read the sample rate and channel layout of a WAV source
pub fn read_wav_spec(path: &Path) -> Result<hound::WavSpec> {
    let reader = hound::WavReader::open(path).map_err(|e| Error::UnsupportedSource {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(reader.spec())
}

/// Linear resampling of interleaved samples
#[must_use]
pub fn resample_linear(samples: &[i16], channels: usize, src_rate: u32, dst_rate: u32) -> Vec<i16> {
    if samples.is_empty() || channels == 0 || src_rate == 0 || dst_rate == 0 {
        return Vec::new();
    }
    if src_rate == dst_rate {
        return samples.to_vec();
    }

    let frames = samples.len() / channels;
    if frames == 0 {
        return Vec::new();
    }

    let ratio = f64::from(src_rate) / f64::from(dst_rate);
    let output_frames = ((frames as f64) / ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_frames * channels);

    for i in 0..output_frames {
        let src_pos = i as f64 * ratio;
        let src_idx = (src_pos.floor() as usize).min(frames - 1);
        let frac = src_pos - src_idx as f64;

        for ch in 0..channels {
            let a = samples[src_idx * channels + ch];
            let sample = if src_idx + 1 < frames {
                let a = f64::from(a);
                let b = f64::from(samples[(src_idx + 1) * channels + ch]);
                (a + (b - a) * frac).round() as i16
            } else {
                a
            };
            output.push(sample);
        }
    }

    output
}

/// Resample a WAV file to `dst_rate`, writing 16-bit PCM
pub fn resample_wav(input: &Path, output: &Path, dst_rate: u32) -> Result<()> {
    let mut reader = hound::WavReader::open(input).map_err(|e| Error::UnsupportedSource {
        path: input.to_path_buf(),
        message: e.to_string(),
    })?;
    let spec = reader.spec();

    let samples: Vec<i16> = match spec.sample_format {
        hound::SampleFormat::Int => match spec.bits_per_sample {
            16 => reader.samples::<i16>().collect::<std::result::Result<_, _>>()?,
            8 => reader
                .samples::<i8>()
                .map(|s| s.map(|v| i16::from(v) << 8))
                .collect::<std::result::Result<_, _>>()?,
            24 | 32 => {
                let shift = spec.bits_per_sample - 16;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| (v >> shift) as i16))
                    .collect::<std::result::Result<_, _>>()?
            }
            bits => {
                return Err(Error::UnsupportedSource {
                    path: input.to_path_buf(),
                    message: format!("unsupported bit depth: {bits}"),
                });
            }
        },
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * 32767.0) as i16))
            .collect::<std::result::Result<_, _>>()?,
    };

    let resampled = resample_linear(&samples, usize::from(spec.channels), spec.sample_rate, dst_rate);

    let out_spec = hound::WavSpec {
        channels: spec.channels,
        sample_rate: dst_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(output, out_spec)?;
    for sample in resampled {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    tracing::debug!(
        "Resampled {} {} Hz -> {} Hz",
        input.display(),
        spec.sample_rate,
        dst_rate
    );
    Ok(())
}

/// Finds the highest sample rate at which some quality fits
#[derive(Debug, Clone)]
pub struct AdaptiveResampler {
    /// Candidate rates, descending
    rates: Vec<u32>,
    quality: SizeMatchingEncoder,
}

impl AdaptiveResampler {
    /// Create a resampler over `rates` (sorted descending and deduplicated here)
    #[must_use]
    pub fn new(mut rates: Vec<u32>, quality: SizeMatchingEncoder) -> Self {
        rates.retain(|&r| r > 0);
        rates.sort_unstable_by(|a, b| b.cmp(a));
        rates.dedup();
        Self { rates, quality }
    }

    /// Candidate rates strictly below the source's native rate, descending
    #[must_use]
    pub fn candidates(&self, native_rate: u32) -> Vec<u32> {
        self.rates
            .iter()
            .copied()
            .filter(|&r| r < native_rate)
            .collect()
    }

    /// Search the candidate rates for `source`
    ///
    /// Each candidate gets one probe at minimum quality; size shrinks with
    /// rate, so a binary search over the candidate list finds the highest
    /// feasible rate. That rate then gets a full quality search. The returned
    /// outcome's `min_size` covers every probe made here.
    pub fn search(
        &self,
        ctx: &SearchContext<'_>,
        cache: &mut ConversionCache,
        source: &Path,
        native_rate: u32,
    ) -> Result<SearchOutcome> {
        let candidates = self.candidates(native_rate);
        let min_quality = self.quality.range().min;
        let mut outcome = SearchOutcome {
            best: None,
            min_size: None,
            probes: 0,
        };

        if candidates.is_empty() {
            tracing::info!("No candidate rates below {} Hz", native_rate);
            return Ok(outcome);
        }

        let mut low = 0usize;
        let mut high = candidates.len();
        let mut feasible: Option<(u32, PathBuf)> = None;

        // Half-open [low, high): candidates before `low` are known infeasible
        while low < high {
            let mid = low + (high - low) / 2;
            let rate = candidates[mid];
            outcome.probes += 1;

            let resampled = self.prepare(ctx, source, rate)?;
            let fits = match ctx.probe(
                cache,
                EncodePhase::RateSearch,
                outcome.probes,
                &resampled,
                min_quality,
                Some(rate),
            ) {
                Ok(attempt) => {
                    outcome.min_size =
                        Some(outcome.min_size.map_or(attempt.size, |m| m.min(attempt.size)));
                    attempt.size <= ctx.target
                }
                Err(e) if e.is_probe_failure() => {
                    tracing::warn!("Probe at {} Hz failed, treating as too large: {}", rate, e);
                    false
                }
                Err(e) => return Err(e),
            };

            if fits {
                tracing::debug!("{} Hz is feasible", rate);
                feasible = Some((rate, resampled));
                high = mid;
            } else {
                tracing::debug!("{} Hz is too large at q={}", rate, min_quality);
                low = mid + 1;
            }
        }

        let Some((rate, resampled)) = feasible else {
            tracing::info!(
                "No candidate rate fits {} bytes (smallest {:?})",
                ctx.target,
                outcome.min_size
            );
            return Ok(outcome);
        };

        tracing::info!("Highest feasible rate: {} Hz", rate);
        let search = self.quality.search(ctx, cache, &resampled, Some(rate))?;

        outcome.probes += search.probes;
        outcome.min_size = match (outcome.min_size, search.min_size) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        outcome.best = search.best;
        Ok(outcome)
    }

    /// Resample `source` into the working directory once per rate
    fn prepare(&self, ctx: &SearchContext<'_>, source: &Path, rate: u32) -> Result<PathBuf> {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "source".to_string());
        let path = ctx.work_dir.join(format!("{stem}_{rate}.wav"));

        if !path.exists() {
            ctx.cancel.check()?;
            let mut event = EncodeProgress::new(EncodePhase::Resampling, ctx.target);
            event.sample_rate = Some(rate);
            (ctx.progress)(&event);
            resample_wav(source, &path, rate)?;
        }
        Ok(path)
    }
}

impl Default for AdaptiveResampler {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATES.to_vec(), SizeMatchingEncoder::default())
    }
}
