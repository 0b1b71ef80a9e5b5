//! One encode-to-size job: search, resample fallback, finalize

use std::path::{Path, PathBuf};

use crate::config::SearchConfig;
use crate::error::{Error, Result};
use crate::formats::wem::{format_name, read_wem_header};

use super::cache::ConversionCache;
use super::encoder::Encoder;
use super::padding::pad_to_size;
use super::progress::{CancelToken, EncodePhase, EncodeProgress, ProgressCallback};
use super::resample::{AdaptiveResampler, read_wav_spec};
use super::search::{QualityRange, SearchContext, SizeMatchingEncoder};

/// Prefix of per-job working directories
const WORK_DIR_PREFIX: &str = "bnkforge-";

/// What to encode and where the result goes
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    pub input: PathBuf,
    /// Exact size the output must have
    pub target_size: u64,
    /// Fall back to lower sample rates when no quality fits (`SearchConfig::adaptive` must agree)
    pub adaptive: bool,
    pub output: PathBuf,
    /// Parent for the job's working directory (system temp dir when `None`)
    pub work_root: Option<PathBuf>,
}

impl EncodeRequest {
    #[must_use]
    pub fn new(input: impl Into<PathBuf>, target_size: u64, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            target_size,
            adaptive: true,
            output: output.into(),
            work_root: None,
        }
    }

    #[must_use]
    pub fn adaptive(mut self, adaptive: bool) -> Self {
        self.adaptive = adaptive;
        self
    }

    #[must_use]
    pub fn work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = Some(root.into());
        self
    }
}

/// A finalized artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedResult {
    /// Where the padded artifact was written
    pub output: PathBuf,
    pub target_size: u64,
    /// Size straight out of the encoder, before padding
    pub encoded_size: u64,
    pub quality: i32,
    /// Resampled rate, `None` when the source rate was kept
    pub sample_rate: Option<u32>,
    /// Zero bytes appended
    pub padding: u64,
    /// Total probes across every search of the job
    pub probes: usize,
}

impl EncodedResult {
    #[must_use]
    pub fn resampled(&self) -> bool {
        self.sample_rate.is_some()
    }
}

/// Encode `request.input` to exactly `request.target_size` bytes
///
/// Searches quality at the source rate first, then lower sample rates when
/// both `request.adaptive` and `settings.adaptive` allow it. Only WAV sources
/// can be resampled; other inputs fail with the native search's minimum size. The best fitting artifact is copied to `request.output` and padded
/// with zeros. The job's working directory is removed on every exit path.
pub fn encode_to_size(
    encoder: &dyn Encoder,
    cache: &mut ConversionCache,
    settings: &SearchConfig,
    request: &EncodeRequest,
    cancel: &CancelToken,
    progress: ProgressCallback<'_>,
) -> Result<EncodedResult> {
    let input = request.input.as_path();
    if !input.is_file() {
        return Err(Error::FileNotFound {
            path: input.to_path_buf(),
        });
    }

    let target = request.target_size;
    progress(&EncodeProgress::new(EncodePhase::Preparing, target));
    cancel.check()?;

    let mut builder = tempfile::Builder::new();
    builder.prefix(WORK_DIR_PREFIX);
    let work = match &request.work_root {
        Some(root) => {
            std::fs::create_dir_all(root)?;
            builder.tempdir_in(root)?
        }
        None => builder.tempdir()?,
    };
    tracing::debug!("Job working directory: {}", work.path().display());

    let ctx = SearchContext {
        encoder,
        work_dir: work.path(),
        cancel,
        progress,
        target,
    };

    let quality = SizeMatchingEncoder::new(QualityRange::new(
        settings.min_quality,
        settings.max_quality,
    ));

    tracing::info!(
        "Encoding {} to {} bytes (q {}..={})",
        input.display(),
        target,
        quality.range().min,
        quality.range().max
    );

    let mut outcome = quality.search(&ctx, cache, input, None)?;

    if !outcome.fits() && request.adaptive && settings.adaptive {
        match read_wav_spec(input) {
            Ok(spec) => {
                let native_rate = spec.sample_rate;
                tracing::info!(
                    "Nothing fits at {} Hz, trying lower sample rates",
                    native_rate
                );

                let resampler = AdaptiveResampler::new(settings.sample_rates.clone(), quality);
                let fallback = resampler.search(&ctx, cache, input, native_rate)?;

                outcome.probes += fallback.probes;
                outcome.min_size = match (outcome.min_size, fallback.min_size) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                };
                outcome.best = fallback.best;
            }
            Err(Error::UnsupportedSource { path, message }) => {
                tracing::warn!(
                    "Cannot resample {} ({}), skipping the sample rate fallback",
                    path.display(),
                    message
                );
            }
            Err(e) => return Err(e),
        }
    }

    let Some(best) = outcome.best else {
        return Err(Error::EncodeInfeasible {
            target,
            min_size: outcome.min_size,
        });
    };

    cancel.check()?;
    let mut event = EncodeProgress::new(EncodePhase::Finalizing, target);
    event.quality = Some(best.quality);
    event.sample_rate = best.sample_rate;
    event.size = Some(best.size);
    progress(&event);

    let padding = finalize(&best.path, &request.output, target)?;
    log_artifact(&request.output);

    let result = EncodedResult {
        output: request.output.clone(),
        target_size: target,
        encoded_size: best.size,
        quality: best.quality,
        sample_rate: best.sample_rate,
        padding,
        probes: outcome.probes,
    };

    work.close()?;

    event.phase = EncodePhase::Complete;
    event.size = Some(target);
    progress(&event);

    tracing::info!(
        "Wrote {} (q={}, {}, {} bytes padding, {} probes)",
        result.output.display(),
        result.quality,
        result
            .sample_rate
            .map_or_else(|| "source rate".to_string(), |r| format!("{r} Hz")),
        result.padding,
        result.probes
    );

    Ok(result)
}

/// Copy the winning artifact to `output` and pad it to `target`
///
/// A partially written output is removed on failure.
fn finalize(artifact: &Path, output: &Path, target: u64) -> Result<u64> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(artifact, output)?;

    match pad_to_size(output, target) {
        Ok(padding) => Ok(padding),
        Err(e) => {
            let _ = std::fs::remove_file(output);
            Err(e)
        }
    }
}

fn log_artifact(path: &Path) {
    match read_wem_header(path) {
        Ok(header) => tracing::debug!(
            "{}: {} {} ch @ {} Hz, {} data bytes",
            path.display(),
            format_name(header.format_code),
            header.channels,
            header.sample_rate,
            header.data_size
        ),
        Err(e) => tracing::debug!("{}: not a readable RIFF header ({})", path.display(), e),
    }
}
