//! Batch source replacement
//!
//! A batch takes a directory of audio files named `<source_id>.<ext>`,
//! encodes each one to the size recorded for that source, and writes the
//! bank once at the end. [`spawn_batch`] runs the same work on a background
//! thread and streams [`WorkerEvent`]s back over a channel.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::thread::JoinHandle;

use walkdir::WalkDir;

use crate::config::ForgeConfig;
use crate::encode::{CancelToken, ConversionCache, EncodeProgress, Encoder};
use crate::error::{Error, Result};
use crate::formats::bnk::SoundBank;
use crate::operations::{BankOperations, ReplaceRequest, ReplaceResult};

/// Audio extensions picked up by [`find_audio_inputs`]
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "flac", "ogg", "mp3", "aif", "aiff"];

/// One replacement found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchInput {
    pub source_id: u32,
    pub path: PathBuf,
}

/// Options shared by every job of a batch
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Directory scanned for `<source_id>.<ext>` files
    pub input_dir: PathBuf,
    /// Directory receiving `<source_id>.wem` artifacts
    pub output_dir: PathBuf,
    /// Flag written to every replaced source's records
    pub override_fx: Option<bool>,
    pub adaptive: bool,
}

/// Result of a batch run
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    /// Number of successful replacements
    pub success_count: usize,
    /// Number of failed replacements
    pub fail_count: usize,
    /// Messages for each file processed
    pub results: Vec<String>,
    /// Successful replacements in processing order
    pub replaced: Vec<ReplaceResult>,
    /// Whether the bank was written
    pub saved: bool,
}

/// Progress of a batch
#[derive(Debug, Clone)]
pub enum BatchEvent {
    /// A job is about to start (`index` is 1-based)
    JobStarted {
        index: usize,
        total: usize,
        source_id: u32,
        input: PathBuf,
    },
    /// Progress inside the current job
    Encode { index: usize, progress: EncodeProgress },
    /// A job finished; `error` is set on failure
    JobFinished {
        index: usize,
        source_id: u32,
        error: Option<String>,
    },
}

/// Find every `<source_id>.<ext>` audio file under `dir`
///
/// Files whose stem is not a decimal `u32` are skipped. The result is sorted
/// by source ID. When several files share a source ID, the first path in
/// sort order wins and the rest are logged and ignored.
pub fn find_audio_inputs<P: AsRef<Path>>(dir: P) -> Vec<BatchInput> {
    let mut inputs: Vec<BatchInput> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path().extension().is_some_and(|ext| {
                AUDIO_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
        })
        .filter_map(|e| {
            let source_id = e.path().file_stem()?.to_str()?.parse::<u32>().ok()?;
            Some(BatchInput {
                source_id,
                path: e.into_path(),
            })
        })
        .collect();

    inputs.sort_by(|a, b| a.source_id.cmp(&b.source_id).then_with(|| a.path.cmp(&b.path)));
    inputs.dedup_by(|dup, kept| {
        let same = dup.source_id == kept.source_id;
        if same {
            tracing::warn!(
                "Ignoring {} (source {} already taken by {})",
                dup.path.display(),
                dup.source_id,
                kept.path.display()
            );
        }
        same
    });
    inputs
}

/// Replace every source found in `options.input_dir`
///
/// The cache is cleared first. Jobs run one after another; a failed job is
/// recorded and the batch moves on. Cancellation stops the batch without
/// saving the bank. Flag patches accumulate in memory and the bank is saved
/// once at the end if anything changed.
pub fn run_batch(
    bank: &mut SoundBank,
    encoder: &dyn Encoder,
    cache: &mut ConversionCache,
    config: &ForgeConfig,
    options: &BatchOptions,
    cancel: &CancelToken,
    on_event: &dyn Fn(&BatchEvent),
) -> Result<BatchResult> {
    cache.clear();

    let inputs = find_audio_inputs(&options.input_dir);
    let total = inputs.len();
    tracing::info!(
        "Batch: {} input(s) in {}",
        total,
        options.input_dir.display()
    );

    let mut result = BatchResult::default();

    for (i, input) in inputs.iter().enumerate() {
        let index = i + 1;
        cancel.check()?;

        on_event(&BatchEvent::JobStarted {
            index,
            total,
            source_id: input.source_id,
            input: input.path.clone(),
        });

        let mut request = ReplaceRequest::new(input.source_id, &input.path, &options.output_dir)
            .adaptive(options.adaptive);
        request.override_fx = options.override_fx;

        let progress = |p: &EncodeProgress| {
            on_event(&BatchEvent::Encode {
                index,
                progress: p.clone(),
            });
        };

        let display = input
            .path
            .file_name()
            .map_or_else(|| input.path.display().to_string(), |n| n.to_string_lossy().into_owned());

        match BankOperations::replace_in_bank(
            bank,
            encoder,
            cache,
            &config.search,
            &request,
            cancel,
            &progress,
        ) {
            Ok(replaced) => {
                result.success_count += 1;
                result.results.push(format!(
                    "Replaced {} -> {} (q={}, {} bytes)",
                    display,
                    replaced.encoded.output.display(),
                    replaced.encoded.quality,
                    replaced.target_size
                ));
                on_event(&BatchEvent::JobFinished {
                    index,
                    source_id: input.source_id,
                    error: None,
                });
                result.replaced.push(replaced);
            }
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                tracing::warn!("Source {} failed: {}", input.source_id, e);
                result.fail_count += 1;
                result.results.push(format!("Failed {display}: {e}"));
                on_event(&BatchEvent::JobFinished {
                    index,
                    source_id: input.source_id,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    if bank.is_dirty() {
        bank.save()?;
        result.saved = true;
    }

    tracing::info!(
        "Batch finished: {} succeeded, {} failed",
        result.success_count,
        result.fail_count
    );
    Ok(result)
}

/// Message from a background batch
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Batch(BatchEvent),
    /// The batch completed (individual jobs may still have failed)
    Finished(BatchResult),
    /// The batch could not run or was cancelled
    Failed(String),
}

/// Handle to a batch running on its own thread
#[derive(Debug)]
pub struct WorkerHandle {
    /// Event stream; closes when the worker exits
    pub events: Receiver<WorkerEvent>,
    cancel: CancelToken,
    thread: JoinHandle<()>,
}

impl WorkerHandle {
    /// Request cancellation; the running encoder is killed
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the worker thread to exit
    pub fn join(self) -> Result<()> {
        self.thread
            .join()
            .map_err(|_| Error::Io(std::io::Error::other("batch worker panicked")))
    }
}

/// Run a batch on a background thread
///
/// The worker opens the bank itself and owns its own conversion cache.
pub fn spawn_batch<E>(
    bank_path: PathBuf,
    encoder: E,
    config: ForgeConfig,
    options: BatchOptions,
) -> WorkerHandle
where
    E: Encoder + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let cancel = CancelToken::new();
    let worker_cancel = cancel.clone();

    let thread = std::thread::spawn(move || {
        let send_event = |event: &BatchEvent| {
            let _ = tx.send(WorkerEvent::Batch(event.clone()));
        };

        let outcome = SoundBank::open_with_signature(&bank_path, config.scan.signature).and_then(
            |mut bank| {
                let mut cache = ConversionCache::new();
                run_batch(
                    &mut bank,
                    &encoder,
                    &mut cache,
                    &config,
                    &options,
                    &worker_cancel,
                    &send_event,
                )
            },
        );

        let last = match outcome {
            Ok(result) => WorkerEvent::Finished(result),
            Err(e) => WorkerEvent::Failed(e.to_string()),
        };
        let _ = tx.send(last);
    });

    WorkerHandle {
        events: rx,
        cancel,
        thread,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_audio_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("voices");
        std::fs::create_dir_all(&nested).unwrap();

        for name in ["200.wav", "notes.txt", "intro.wav", "4294967296.wav", "15.WAV"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::write(nested.join("100.flac"), b"x").unwrap();

        let inputs = find_audio_inputs(dir.path());
        let ids: Vec<u32> = inputs.iter().map(|i| i.source_id).collect();
        assert_eq!(ids, vec![15, 100, 200]);
        assert_eq!(inputs[1].path, nested.join("100.flac"));
    }

    #[test]
    fn test_duplicate_source_ids() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("7.wav"), b"x").unwrap();
        std::fs::write(dir.path().join("7.flac"), b"x").unwrap();

        let inputs = find_audio_inputs(dir.path());
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].path, dir.path().join("7.flac"));
    }
}
