//! Size-matched encoding
//!
//! Produces an encoded artifact whose length equals a target byte count
//! exactly, so it can replace a streamed source without touching the size
//! recorded in the SoundBank:
//!
//! 1. binary search the encoder's quality range for the largest artifact not
//!    exceeding the target ([`SizeMatchingEncoder`])
//! 2. when nothing fits, binary search lower sample rates ([`AdaptiveResampler`])
//! 3. copy the winner out and pad it with zeros ([`pad_to_size`])
//!
//! Every probe runs through a [`ConversionCache`], and each job works in
//! its own temporary directory.
//!
//! ```no_run
//! use bnkforge::config::ForgeConfig;
//! use bnkforge::encode::{
//!     CancelToken, ConversionCache, EncodeRequest, ExternalEncoder, encode_to_size, no_progress,
//! };
//!
//! let config = ForgeConfig::load_or_default(None)?;
//! let encoder = ExternalEncoder::new(config.encoder.clone())?;
//! let mut cache = ConversionCache::new();
//!
//! let request = EncodeRequest::new("voice.wav", 182_044, "out/613287406.wem");
//! let result = encode_to_size(
//!     &encoder,
//!     &mut cache,
//!     &config.search,
//!     &request,
//!     &CancelToken::new(),
//!     &no_progress,
//! )?;
//! println!("q={} padded {} bytes", result.quality, result.padding);
//! # Ok::<(), bnkforge::Error>(())
//! ```

mod cache;
mod encoder;
mod job;
mod padding;
mod progress;
mod resample;
mod search;

pub use cache::{CacheStats, ConversionCache, EncodeAttempt};
pub use encoder::{EncodedArtifact, Encoder, ExternalEncoder, artifact_file_name, write_descriptor};
pub use job::{EncodeRequest, EncodedResult, encode_to_size};
pub use padding::pad_to_size;
pub use progress::{CancelToken, EncodePhase, EncodeProgress, ProgressCallback, no_progress};
pub use resample::{
    AdaptiveResampler, DEFAULT_SAMPLE_RATES, read_wav_spec, resample_linear, resample_wav,
};
pub use search::{QualityRange, SearchContext, SearchOutcome, SizeMatchingEncoder};
