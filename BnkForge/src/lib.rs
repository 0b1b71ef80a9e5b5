//! # BnkForge
//!
//! Replace streamed audio in Wwise SoundBanks without rebuilding them.
//!
//! A streamed source is described inside a `.bnk` by a small fixed-width
//! record holding its source ID and in-memory file size. BnkForge locates
//! those records by signature scanning, patches them in place, and encodes
//! replacement audio to *exactly* the recorded size so the bank never needs
//! to change shape.
//!
//! ## Quick Start
//!
//! ### Inspecting and Patching a Bank
//!
//! ```no_run
//! use bnkforge::formats::bnk::{PatchRequest, Signature};
//! use bnkforge::operations::BankOperations;
//!
//! // Every complete record, in buffer order
//! let entries = BankOperations::locate_entries("Vocals.bnk", Signature::default())?;
//! println!("Found {} records", entries.len());
//!
//! // Set the size and override-FX flag of every record for one source
//! let request = PatchRequest::new(613_287_406).size(182_044).override_fx(true);
//! let outcome = BankOperations::patch_entry("Vocals.bnk", Signature::default(), &request)?;
//! println!("Patched {} record(s)", outcome.offsets.len());
//! # Ok::<(), bnkforge::Error>(())
//! ```
//!
//! ### Encoding to an Exact Size
//!
//! See the [`encode`] module.
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `bnkforge` command-line binary

pub mod batch;
pub mod config;
pub mod encode;
pub mod error;
pub mod formats;
pub mod operations;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::config::{EncoderConfig, ForgeConfig, ScanConfig, SearchConfig};
    pub use crate::error::{Error, Result};

    // SoundBank records
    pub use crate::formats::bnk::{
        EntryIndex, PatchOutcome, PatchRequest, Signature, SoundBank, SoundEntry,
    };
    pub use crate::formats::wem::{WemHeader, read_wem_header};

    // Size-matched encoding
    pub use crate::encode::{
        CancelToken, ConversionCache, EncodePhase, EncodeProgress, EncodeRequest, EncodedResult,
        Encoder, ExternalEncoder, encode_to_size,
    };

    pub use crate::operations::{BankOperations, ReplaceRequest, ReplaceResult};
    pub use crate::batch::{BatchOptions, BatchResult, WorkerEvent, run_batch, spawn_batch};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
