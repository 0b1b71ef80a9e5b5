//! File format handlers for Wwise audio containers
//!
//! - `bnk` locates and patches sound records inside SoundBanks
//! - `wem` inspects the RIFF header of encoded media

pub mod bnk;
pub mod wem;

// Re-export main types for convenience
pub use bnk::{EntryIndex, PatchOutcome, PatchRequest, Signature, SoundBank, SoundEntry};
pub use wem::{WemHeader, parse_wem_header, read_wem_header};
