//! Wwise SoundBank (BNK) sound record patching
//!
//! The SoundBank container grammar is only partially known, so nothing here
//! parses chunks. A buffer is treated as opaque bytes with a sparse set of
//! fixed-width "lenses" located by signature scanning.
//!
//! ## Record Layout
//!
//! Offsets are relative to `record_start = signature_offset - 4`:
//!
//! | Range     | Field                                   |
//! |-----------|-----------------------------------------|
//! | `[0,4)`   | sound ID (u32 LE)                       |
//! | `[4,9)`   | signature (plugin ID + stream type)     |
//! | `[9,13)`  | source ID (u32 LE)                      |
//! | `[13,17)` | in-memory file size (u32 LE)            |
//! | `[18]`    | override parent FX flag                 |
//!
//! Every other byte is left untouched by patches, and patches never change
//! the buffer length.

mod entry;
mod index;
mod patcher;
mod soundbank;

pub use entry::{SoundEntry, parse_entry};
pub use index::{EntryIndex, Signature, build_index, find_by_source_id};
pub use patcher::{PatchOutcome, PatchRequest, patch};
pub use soundbank::SoundBank;

/// Length of the signature that precedes the source ID
pub const SIGNATURE_LEN: usize = 5;

/// Distance from the start of a record to its signature
pub const SIGNATURE_OFFSET: usize = 4;

/// Offset of the sound ID within a record
pub const SOUND_ID_OFFSET: usize = 0;

/// Offset of the source ID within a record
pub const SOURCE_ID_OFFSET: usize = 9;

/// Offset of the file size within a record
pub const FILE_SIZE_OFFSET: usize = 13;

/// Offset of the override-FX flag within a record
pub const OVERRIDE_FX_OFFSET: usize = 18;

/// Number of bytes a record needs to be fully readable
pub const RECORD_LEN: usize = 19;
