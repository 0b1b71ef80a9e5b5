pub mod bnk;
pub mod definitions;
pub mod encode;
pub mod execute;
pub mod wem;

use clap::Subcommand;
use std::path::PathBuf;

pub use definitions::{BnkCommands, WemCommands};

#[derive(Subcommand)]
pub enum Commands {
    /// SoundBank record operations
    Bnk {
        #[command(subcommand)]
        command: BnkCommands,
    },

    /// Encode audio to an exact byte size
    Encode {
        /// Source audio (WAV for sample-rate fallback)
        input: PathBuf,

        /// Target size in bytes
        #[arg(short, long)]
        target: u64,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Do not fall back to lower sample rates
        #[arg(long)]
        no_adaptive: bool,

        /// Suppress progress output
        #[arg(short, long)]
        quiet: bool,
    },

    /// Replace one streamed source with new audio, sized to its bank record
    Replace {
        /// SoundBank file
        bank: PathBuf,

        /// Source ID to replace
        source_id: u32,

        /// Replacement audio
        input: PathBuf,

        /// Output directory for `<source_id>.wem`
        #[arg(short, long)]
        output: PathBuf,

        /// Set the override-FX flag on the source's records (true/false)
        #[arg(long, value_name = "BOOL")]
        override_fx: Option<bool>,

        /// Do not fall back to lower sample rates
        #[arg(long)]
        no_adaptive: bool,

        /// Suppress progress output
        #[arg(short, long)]
        quiet: bool,
    },

    /// Replace every `<source_id>.<ext>` audio file found in a directory
    Batch {
        /// SoundBank file
        bank: PathBuf,

        /// Directory of replacement audio
        input_dir: PathBuf,

        /// Output directory for `.wem` files
        #[arg(short, long)]
        output: PathBuf,

        /// Set the override-FX flag on every replaced source (true/false)
        #[arg(long, value_name = "BOOL")]
        override_fx: Option<bool>,

        /// Do not fall back to lower sample rates
        #[arg(long)]
        no_adaptive: bool,

        /// Suppress progress output
        #[arg(short, long)]
        quiet: bool,
    },

    /// WEM file operations
    Wem {
        #[command(subcommand)]
        command: WemCommands,
    },
}
