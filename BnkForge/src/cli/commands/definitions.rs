//! Subcommand enum definitions for CLI

use clap::Subcommand;
use std::path::PathBuf;

/// SoundBank record commands
#[derive(Subcommand)]
pub enum BnkCommands {
    /// List every sound record in a bank
    List {
        /// SoundBank file
        bank: PathBuf,

        /// Print records as JSON
        #[arg(long)]
        json: bool,

        /// Group records by source ID
        #[arg(short, long)]
        summary: bool,
    },

    /// Show the records referencing one source ID
    Find {
        /// SoundBank file
        bank: PathBuf,

        /// Source ID
        source_id: u32,

        /// Only records whose current size equals this
        #[arg(long)]
        size: Option<u32>,
    },

    /// Patch the size and/or override-FX flag of a source's records
    Patch {
        /// SoundBank file
        bank: PathBuf,

        /// Source ID
        source_id: u32,

        /// New file size in bytes
        #[arg(long)]
        size: Option<u64>,

        /// New override-FX flag (true/false)
        #[arg(long, value_name = "BOOL")]
        override_fx: Option<bool>,

        /// Only patch records whose current size equals this
        #[arg(long)]
        expect_size: Option<u32>,
    },
}

/// WEM file commands
#[derive(Subcommand)]
pub enum WemCommands {
    /// Show the RIFF header of a WEM file
    Inspect {
        /// WEM file
        path: PathBuf,
    },
}
