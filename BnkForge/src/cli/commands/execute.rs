//! Command execution implementations

use super::Commands;
use super::definitions::{BnkCommands, WemCommands};
use super::{bnk, encode, wem};
use crate::config::ForgeConfig;

impl Commands {
    /// Execute the selected command.
    ///
    /// # Errors
    /// Returns an error if the underlying command fails.
    pub fn execute(&self, config: &ForgeConfig) -> anyhow::Result<()> {
        match self {
            Commands::Bnk { command } => command.execute(config),
            Commands::Encode {
                input,
                target,
                output,
                no_adaptive,
                quiet,
            } => encode::encode(config, input, *target, output, !*no_adaptive, *quiet),
            Commands::Replace {
                bank,
                source_id,
                input,
                output,
                override_fx,
                no_adaptive,
                quiet,
            } => encode::replace(
                config,
                bank,
                *source_id,
                input,
                output,
                *override_fx,
                !*no_adaptive,
                *quiet,
            ),
            Commands::Batch {
                bank,
                input_dir,
                output,
                override_fx,
                no_adaptive,
                quiet,
            } => encode::batch(
                config,
                bank,
                input_dir,
                output,
                *override_fx,
                !*no_adaptive,
                *quiet,
            ),
            Commands::Wem { command } => command.execute(),
        }
    }
}

impl BnkCommands {
    /// Execute the selected SoundBank command.
    ///
    /// # Errors
    /// Returns an error if the bank cannot be read or patched.
    pub fn execute(&self, config: &ForgeConfig) -> anyhow::Result<()> {
        let signature = config.scan.signature;
        match self {
            BnkCommands::List {
                bank,
                json,
                summary,
            } => bnk::list(bank, signature, *json, *summary),
            BnkCommands::Find {
                bank,
                source_id,
                size,
            } => bnk::find(bank, signature, *source_id, *size),
            BnkCommands::Patch {
                bank,
                source_id,
                size,
                override_fx,
                expect_size,
            } => bnk::patch(bank, signature, *source_id, *size, *override_fx, *expect_size),
        }
    }
}

impl WemCommands {
    /// Execute the selected WEM command.
    ///
    /// # Errors
    /// Returns an error if the file is not a readable WEM.
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            WemCommands::Inspect { path } => wem::inspect(path),
        }
    }
}
