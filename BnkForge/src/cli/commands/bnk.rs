//! CLI commands for SoundBank records

use std::path::Path;
use std::time::Instant;

use crate::cli::progress::{DISK, GEAR, LOOKING_GLASS, print_done, print_step};
use crate::formats::bnk::{PatchRequest, Signature, SoundEntry};
use crate::operations::BankOperations;

/// List every record in a bank
pub fn list(bank: &Path, signature: Signature, json: bool, summary: bool) -> anyhow::Result<()> {
    let entries = BankOperations::locate_entries(bank, signature)?;

    if summary {
        let sources = BankOperations::summarize(&entries);
        if json {
            println!("{}", BankOperations::to_json(&sources)?);
            return Ok(());
        }

        println!("{:>12}  {:>5}  sizes", "source_id", "count");
        for source in &sources {
            let sizes: Vec<String> = source.sizes.iter().map(ToString::to_string).collect();
            println!(
                "{:>12}  {:>5}  {}",
                source.source_id,
                source.occurrences,
                sizes.join(", ")
            );
        }
        println!();
        println!(
            "{} records, {} distinct sources (signature {})",
            entries.len(),
            sources.len(),
            signature
        );
        return Ok(());
    }

    if json {
        println!("{}", BankOperations::to_json(&entries)?);
        return Ok(());
    }

    print_entries(&entries);
    println!();
    println!("{} records (signature {})", entries.len(), signature);
    Ok(())
}

/// Show the records referencing one source
pub fn find(
    bank: &Path,
    signature: Signature,
    source_id: u32,
    size: Option<u32>,
) -> anyhow::Result<()> {
    let entries = BankOperations::find_source(bank, signature, source_id, size)?;
    print_entries(&entries);
    Ok(())
}

/// Patch a source's records and save the bank
pub fn patch(
    bank: &Path,
    signature: Signature,
    source_id: u32,
    size: Option<u64>,
    override_fx: Option<bool>,
    expect_size: Option<u32>,
) -> anyhow::Result<()> {
    if size.is_none() && override_fx.is_none() {
        anyhow::bail!("nothing to patch: pass --size and/or --override-fx");
    }

    let start = Instant::now();
    let mut request = PatchRequest::new(source_id);
    request.new_size = size;
    request.override_fx = override_fx;
    request.expected_size = expect_size;

    print_step(1, 2, LOOKING_GLASS, &format!("Patching source {source_id}..."));
    let outcome = BankOperations::patch_entry(bank, signature, &request)?;

    if outcome.wrote_anything() {
        print_step(2, 2, DISK, &format!("Saved {}", bank.display()));
    } else {
        print_step(2, 2, DISK, "Nothing written; bank left unchanged");
    }
    for offset in &outcome.offsets {
        println!("  {GEAR}record at {offset:#x}");
    }
    if let Some(value) = outcome.overflow {
        println!(
            "  warning: size {value} does not fit the 32-bit field; size left unchanged"
        );
    }
    print_done(start.elapsed());
    Ok(())
}

fn print_entries(entries: &[SoundEntry]) {
    println!(
        "{:>10}  {:>12}  {:>12}  {:>10}  override_fx",
        "offset", "sound_id", "source_id", "file_size"
    );
    for entry in entries {
        println!(
            "{:>#10x}  {:>12}  {:>12}  {:>10}  {}",
            entry.offset, entry.sound_id, entry.source_id, entry.file_size, entry.override_fx
        );
    }
}
