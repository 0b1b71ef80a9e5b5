//! CLI commands for size-matched encoding and source replacement

use std::path::Path;
use std::time::Instant;

use console::style;

use crate::batch::{BatchEvent, BatchOptions, WorkerEvent, spawn_batch};
use crate::cli::progress::{
    DISK, LOOKING_GLASS, NOTE, TRUCK, encode_message, format_size, prefixed_spinner, print_done,
    print_step, simple_bar,
};
use crate::config::ForgeConfig;
use crate::encode::{
    CancelToken, ConversionCache, EncodeProgress, EncodeRequest, EncodedResult, ExternalEncoder,
};
use crate::operations::{BankOperations, ReplaceRequest};

/// Encode one file to an exact size
pub fn encode(
    config: &ForgeConfig,
    input: &Path,
    target: u64,
    output: &Path,
    adaptive: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    let start = Instant::now();
    let encoder = ExternalEncoder::new(config.encoder.clone())?;
    let mut cache = ConversionCache::new();
    let request = EncodeRequest::new(input, target, output).adaptive(adaptive);

    let pb = (!quiet).then(|| prefixed_spinner("[1/1]", &format!("Encoding {}", input.display())));
    let progress = |p: &EncodeProgress| {
        if let Some(pb) = &pb {
            pb.set_message(encode_message(p));
        }
    };

    let result = BankOperations::encode_to_size(
        &encoder,
        &mut cache,
        &config.search,
        &request,
        &CancelToken::new(),
        &progress,
    );
    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }

    let result = result?;
    if !quiet {
        print_result(&result);
        print_done(start.elapsed());
    }
    Ok(())
}

/// Replace one source, sized to its bank record
pub fn replace(
    config: &ForgeConfig,
    bank: &Path,
    source_id: u32,
    input: &Path,
    output_dir: &Path,
    override_fx: Option<bool>,
    adaptive: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    let start = Instant::now();
    let encoder = ExternalEncoder::new(config.encoder.clone())?;
    let mut cache = ConversionCache::new();

    let mut request = ReplaceRequest::new(source_id, input, output_dir).adaptive(adaptive);
    request.override_fx = override_fx;

    if !quiet {
        print_step(1, 2, LOOKING_GLASS, &format!("Looking up source {source_id}..."));
    }
    let pb = (!quiet).then(|| prefixed_spinner("[2/2]", &format!("{NOTE}Encoding {}", input.display())));
    let progress = |p: &EncodeProgress| {
        if let Some(pb) = &pb {
            pb.set_message(format!("{NOTE}{}", encode_message(p)));
        }
    };

    let result = BankOperations::replace_source(
        bank,
        config.scan.signature,
        &encoder,
        &mut cache,
        &config.search,
        &request,
        &CancelToken::new(),
        &progress,
    );
    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }

    let result = result?;
    if !quiet {
        println!(
            "Source {} ({} record(s), {} bytes)",
            result.source_id, result.records, result.target_size
        );
        print_result(&result.encoded);
        if let Some(patch) = &result.flag_patch {
            println!(
                "  {DISK}override_fx set on {} record(s) in {}",
                patch.offsets.len(),
                bank.display()
            );
        }
        print_done(start.elapsed());
    }
    Ok(())
}

/// Replace every source found in a directory, on a worker thread
pub fn batch(
    config: &ForgeConfig,
    bank: &Path,
    input_dir: &Path,
    output_dir: &Path,
    override_fx: Option<bool>,
    adaptive: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    let start = Instant::now();
    let encoder = ExternalEncoder::new(config.encoder.clone())?;

    let options = BatchOptions {
        input_dir: input_dir.to_path_buf(),
        output_dir: output_dir.to_path_buf(),
        override_fx,
        adaptive,
    };

    if !quiet {
        println!("{TRUCK}Replacing sources from {}", input_dir.display());
    }

    let handle = spawn_batch(bank.to_path_buf(), encoder, config.clone(), options);
    let mut pb = None;
    let mut outcome = None;

    for event in &handle.events {
        match event {
            WorkerEvent::Batch(BatchEvent::JobStarted {
                index,
                total,
                source_id,
                ..
            }) => {
                if !quiet {
                    let bar = pb.get_or_insert_with(|| simple_bar(total as u64, "Replacing"));
                    bar.set_position(index as u64 - 1);
                    bar.set_message(format!("Replacing {source_id}"));
                }
            }
            WorkerEvent::Batch(BatchEvent::Encode { progress, .. }) => {
                if let Some(bar) = &pb {
                    bar.set_message(encode_message(&progress));
                }
            }
            WorkerEvent::Batch(BatchEvent::JobFinished { index, .. }) => {
                if let Some(bar) = &pb {
                    bar.set_position(index as u64);
                }
            }
            WorkerEvent::Finished(result) => outcome = Some(Ok(result)),
            WorkerEvent::Failed(message) => outcome = Some(Err(message)),
        }
    }

    if let Some(bar) = &pb {
        bar.finish_and_clear();
    }
    handle.join()?;

    let result = match outcome {
        Some(Ok(result)) => result,
        Some(Err(message)) => anyhow::bail!("batch failed: {message}"),
        None => anyhow::bail!("batch worker exited without a result"),
    };

    if !quiet {
        for line in &result.results {
            if line.starts_with("Failed") {
                println!("  {}", style(line).red());
            } else {
                println!("  {line}");
            }
        }
        println!();
        println!(
            "{} replaced, {} failed{}",
            result.success_count,
            result.fail_count,
            if result.saved {
                format!("; saved {}", bank.display())
            } else {
                String::new()
            }
        );
        print_done(start.elapsed());
    }

    if result.fail_count > 0 && result.success_count == 0 {
        anyhow::bail!("no source could be replaced");
    }
    Ok(())
}

fn print_result(result: &EncodedResult) {
    let rate = result
        .sample_rate
        .map_or_else(|| "source rate".to_string(), |r| format!("{r} Hz"));
    println!(
        "  {} q={} @ {}, {} + {} padding = {} ({} probes)",
        result.output.display(),
        result.quality,
        rate,
        format_size(result.encoded_size),
        format_size(result.padding),
        format_size(result.target_size),
        result.probes
    );
}
