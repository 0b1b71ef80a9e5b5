//! WEM audio file commands

use std::path::Path;

use anyhow::Result;

use crate::cli::progress::format_size;
use crate::formats::wem::{format_name, read_wem_header};

/// Inspect a WEM file and display its header information
pub fn inspect(path: &Path) -> Result<()> {
    let header = read_wem_header(path)?;

    println!("WEM File: {}", path.display());
    println!("---------------------------------");
    println!("Format code:      {:#06x}", header.format_code);
    println!("Format name:      {}", format_name(header.format_code));
    println!("Channels:         {}", header.channels);
    println!("Sample rate:      {} Hz", header.sample_rate);
    println!("Avg bytes/sec:    {}", header.avg_bytes_per_sec);
    println!("Block align:      {}", header.block_align);
    println!("Bits per sample:  {}", header.bits_per_sample);
    println!("Data offset:      {:#x}", header.data_offset);
    println!("Data size:        {} bytes", header.data_size);
    println!("Extra data size:  {} bytes", header.extra_size);
    println!(
        "File size:        {} ({} bytes)",
        format_size(header.file_len),
        header.file_len
    );

    if header.avg_bytes_per_sec > 0 {
        println!("Est. duration:    {:.2} seconds", header.estimated_duration_secs());
    }

    let trailing = header.trailing_bytes();
    if trailing > 0 {
        println!("Padding:          {trailing} bytes after the RIFF payload");
    }

    Ok(())
}
