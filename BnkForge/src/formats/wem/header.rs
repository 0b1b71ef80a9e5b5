//! RIFF/`fmt ` chunk parsing for WEM files

use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use serde::Serialize;

use crate::error::{Error, Result};

/// RIFF chunk identifiers
const RIFF_MAGIC: &[u8; 4] = b"RIFF";
const WAVE_MAGIC: &[u8; 4] = b"WAVE";

/// Parsed WEM file header information
#[derive(Debug, Clone, Serialize)]
pub struct WemHeader {
    /// Size declared by the RIFF header (excluding the 8-byte RIFF preamble)
    pub riff_size: u32,
    /// Audio format code (0xFFFF = Wwise Vorbis, 0x0001 = PCM)
    pub format_code: u16,
    /// Number of audio channels
    pub channels: u16,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Average bytes per second
    pub avg_bytes_per_sec: u32,
    /// Block alignment
    pub block_align: u16,
    /// Bits per sample (often 0 for compressed formats)
    pub bits_per_sample: u16,
    /// Size of Wwise-specific extra data in the fmt chunk
    pub extra_size: usize,
    /// Offset to audio data in the file
    pub data_offset: u64,
    /// Size of audio data
    pub data_size: u32,
    /// Total file length
    pub file_len: u64,
}

impl WemHeader {
    /// Bytes after the end of the RIFF payload (zero padding on size-matched files)
    #[must_use]
    pub fn trailing_bytes(&self) -> u64 {
        self.file_len.saturating_sub(u64::from(self.riff_size) + 8)
    }

    /// Estimated duration from the average byte rate
    #[must_use]
    pub fn estimated_duration_secs(&self) -> f32 {
        if self.avg_bytes_per_sec == 0 {
            return 0.0;
        }
        self.data_size as f32 / self.avg_bytes_per_sec as f32
    }
}

/// Parse a WEM header from a reader
pub fn parse_wem_header<R: Read + Seek>(reader: &mut R) -> Result<WemHeader> {
    let file_len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != RIFF_MAGIC {
        return Err(invalid("missing RIFF magic"));
    }

    let riff_size = reader.read_u32::<LittleEndian>()?;

    reader.read_exact(&mut magic)?;
    if &magic != WAVE_MAGIC {
        return Err(invalid("missing WAVE form type"));
    }

    let mut header = WemHeader {
        riff_size,
        format_code: 0,
        channels: 0,
        sample_rate: 0,
        avg_bytes_per_sec: 0,
        block_align: 0,
        bits_per_sample: 0,
        extra_size: 0,
        data_offset: 0,
        data_size: 0,
        file_len,
    };

    let mut found_fmt = false;
    let mut found_data = false;

    while !found_data {
        let mut chunk_id = [0u8; 4];
        if reader.read_exact(&mut chunk_id).is_err() {
            break;
        }

        let chunk_size = reader.read_u32::<LittleEndian>()?;
        let chunk_start = reader.stream_position()?;

        match &chunk_id {
            b"fmt " => {
                header.format_code = reader.read_u16::<LittleEndian>()?;
                header.channels = reader.read_u16::<LittleEndian>()?;
                header.sample_rate = reader.read_u32::<LittleEndian>()?;
                header.avg_bytes_per_sec = reader.read_u32::<LittleEndian>()?;
                header.block_align = reader.read_u16::<LittleEndian>()?;
                header.bits_per_sample = reader.read_u16::<LittleEndian>()?;
                header.extra_size = chunk_size.saturating_sub(16) as usize;
                found_fmt = true;
            }
            b"data" => {
                header.data_offset = chunk_start;
                header.data_size = chunk_size;
                found_data = true;
            }
            _ => {
                // vorb, smpl, cue, LIST etc.
            }
        }

        // Chunks are word aligned
        let next_pos = chunk_start + u64::from(chunk_size);
        reader.seek(SeekFrom::Start((next_pos + 1) & !1))?;
    }

    if !found_fmt {
        return Err(invalid("missing fmt chunk"));
    }
    if !found_data {
        return Err(invalid("missing data chunk"));
    }

    Ok(header)
}

/// Read and parse the header of a WEM file on disk
pub fn read_wem_header<P: AsRef<Path>>(path: P) -> Result<WemHeader> {
    let data = std::fs::read(path)?;
    parse_wem_header(&mut Cursor::new(data))
}

/// Human-readable name for a format code
#[must_use]
pub fn format_name(code: u16) -> &'static str {
    match code {
        0x0001 => "PCM",
        0x0002 => "ADPCM",
        0x0069 => "IMA ADPCM",
        0x3039 => "Opus (Wwise)",
        0x3040 => "Opus",
        0xFFFE => "PCM (extensible)",
        0xFFFF => "Wwise Vorbis",
        _ => "Unknown",
    }
}

fn invalid(message: &str) -> Error {
    Error::InvalidWem {
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_wem(format: u16, data_len: u32, padding: usize) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"RIFF");
        data.extend_from_slice(&(4 + 8 + 16 + 8 + data_len).to_le_bytes());
        data.extend_from_slice(b"WAVE");

        data.extend_from_slice(b"fmt ");
        data.extend_from_slice(&16u32.to_le_bytes());
        data.extend_from_slice(&format.to_le_bytes());
        data.extend_from_slice(&2u16.to_le_bytes());
        data.extend_from_slice(&48000u32.to_le_bytes());
        data.extend_from_slice(&192000u32.to_le_bytes());
        data.extend_from_slice(&4u16.to_le_bytes());
        data.extend_from_slice(&16u16.to_le_bytes());

        data.extend_from_slice(b"data");
        data.extend_from_slice(&data_len.to_le_bytes());
        data.extend(vec![0u8; data_len as usize]);
        data.extend(vec![0u8; padding]);
        data
    }

    #[test]
    fn test_parse_header() {
        let mut cursor = Cursor::new(minimal_wem(0xFFFF, 8, 0));
        let header = parse_wem_header(&mut cursor).unwrap();

        assert_eq!(header.format_code, 0xFFFF);
        assert_eq!(header.channels, 2);
        assert_eq!(header.sample_rate, 48000);
        assert_eq!(header.data_size, 8);
        assert_eq!(header.data_offset, 44);
        assert_eq!(header.trailing_bytes(), 0);
        assert_eq!(format_name(header.format_code), "Wwise Vorbis");
    }

    #[test]
    fn test_trailing_padding() {
        let mut cursor = Cursor::new(minimal_wem(1, 4, 100));
        let header = parse_wem_header(&mut cursor).unwrap();
        assert_eq!(header.trailing_bytes(), 100);
    }

    #[test]
    fn test_not_riff() {
        let mut cursor = Cursor::new(b"OggS\0\0\0\0\0\0\0\0".to_vec());
        assert!(matches!(
            parse_wem_header(&mut cursor),
            Err(Error::InvalidWem { .. })
        ));
    }
}
