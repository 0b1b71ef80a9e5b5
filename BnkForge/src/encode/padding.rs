//! Zero-padding of encoded artifacts to an exact byte size
//!
//! Padding goes after the RIFF payload. Readers that honour the RIFF size
//! field ignore the trailing zeros; the engine only needs the file length to
//! match the size recorded in the bank.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::error::{Error, Result};

/// Size of the zero buffer written per chunk
const CHUNK_SIZE: usize = 64 * 1024;

/// Append zero bytes to `path` until it is exactly `target` bytes long
///
/// Returns the number of bytes appended. A file already larger than
/// `target` is left untouched and reported as [`Error::PaddingOverflow`].
pub fn pad_to_size(path: &Path, target: u64) -> Result<u64> {
    let actual = std::fs::metadata(path)?.len();
    if actual > target {
        return Err(Error::PaddingOverflow { actual, target });
    }

    let padding = target - actual;
    if padding > 0 {
        let mut file = OpenOptions::new().append(true).open(path)?;
        let zeros = vec![0u8; CHUNK_SIZE.min(padding as usize)];
        let mut remaining = padding;
        while remaining > 0 {
            let n = remaining.min(zeros.len() as u64) as usize;
            file.write_all(&zeros[..n])?;
            remaining -= n as u64;
        }
        file.sync_all()?;
    }

    let written = std::fs::metadata(path)?.len();
    if written != target {
        return Err(Error::PaddingMismatch {
            actual: written,
            target,
        });
    }

    tracing::debug!("Padded {} with {} bytes to {}", path.display(), padding, target);
    Ok(padding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_appends_zeros() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wem");
        std::fs::write(&path, b"RIFF1234").unwrap();

        assert_eq!(pad_to_size(&path, 20).unwrap(), 12);

        let data = std::fs::read(&path).unwrap();
        assert_eq!(data.len(), 20);
        assert_eq!(&data[..8], b"RIFF1234");
        assert!(data[8..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_pad_exact_size_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wem");
        std::fs::write(&path, [7u8; 16]).unwrap();
        assert_eq!(pad_to_size(&path, 16).unwrap(), 0);
        assert_eq!(std::fs::read(&path).unwrap(), vec![7u8; 16]);
    }

    #[test]
    fn test_pad_larger_than_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wem");
        std::fs::write(&path, [1u8; 3]).unwrap();
        let target = (CHUNK_SIZE * 2 + 17) as u64;
        assert_eq!(pad_to_size(&path, target).unwrap(), target - 3);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), target);
    }

    #[test]
    fn test_pad_overflow() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wem");
        std::fs::write(&path, [1u8; 32]).unwrap();
        assert!(matches!(
            pad_to_size(&path, 31),
            Err(Error::PaddingOverflow {
                actual: 32,
                target: 31
            })
        ));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 32);
    }
}
