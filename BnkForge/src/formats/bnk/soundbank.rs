//! A patch session over one SoundBank file

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

use super::entry::{SoundEntry, parse_entry};
use super::index::{EntryIndex, Signature, build_index, find_by_source_id};
use super::patcher::{PatchOutcome, PatchRequest, patch};
use super::RECORD_LEN;

/// An owned SoundBank buffer with a lazily built source index
///
/// One session exclusively owns its buffer: load, apply any number of
/// patches, then [`save`](Self::save) once. Sessions on the same path must
/// not run concurrently.
#[derive(Debug)]
pub struct SoundBank {
    path: Option<PathBuf>,
    data: Vec<u8>,
    signature: Signature,
    index: Option<EntryIndex>,
    dirty: bool,
}

impl SoundBank {
    /// Load a SoundBank file using the default record signature
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_signature(path, Signature::default())
    }

    /// Load a SoundBank file, scanning for `signature`
    pub fn open_with_signature<P: AsRef<Path>>(path: P, signature: Signature) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let data = std::fs::read(path)?;
        tracing::debug!("Loaded {} ({} bytes)", path.display(), data.len());

        let mut bank = Self::from_bytes_with_signature(data, signature)?;
        bank.path = Some(path.to_path_buf());
        Ok(bank)
    }

    /// Wrap an in-memory buffer
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_bytes_with_signature(data, Signature::default())
    }

    /// Wrap an in-memory buffer, scanning for `signature`
    pub fn from_bytes_with_signature(data: Vec<u8>, signature: Signature) -> Result<Self> {
        if data.len() < RECORD_LEN {
            return Err(Error::BufferTooShort {
                len: data.len(),
                min: RECORD_LEN,
            });
        }

        Ok(Self {
            path: None,
            data,
            signature,
            index: None,
            dirty: false,
        })
    }

    /// Path the bank was loaded from, if any
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether patches have been applied since the last load or save
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[must_use]
    pub fn signature(&self) -> Signature {
        self.signature
    }

    /// Whether the index has been built for the current buffer
    #[must_use]
    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }

    /// Get the source index, building it on first use
    ///
    /// Later calls return the cached index. Patches never change source
    /// IDs, so the index stays valid until [`reload`](Self::reload).
    pub fn index(&mut self) -> &EntryIndex {
        self.index
            .get_or_insert_with(|| build_index(&self.data, self.signature))
    }

    /// Drop the cached index
    pub fn invalidate_index(&mut self) {
        self.index = None;
    }

    /// Every complete record in buffer order
    pub fn entries(&mut self) -> Vec<SoundEntry> {
        let offsets = self.index().all_offsets();
        offsets
            .into_iter()
            .filter_map(|offset| parse_entry(&self.data, offset))
            .collect()
    }

    /// Records referencing `source_id`, optionally filtered by current size
    ///
    /// Returns [`Error::SourceNotFound`] when nothing matches. If every
    /// signature hit for the ID was truncated the error is
    /// [`Error::MalformedRecords`] instead; both count as "not found" for
    /// [`Error::is_not_found`].
    pub fn find(&mut self, source_id: u32, expected_size: Option<u32>) -> Result<Vec<SoundEntry>> {
        self.index();
        let Some(index) = self.index.as_ref() else {
            return Err(Error::SourceNotFound { source_id });
        };

        let entries = find_by_source_id(&self.data, index, source_id, expected_size);
        if !entries.is_empty() {
            return Ok(entries);
        }

        let truncated = index.truncated_count(source_id);
        if truncated > 0 && !index.contains(source_id) {
            tracing::warn!(
                "Source {} only has truncated record candidates ({})",
                source_id,
                truncated
            );
            return Err(Error::MalformedRecords {
                source_id,
                count: truncated,
            });
        }

        Err(Error::SourceNotFound { source_id })
    }

    /// Apply a patch to every matching record
    pub fn patch(&mut self, request: &PatchRequest) -> PatchOutcome {
        self.index();
        let Some(index) = self.index.as_ref() else {
            return PatchOutcome {
                source_id: request.source_id,
                offsets: Vec::new(),
                size_written: false,
                flag_written: false,
                overflow: None,
            };
        };

        let outcome = patch(&mut self.data, index, request);
        if outcome.wrote_anything() {
            self.dirty = true;
        }
        outcome
    }

    /// Write the whole buffer back to the path it was loaded from
    pub fn save(&mut self) -> Result<()> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| Error::InvalidPath("SoundBank has no backing file".to_string()))?;
        self.save_as(path)
    }

    /// Write the whole buffer to `path`
    ///
    /// Data goes to a temporary file next to the target first and is then
    /// renamed over it, so a failed write never leaves a half-written bank.
    pub fn save_as<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut temp = tempfile::NamedTempFile::new_in(&parent)?;
        temp.write_all(&self.data)?;
        temp.flush()?;
        temp.persist(path)?;

        tracing::info!("Saved {} ({} bytes)", path.display(), self.data.len());
        self.dirty = false;
        Ok(())
    }

    /// Re-read the backing file, discarding unsaved patches and the index
    pub fn reload(&mut self) -> Result<()> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| Error::InvalidPath("SoundBank has no backing file".to_string()))?;
        let data = std::fs::read(&path)?;
        if data.len() < RECORD_LEN {
            return Err(Error::BufferTooShort {
                len: data.len(),
                min: RECORD_LEN,
            });
        }
        self.data = data;
        self.index = None;
        self.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_record_bank(source_id: u32, size: u32) -> Vec<u8> {
        let mut buf = vec![0u8; 16];
        buf.extend_from_slice(&77u32.to_le_bytes());
        buf.extend_from_slice(Signature::default().as_bytes());
        buf.extend_from_slice(&source_id.to_le_bytes());
        buf.extend_from_slice(&size.to_le_bytes());
        buf.extend_from_slice(&[0, 0]);
        buf.extend(vec![0u8; 16]);
        buf
    }

    #[test]
    fn test_too_short() {
        let err = SoundBank::from_bytes(vec![0u8; 10]).unwrap_err();
        assert!(matches!(err, Error::BufferTooShort { len: 10, min: 19 }));
    }

    #[test]
    fn test_lazy_index() {
        let mut bank = SoundBank::from_bytes(single_record_bank(5, 10)).unwrap();
        assert!(!bank.is_indexed());
        assert_eq!(bank.index().len(), 1);
        assert!(bank.is_indexed());
        bank.invalidate_index();
        assert!(!bank.is_indexed());
    }

    #[test]
    fn test_find_not_found() {
        let mut bank = SoundBank::from_bytes(single_record_bank(5, 10)).unwrap();
        assert!(matches!(
            bank.find(6, None),
            Err(Error::SourceNotFound { source_id: 6 })
        ));
        assert!(matches!(
            bank.find(5, Some(11)),
            Err(Error::SourceNotFound { source_id: 5 })
        ));
    }

    #[test]
    fn test_find_truncated_only() {
        let mut data = single_record_bank(5, 10);
        // Cut the trailing padding and the flag bytes
        data.truncate(16 + 17);
        let mut bank = SoundBank::from_bytes(data).unwrap();
        let err = bank.find(5, None).unwrap_err();
        assert!(matches!(err, Error::MalformedRecords { source_id: 5, count: 1 }));
        assert!(err.is_not_found());
        assert!(bank.find(6, None).unwrap_err().is_not_found());
    }

    #[test]
    fn test_patch_marks_dirty() {
        let mut bank = SoundBank::from_bytes(single_record_bank(5, 10)).unwrap();
        assert!(!bank.patch(&PatchRequest::new(6).size(1)).matched());
        assert!(!bank.is_dirty());
        assert!(bank.patch(&PatchRequest::new(5).size(20)).matched());
        assert!(bank.is_dirty());
        assert_eq!(bank.find(5, Some(20)).unwrap().len(), 1);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.bnk");
        std::fs::write(&path, single_record_bank(5, 10)).unwrap();

        let mut bank = SoundBank::open(&path).unwrap();
        bank.patch(&PatchRequest::new(5).size(99));
        bank.save().unwrap();
        assert!(!bank.is_dirty());

        let mut reopened = SoundBank::open(&path).unwrap();
        assert_eq!(reopened.find(5, None).unwrap()[0].file_size, 99);

        // Unsaved changes are dropped on reload
        reopened.patch(&PatchRequest::new(5).size(1));
        reopened.reload().unwrap();
        assert!(!reopened.is_indexed());
        assert_eq!(reopened.find(5, None).unwrap()[0].file_size, 99);
    }

    #[test]
    fn test_open_missing() {
        assert!(matches!(
            SoundBank::open("/definitely/not/here.bnk"),
            Err(Error::FileNotFound { .. })
        ));
    }
}
