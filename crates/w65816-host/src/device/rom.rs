//! File-backed read-only memory.

use std::path::{Path, PathBuf};

use serde_json::json;

use super::Device;
use crate::save_state::SaveStateError;

/// Errors loading a ROM image from disk.
///
/// Grounded on `rustynes-mappers::rom::RomError`'s variant naming, trimmed
/// to what a flat (non-iNES) image needs: no magic number, no PRG/CHR size
/// fields, just "did the file exist and read back nonempty".
#[derive(Debug, thiserror::Error)]
pub enum RomError {
    /// The file could not be opened or read.
    #[error("failed to read ROM file {path}: {source}")]
    Io {
        /// The path that failed to read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file was read but contained no bytes.
    #[error("ROM file {0} is empty")]
    Empty(PathBuf),
}

/// Read-only memory backed by a file loaded once at construction.
///
/// Writes are silently dropped (never mutate `data`) but are counted in
/// `bad_write_count`, matching `rustynes-mappers`'s `write_prg` being a
/// no-op for ROM-backed cartridge regions while still being a real,
/// observable event worth a log line.
#[derive(Debug, Clone)]
pub struct Rom {
    path: PathBuf,
    data: Vec<u8>,
    bad_write_count: u64,
}

impl Rom {
    /// Load `path` into memory.
    ///
    /// # Errors
    ///
    /// Returns [`RomError::Io`] if the file cannot be read, or
    /// [`RomError::Empty`] if it contains no bytes.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RomError> {
        let path = path.as_ref().to_path_buf();
        let data = std::fs::read(&path).map_err(|source| RomError::Io { path: path.clone(), source })?;
        if data.is_empty() {
            return Err(RomError::Empty(path));
        }
        Ok(Rom { path, data, bad_write_count: 0 })
    }

    /// Re-read the backing file, replacing the in-memory image.
    ///
    /// # Errors
    ///
    /// Same as [`Rom::from_file`].
    pub fn reload(&mut self) -> Result<(), RomError> {
        let data = std::fs::read(&self.path).map_err(|source| RomError::Io { path: self.path.clone(), source })?;
        if data.is_empty() {
            return Err(RomError::Empty(self.path.clone()));
        }
        self.data = data;
        Ok(())
    }

    /// Number of writes attempted against this ROM since construction.
    #[must_use]
    pub fn bad_write_count(&self) -> u64 {
        self.bad_write_count
    }
}

impl Device for Rom {
    fn read(&mut self, offset: u32) -> Option<u8> {
        self.data.get(offset as usize).copied()
    }

    fn write(&mut self, offset: u32, _value: u8) {
        self.bad_write_count += 1;
        log::warn!("rom: write to read-only device at offset {offset:#06x} dropped");
    }

    fn peek(&self, offset: u32) -> Option<u8> {
        self.data.get(offset as usize).copied()
    }

    fn kind(&self) -> &'static str {
        "rom"
    }

    fn size(&self) -> u32 {
        self.data.len() as u32
    }

    fn params(&self) -> serde_json::Value {
        json!({ "path": self.path })
    }

    fn to_state(&self) -> serde_json::Value {
        json!({ "bad_write_count": self.bad_write_count })
    }

    fn load_state(&mut self, state: &serde_json::Value) -> Result<(), SaveStateError> {
        if let Some(count) = state.get("bad_write_count").and_then(serde_json::Value::as_u64) {
            self.bad_write_count = count;
        }
        Ok(())
    }
}

/// Construct a [`Rom`] from save-state `params` (`{"path": <string>}`).
///
/// # Errors
///
/// Returns [`SaveStateError::MalformedParams`] if `params` is not of that
/// shape, or [`SaveStateError::Io`] if the file cannot be read.
pub(crate) fn from_params(params: &serde_json::Value) -> Result<Box<dyn Device>, SaveStateError> {
    let path = params
        .get("path")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| SaveStateError::MalformedParams("rom".to_string()))?;
    Ok(Box::new(Rom::from_file(path).map_err(|e| match e {
        RomError::Io { source, .. } => SaveStateError::Io(source),
        RomError::Empty(p) => SaveStateError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("ROM file {} is empty", p.display()),
        )),
    })?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_file_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[1, 2, 3, 4]).unwrap();
        let mut rom = Rom::from_file(file.path()).unwrap();
        assert_eq!(rom.read(0), Some(1));
        assert_eq!(rom.read(3), Some(4));
    }

    #[test]
    fn writes_are_dropped_but_counted() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[1, 2, 3, 4]).unwrap();
        let mut rom = Rom::from_file(file.path()).unwrap();
        rom.write(0, 0xFF);
        assert_eq!(rom.read(0), Some(1));
        assert_eq!(rom.bad_write_count(), 1);
    }

    #[test]
    fn empty_file_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(Rom::from_file(file.path()), Err(RomError::Empty(_))));
    }

    #[test]
    fn missing_file_is_rejected() {
        assert!(matches!(Rom::from_file("/nonexistent/path/rom.bin"), Err(RomError::Io { .. })));
    }

    #[test]
    fn reload_replaces_image() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[1, 2, 3]).unwrap();
        let mut rom = Rom::from_file(file.path()).unwrap();
        file.as_file().set_len(0).unwrap();
        use std::io::Seek;
        file.as_file_mut().seek(std::io::SeekFrom::Start(0)).unwrap();
        file.write_all(&[9, 9]).unwrap();
        rom.reload().unwrap();
        assert_eq!(rom.read(0), Some(9));
        assert_eq!(rom.read(2), None);
    }
}
