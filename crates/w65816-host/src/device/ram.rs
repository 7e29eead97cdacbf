//! Flat read/write RAM.

use serde_json::json;

use super::Device;
use crate::save_state::SaveStateError;

/// A flat block of read/write memory, zero-initialized at construction.
///
/// Grounded on `rustynes-core::bus::NesBus`'s `[u8; 0x0800]` internal RAM
/// array, generalized to a runtime-configurable size since this crate's
/// address map is not fixed at compile time.
#[derive(Debug, Clone)]
pub struct Ram {
    data: Vec<u8>,
}

impl Ram {
    /// `size` bytes of zeroed storage.
    #[must_use]
    pub fn new(size: u32) -> Self {
        Ram { data: vec![0; size as usize] }
    }
}

impl Device for Ram {
    fn read(&mut self, offset: u32) -> Option<u8> {
        self.data.get(offset as usize).copied()
    }

    fn write(&mut self, offset: u32, value: u8) {
        if let Some(slot) = self.data.get_mut(offset as usize) {
            *slot = value;
        }
    }

    fn peek(&self, offset: u32) -> Option<u8> {
        self.data.get(offset as usize).copied()
    }

    fn reset(&mut self) {
        self.data.fill(0);
    }

    fn kind(&self) -> &'static str {
        "ram"
    }

    fn size(&self) -> u32 {
        self.data.len() as u32
    }

    fn params(&self) -> serde_json::Value {
        json!({ "size": self.data.len() })
    }

    fn ram_dump(&self) -> Option<&[u8]> {
        Some(&self.data)
    }

    fn load_ram_dump(&mut self, bytes: &[u8]) {
        self.data.clear();
        self.data.extend_from_slice(bytes);
    }
}

/// Construct a [`Ram`] from save-state `params` (`{"size": <bytes>}`).
///
/// # Errors
///
/// Returns [`SaveStateError::MalformedParams`] if `params` is not of that
/// shape.
pub(crate) fn from_params(params: &serde_json::Value) -> Result<Box<dyn Device>, SaveStateError> {
    let size = params
        .get("size")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| SaveStateError::MalformedParams("ram".to_string()))?;
    Ok(Box::new(Ram::new(size as u32)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_write_round_trips() {
        let mut ram = Ram::new(0x10);
        ram.write(4, 0xAB);
        assert_eq!(ram.read(4), Some(0xAB));
    }

    #[test]
    fn out_of_range_is_none() {
        let mut ram = Ram::new(0x10);
        assert_eq!(ram.read(0x100), None);
    }

    #[test]
    fn reset_zeroes_storage() {
        let mut ram = Ram::new(4);
        ram.write(0, 0xFF);
        ram.reset();
        assert_eq!(ram.read(0), Some(0));
    }

    #[test]
    fn from_params_round_trips_size() {
        let device = from_params(&json!({ "size": 8 })).unwrap();
        assert_eq!(device.ram_dump().map(<[u8]>::len), Some(8));
    }
}
