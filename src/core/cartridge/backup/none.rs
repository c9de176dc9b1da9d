// gba-backup-rs/src/core/cartridge/backup/none.rs

use super::{open_bus, BackendKind, StorageBackend, StorageError, StorageResult};
use crate::core::state::{StateHeader, StateReader, StateWriter, STATE_HEADER_SIZE};

/// Cartridge without backup storage. Nothing drives the bus.
#[derive(Debug, Clone, Default)]
pub struct NullStorage;

impl NullStorage {
    pub fn new() -> Self {
        Self
    }
}

impl StorageBackend for NullStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::None
    }

    fn read8(&mut self, _addr: u32) -> u8 {
        open_bus()
    }

    fn read16(&mut self, _addr: u32) -> u16 {
        open_bus()
    }

    fn read32(&mut self, _addr: u32) -> u32 {
        open_bus()
    }

    fn write8(&mut self, _addr: u32, _value: u8) {}

    fn write16(&mut self, _addr: u32, _value: u16) {}

    fn write32(&mut self, _addr: u32, _value: u32) {}

    fn peek8(&self, _addr: u32) -> u8 {
        open_bus()
    }

    fn reset(&mut self) {}

    fn state_size(&self) -> usize {
        STATE_HEADER_SIZE
    }

    fn save_state(&self, w: &mut StateWriter<'_>) {
        StateHeader::idle(0).save(w);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> StorageResult<()> {
        let header = StateHeader::load(r);
        if header.size_mask != 0 {
            return Err(StorageError::SizeMaskMismatch {
                expected: 0,
                actual: header.size_mask,
            });
        }
        Ok(())
    }
}
