//! Battery-backed Save RAM.
//!
//! The SRAM chip sits on an 8-bit data bus. Wider CPU reads see the same byte
//! on every lane, and wider writes only store the lane selected by the low
//! address bits.

use super::{BackendKind, StorageBackend, StorageError, StorageResult};
use crate::core::state::{StateHeader, StateReader, StateWriter, STATE_HEADER_SIZE};
use log::warn;
use num_traits::{AsPrimitive, PrimInt};
use std::mem::size_of;

/// Byte replicated on every lane of a wider read.
fn replicate<T: PrimInt + From<u8>>(byte: u8) -> T {
    let byte = <T as From<u8>>::from(byte);
    (0..size_of::<T>()).fold(T::zero(), |acc, lane| acc | (byte << (lane * 8)))
}

/// Byte driven on `lane` by a wider write.
fn lane<T: PrimInt + AsPrimitive<u8>>(value: T, lane: usize) -> u8 {
    (value >> (lane * 8)).as_()
}

/// Save RAM com suporte a persistência
#[derive(Debug, Clone)]
pub struct SaveRam {
    data: Vec<u8>,
    dirty: bool,
}

impl SaveRam {
    pub const SIZE: usize = 0x8000;
    const MASK: u32 = Self::SIZE as u32 - 1;

    /// Cria uma nova Save RAM, erased to 0xFF
    pub fn new() -> Self {
        Self {
            data: vec![0xFF; Self::SIZE],
            dirty: false,
        }
    }

    /// Hands the storage back at unload.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    fn offset(addr: u32) -> usize {
        (addr & Self::MASK) as usize
    }

    fn store(&mut self, addr: u32, value: u8) {
        self.data[Self::offset(addr)] = value;
        self.dirty = true;
    }

    fn read_lanes<T: PrimInt + From<u8>>(&self, addr: u32) -> T {
        replicate(self.data[Self::offset(addr)])
    }

    fn write_lane<T: PrimInt + AsPrimitive<u8>>(&mut self, addr: u32, value: T) {
        let lanes = size_of::<T>() as u32;
        self.store(addr, lane(value, (addr % lanes) as usize));
    }
}

impl Default for SaveRam {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for SaveRam {
    fn kind(&self) -> BackendKind {
        BackendKind::Sram
    }

    fn read8(&mut self, addr: u32) -> u8 {
        self.data[Self::offset(addr)]
    }

    fn read16(&mut self, addr: u32) -> u16 {
        self.read_lanes(addr)
    }

    fn read32(&mut self, addr: u32) -> u32 {
        self.read_lanes(addr)
    }

    fn write8(&mut self, addr: u32, value: u8) {
        self.store(addr, value);
    }

    fn write16(&mut self, addr: u32, value: u16) {
        self.write_lane(addr, value);
    }

    fn write32(&mut self, addr: u32, value: u32) {
        self.write_lane(addr, value);
    }

    fn peek8(&self, addr: u32) -> u8 {
        self.data[Self::offset(addr)]
    }

    // Debugger edits are not game writes
    fn poke8(&mut self, addr: u32, value: u8) {
        self.data[Self::offset(addr)] = value;
    }

    fn reset(&mut self) {}

    fn save_data(&self) -> Option<&[u8]> {
        Some(&self.data)
    }

    fn load_save_data(&mut self, data: &[u8]) {
        if data.len() != Self::SIZE {
            warn!("Save RAM file is {} bytes, expected {}", data.len(), Self::SIZE);
        }
        let len = data.len().min(Self::SIZE);
        self.data[..len].copy_from_slice(&data[..len]);
        self.dirty = false;
    }

    fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn state_size(&self) -> usize {
        STATE_HEADER_SIZE + Self::SIZE
    }

    fn save_state(&self, w: &mut StateWriter<'_>) {
        StateHeader::idle(Self::MASK).save(w);
        w.save_bytes(&self.data);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> StorageResult<()> {
        let header = StateHeader::load(r);
        if header.size_mask != Self::MASK {
            return Err(StorageError::SizeMaskMismatch {
                expected: Self::MASK,
                actual: header.size_mask,
            });
        }
        r.load_bytes(&mut self.data);
        Ok(())
    }
}
