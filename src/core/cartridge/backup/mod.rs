// gba-backup-rs/src/core/cartridge/backup/mod.rs

//! Cartridge backup storage module
//!
//! A GBA cartridge carries at most one backup chip: battery-backed SRAM or a
//! serial EEPROM (or nothing at all). All of them share the [`StorageBackend`]
//! interface; the cartridge loader picks one with [`create_backend`] and the
//! bus keeps the resulting [`Backend`] for the whole session.

pub mod eeprom;
pub mod none;
pub mod sram;

// Re-export types
pub use eeprom::{Eeprom, EepromSize, EepromState, WRITE_BUSY_CYCLES};
pub use none::NullStorage;
pub use sram::SaveRam;

use crate::core::clock::CycleSource;
use crate::core::state::{StateReader, StateWriter};
use log::info;
use num_traits::PrimInt;
use std::fmt;

/// Errors raised when a caller breaks the storage contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Save-state blob has the wrong length for this chip.
    StateSizeMismatch { expected: usize, actual: usize },
    /// Save-state blob was taken from a chip of a different size.
    SizeMaskMismatch { expected: u32, actual: u32 },
    /// Unknown EEPROM protocol state code.
    InvalidStateCode(u32),
    /// Block address past the end of the EEPROM.
    AddressOutOfRange(u32),
    /// Transfer counters that no bit sequence can reach in this state.
    TransferOutOfRange {
        state: u32,
        bit_offset: u32,
        bit_read: u32,
        next_state: u32,
    },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::StateSizeMismatch { expected, actual } => {
                write!(f, "save state is {} bytes, expected {}", actual, expected)
            }
            StorageError::SizeMaskMismatch { expected, actual } => {
                write!(f, "save state size mask {:#x} does not match chip mask {:#x}", actual, expected)
            }
            StorageError::InvalidStateCode(code) => write!(f, "invalid EEPROM state code {}", code),
            StorageError::AddressOutOfRange(addr) => write!(f, "EEPROM block address {:#x} out of range", addr),
            StorageError::TransferOutOfRange {
                state,
                bit_offset,
                bit_read,
                next_state,
            } => write!(
                f,
                "EEPROM state {} cannot hold bit_offset {}, bit_read {}, next_state {}",
                state, bit_offset, bit_read, next_state
            ),
        }
    }
}

impl std::error::Error for StorageError {}

/// Tipo de resultado para operações de backup
pub type StorageResult<T> = Result<T, StorageError>;

/// Backup chip selected by the cartridge loader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// No backup chip
    None,
    /// 32KB battery-backed SRAM
    Sram,
    /// Serial EEPROM
    Eeprom(EepromSize),
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::None => write!(f, "None"),
            BackendKind::Sram => write!(f, "SRAM"),
            BackendKind::Eeprom(size) => write!(f, "EEPROM ({} bytes)", size.bytes()),
        }
    }
}

/// Value seen on the bus when nothing drives it.
pub(crate) fn open_bus<T: PrimInt>() -> T {
    T::max_value()
}

/// Interface shared by every backup chip.
///
/// Addresses are already decoded by the bus to target the backup region; a
/// chip only masks them to its own size.
pub trait StorageBackend {
    /// Which chip this is.
    fn kind(&self) -> BackendKind;

    fn read8(&mut self, addr: u32) -> u8;
    fn read16(&mut self, addr: u32) -> u16;
    fn read32(&mut self, addr: u32) -> u32;

    fn write8(&mut self, addr: u32, value: u8);
    fn write16(&mut self, addr: u32, value: u16);
    fn write32(&mut self, addr: u32, value: u32);

    /// Debugger read. Never changes chip state.
    fn peek8(&self, addr: u32) -> u8;

    /// Debugger write.
    fn poke8(&mut self, _addr: u32, _value: u8) {}

    /// Called once per emulated cycle.
    fn tick(&mut self) {}

    /// Return to the power-on state. Storage contents survive.
    fn reset(&mut self);

    /// Serial data line read (EEPROM data port).
    fn eeprom_read_bit(&mut self) -> u8 {
        0xFF
    }

    /// Serial data line write (EEPROM data port). Only bit 0 is used.
    fn eeprom_write_bit(&mut self, _bit: u8) {}

    /// Raw storage contents, for flushing to a save file.
    fn save_data(&self) -> Option<&[u8]> {
        None
    }

    /// Restore raw storage contents from a save file.
    fn load_save_data(&mut self, _data: &[u8]) {}

    /// True if storage changed since the last call.
    fn take_dirty(&mut self) -> bool {
        false
    }

    /// Length of the blob produced by [`StorageBackend::serialize`].
    fn state_size(&self) -> usize;

    fn save_state(&self, w: &mut StateWriter<'_>);

    /// Must validate everything before touching `self`.
    fn load_state(&mut self, r: &mut StateReader<'_>) -> StorageResult<()>;

    fn serialize(&self) -> Vec<u8> {
        let mut state = vec![0; self.state_size()];
        self.save_state(&mut StateWriter::new(&mut state));
        state
    }

    fn deserialize(&mut self, data: &[u8]) -> StorageResult<()> {
        let expected = self.state_size();
        if data.len() != expected {
            return Err(StorageError::StateSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        self.load_state(&mut StateReader::new(data))
    }
}

/// The active backup chip of a cartridge slot.
#[derive(Debug, Clone)]
pub enum Backend {
    None(NullStorage),
    Sram(SaveRam),
    Eeprom(Eeprom),
}

macro_rules! dispatch {
    ($self:expr, $chip:ident => $body:expr) => {
        match $self {
            Backend::None($chip) => $body,
            Backend::Sram($chip) => $body,
            Backend::Eeprom($chip) => $body,
        }
    };
}

impl Backend {
    /// Unload the cartridge, handing back storage for the save file.
    pub fn dispose(self) -> Option<Vec<u8>> {
        match self {
            Backend::None(_) => None,
            Backend::Sram(sram) => Some(sram.into_data()),
            Backend::Eeprom(eeprom) => Some(eeprom.into_data()),
        }
    }
}

impl StorageBackend for Backend {
    fn kind(&self) -> BackendKind {
        dispatch!(self, chip => chip.kind())
    }

    #[inline]
    fn read8(&mut self, addr: u32) -> u8 {
        dispatch!(self, chip => chip.read8(addr))
    }

    #[inline]
    fn read16(&mut self, addr: u32) -> u16 {
        dispatch!(self, chip => chip.read16(addr))
    }

    #[inline]
    fn read32(&mut self, addr: u32) -> u32 {
        dispatch!(self, chip => chip.read32(addr))
    }

    #[inline]
    fn write8(&mut self, addr: u32, value: u8) {
        dispatch!(self, chip => chip.write8(addr, value))
    }

    #[inline]
    fn write16(&mut self, addr: u32, value: u16) {
        dispatch!(self, chip => chip.write16(addr, value))
    }

    #[inline]
    fn write32(&mut self, addr: u32, value: u32) {
        dispatch!(self, chip => chip.write32(addr, value))
    }

    fn peek8(&self, addr: u32) -> u8 {
        dispatch!(self, chip => chip.peek8(addr))
    }

    fn poke8(&mut self, addr: u32, value: u8) {
        dispatch!(self, chip => chip.poke8(addr, value))
    }

    fn tick(&mut self) {
        dispatch!(self, chip => chip.tick())
    }

    fn reset(&mut self) {
        dispatch!(self, chip => chip.reset())
    }

    fn eeprom_read_bit(&mut self) -> u8 {
        dispatch!(self, chip => chip.eeprom_read_bit())
    }

    fn eeprom_write_bit(&mut self, bit: u8) {
        dispatch!(self, chip => chip.eeprom_write_bit(bit))
    }

    fn save_data(&self) -> Option<&[u8]> {
        dispatch!(self, chip => chip.save_data())
    }

    fn load_save_data(&mut self, data: &[u8]) {
        dispatch!(self, chip => chip.load_save_data(data))
    }

    fn take_dirty(&mut self) -> bool {
        dispatch!(self, chip => chip.take_dirty())
    }

    fn state_size(&self) -> usize {
        dispatch!(self, chip => chip.state_size())
    }

    fn save_state(&self, w: &mut StateWriter<'_>) {
        dispatch!(self, chip => chip.save_state(w))
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> StorageResult<()> {
        dispatch!(self, chip => chip.load_state(r))
    }
}

/// Factory function to create the backup chip of a freshly loaded cartridge
pub fn create_backend(kind: BackendKind, clock: CycleSource) -> Backend {
    match kind {
        BackendKind::None => {
            info!("No backup chip, backup region unmapped");
            Backend::None(NullStorage::new())
        }
        BackendKind::Sram => {
            info!("Creating SRAM backup ({} bytes)", SaveRam::SIZE);
            Backend::Sram(SaveRam::new())
        }
        BackendKind::Eeprom(size) => {
            info!("Creating serial EEPROM backup ({} bytes)", size.bytes());
            Backend::Eeprom(Eeprom::new(size, clock))
        }
    }
}
