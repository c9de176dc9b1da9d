// gba-backup-rs/src/core/cartridge/backup/eeprom.rs

//! Serial EEPROM (512 bytes / 8 KB).
//!
//! The chip is not on the data bus at all: the game talks to it one bit at a
//! time through the EEPROM data port. Every transfer is a 2-bit command, a
//! block address (6 or 14 bits, MSB first) and, for writes, 64 data bits. A
//! read command takes one extra address bit and then clocks out 4 dummy bits
//! followed by the 64 bits of the block.
//!
//! Storage is kept in 8-byte blocks. Data bit `n` of a transfer maps to byte
//! `7 - n / 8`, bit `7 - n % 8` of the block, so the first bit on the wire is
//! the MSB of the block's last byte. This mirrors the chip's shift register
//! and save files depend on it.
//!
//! After a block write the chip stays busy for [`WRITE_BUSY_CYCLES`]. Busy is
//! not driven by a timer; it is resolved against the cycle counter the next
//! time the game touches the data port.

use super::{open_bus, BackendKind, StorageBackend, StorageError, StorageResult};
use crate::core::clock::CycleSource;
use crate::core::state::{StateHeader, StateReader, StateWriter, STATE_HEADER_SIZE};
use log::{debug, trace, warn};

/// Program/erase time of one block, in CPU cycles.
pub const WRITE_BUSY_CYCLES: u64 = 0x1A750;

/// Data bits per block.
const BLOCK_BITS: u32 = 64;

/// Dummy bits clocked out before the data of a read.
const READ_LEAD_BITS: u32 = 4;

/// EEPROM protocol state. The discriminants are the save-state codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum EepromState {
    /// Waiting for a command
    Idle = 0,
    /// Shifting in 64 data bits
    WriteData = 2,
    /// Shifting out 4 + 64 bits
    ReadData = 3,
    /// Command `01`; ignores everything until reset
    Invalid = 5,
    /// Shifting in the block address of a write
    WriteAddress = 6,
    /// Shifting in the block address of a read, plus one trailing bit
    ReadAddress = 7,
}

impl EepromState {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(EepromState::Idle),
            2 => Some(EepromState::WriteData),
            3 => Some(EepromState::ReadData),
            5 => Some(EepromState::Invalid),
            6 => Some(EepromState::WriteAddress),
            7 => Some(EepromState::ReadAddress),
            _ => None,
        }
    }
}

/// EEPROM capacity. It fixes the width of the block address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EepromSize {
    /// 512 bytes, 6-bit addresses
    Small,
    /// 8 KB, 14-bit addresses (only the low 10 are decoded)
    Large,
}

impl EepromSize {
    /// Only `0x1FF` selects the small chip.
    pub fn from_size_mask(size_mask: u32) -> Self {
        if size_mask == 0x1FF {
            EepromSize::Small
        } else {
            EepromSize::Large
        }
    }

    pub fn size_mask(self) -> u32 {
        match self {
            EepromSize::Small => 0x1FF,
            EepromSize::Large => 0x1FFF,
        }
    }

    pub fn bytes(self) -> usize {
        self.size_mask() as usize + 1
    }

    pub fn address_bits(self) -> u32 {
        match self {
            EepromSize::Small => 6,
            EepromSize::Large => 14,
        }
    }

    pub fn address_mask(self) -> u32 {
        match self {
            EepromSize::Small => 0x3F,
            EepromSize::Large => 0x3FF,
        }
    }
}

/// Serial EEPROM chip
#[derive(Debug, Clone)]
pub struct Eeprom {
    ready: bool,
    size: EepromSize,
    bit_offset: u32,
    bit_read: u32,
    access_address: u32,
    current_state: EepromState,
    next_state: u32,
    next_ready_cycle: u64,

    clock: CycleSource,
    data: Vec<u8>,
    dirty: bool,
}

impl Eeprom {
    pub fn new(size: EepromSize, clock: CycleSource) -> Self {
        let mut eeprom = Self {
            ready: true,
            size,
            bit_offset: 0,
            bit_read: 0,
            access_address: 0,
            current_state: EepromState::Idle,
            next_state: 0,
            next_ready_cycle: 0,
            clock,
            data: vec![0xFF; size.bytes()],
            dirty: false,
        };
        eeprom.reset();
        eeprom
    }

    /// Builds the chip from a raw size mask, as found in cartridge databases.
    pub fn with_size_mask(size_mask: u32, clock: CycleSource) -> Self {
        Self::new(EepromSize::from_size_mask(size_mask), clock)
    }

    pub fn size(&self) -> EepromSize {
        self.size
    }

    pub fn size_mask(&self) -> u32 {
        self.size.size_mask()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn state(&self) -> EepromState {
        self.current_state
    }

    pub fn access_address(&self) -> u32 {
        self.access_address
    }

    pub fn next_ready_cycle(&self) -> u64 {
        self.next_ready_cycle
    }

    /// Hands the storage back at unload.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    fn block_offset(&self) -> usize {
        (self.access_address << 3) as usize
    }

    /// Busy ends once the cycle counter reaches the deadline.
    fn resolve_busy(&mut self) {
        if self.clock.now() >= self.next_ready_cycle {
            self.ready = true;
        }
    }

    fn decode_command(&mut self, bit: u32) {
        self.resolve_busy();
        if !self.ready {
            return;
        }

        self.access_address = 0;

        if self.bit_offset == 0 {
            self.next_state = bit;
            self.bit_offset = 1;
            return;
        }

        self.next_state = (self.next_state << 1) | bit;
        self.bit_offset = 0;

        self.current_state = match self.next_state {
            0 => EepromState::Idle,
            1 => {
                warn!("EEPROM command 01 is undefined, chip stops responding until reset");
                EepromState::Invalid
            }
            2 => EepromState::WriteAddress,
            _ => EepromState::ReadAddress,
        };
        trace!("EEPROM command {:02b} -> {:?}", self.next_state, self.current_state);
    }

    /// Shifts one address bit. Reads take one trailing bit after the address.
    fn shift_address(&mut self, bit: u32, read: bool) {
        let width = self.size.address_bits();
        let total = if read { width + 1 } else { width };

        if self.bit_offset >= total {
            return;
        }

        if self.bit_offset < width {
            self.access_address = (self.access_address | bit) << 1;
        }
        self.bit_offset += 1;

        if self.bit_offset == total {
            if read && bit != 0 {
                // The chip proceeds anyway
                warn!("EEPROM read address not terminated by 0");
            }

            self.access_address = (self.access_address >> 1) & self.size.address_mask();
            self.bit_offset = 0;
            self.current_state = if read {
                EepromState::ReadData
            } else {
                EepromState::WriteData
            };
            trace!("EEPROM block {:#x} -> {:?}", self.access_address, self.current_state);
        }
    }

    fn shift_in(&mut self, bit: u32) {
        if self.bit_read < BLOCK_BITS {
            let byte = self.block_offset() + 7 - (self.bit_read >> 3) as usize;
            let shift = 7 - (self.bit_read & 7);
            self.data[byte] = (self.data[byte] & !(1u8 << shift)) | ((bit as u8) << shift);
        }

        self.bit_read += 1;

        // 64 data bits, then one terminator bit
        if self.bit_read == BLOCK_BITS + 1 {
            if bit != 0 {
                warn!("EEPROM write not terminated by 0");
            }

            self.bit_read = 0;
            self.current_state = EepromState::Idle;
            self.ready = false;
            self.next_ready_cycle = self.clock.now().saturating_add(WRITE_BUSY_CYCLES);
            self.dirty = true;
            debug!(
                "EEPROM block {:#x} written, busy until cycle {}",
                self.access_address, self.next_ready_cycle
            );
        }
    }

    fn shift_out(&mut self) -> u8 {
        if self.bit_read < READ_LEAD_BITS {
            self.bit_read += 1;
            return 0;
        }

        let bit = self.bit_read - READ_LEAD_BITS;
        let byte = self.data[self.block_offset() + 7 - (bit >> 3) as usize];
        let out = (byte >> (7 - (bit & 7))) & 1;

        self.bit_read += 1;

        if self.bit_read == READ_LEAD_BITS + BLOCK_BITS {
            self.bit_read = 0;
            self.current_state = EepromState::Idle;
            self.ready = true;
            debug!("EEPROM block {:#x} read", self.access_address);
        }

        out
    }

    /// Rejects counters the state machine could never have produced.
    fn check_transfer(&self, state: EepromState, header: &StateHeader) -> StorageResult<()> {
        let width = self.size.address_bits();
        let (max_offset, max_read) = match state {
            EepromState::Idle => (1, 0),
            EepromState::WriteAddress => (width - 1, 0),
            EepromState::ReadAddress => (width, 0),
            EepromState::WriteData => (0, BLOCK_BITS),
            EepromState::ReadData => (0, READ_LEAD_BITS + BLOCK_BITS - 1),
            EepromState::Invalid => (0, 0),
        };
        // A half-decoded command holds a single bit
        let max_next = if state == EepromState::Idle && header.bit_offset == 1 {
            1
        } else {
            3
        };

        if header.bit_offset > max_offset || header.bit_read > max_read || header.next_state > max_next {
            return Err(StorageError::TransferOutOfRange {
                state: header.current_state,
                bit_offset: header.bit_offset,
                bit_read: header.bit_read,
                next_state: header.next_state,
            });
        }
        Ok(())
    }

    fn header(&self) -> StateHeader {
        StateHeader {
            ready: self.ready,
            size_mask: self.size.size_mask(),
            bit_offset: self.bit_offset,
            bit_read: self.bit_read,
            access_address: self.access_address,
            current_state: self.current_state.code(),
            next_state: self.next_state,
            next_ready_cycle: self.next_ready_cycle,
        }
    }
}

impl StorageBackend for Eeprom {
    fn kind(&self) -> BackendKind {
        BackendKind::Eeprom(self.size)
    }

    // The EEPROM is not mapped in the backup region
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

    fn reset(&mut self) {
        self.ready = true;
        self.bit_offset = 0;
        self.bit_read = 0;
        self.access_address = 0;
        self.current_state = EepromState::Idle;
        self.next_state = 0;
        self.next_ready_cycle = 0;
        debug!("EEPROM reset");
    }

    fn eeprom_read_bit(&mut self) -> u8 {
        match self.current_state {
            EepromState::Idle => {
                self.resolve_busy();
                self.ready as u8
            }
            EepromState::ReadData => self.shift_out(),
            _ => 0,
        }
    }

    fn eeprom_write_bit(&mut self, bit: u8) {
        let bit = (bit & 1) as u32;
        match self.current_state {
            EepromState::Idle => self.decode_command(bit),
            EepromState::WriteAddress => self.shift_address(bit, false),
            EepromState::ReadAddress => self.shift_address(bit, true),
            EepromState::WriteData => self.shift_in(bit),
            EepromState::ReadData | EepromState::Invalid => {}
        }
    }

    fn save_data(&self) -> Option<&[u8]> {
        Some(&self.data)
    }

    fn load_save_data(&mut self, data: &[u8]) {
        if data.len() != self.data.len() {
            warn!(
                "EEPROM save is {} bytes, chip holds {}",
                data.len(),
                self.data.len()
            );
        }
        let len = data.len().min(self.data.len());
        self.data[..len].copy_from_slice(&data[..len]);
        self.dirty = false;
    }

    fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn state_size(&self) -> usize {
        STATE_HEADER_SIZE + self.data.len()
    }

    fn save_state(&self, w: &mut StateWriter<'_>) {
        self.header().save(w);
        w.save_bytes(&self.data);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> StorageResult<()> {
        let header = StateHeader::load(r);

        let expected = self.size.size_mask();
        if header.size_mask != expected {
            return Err(StorageError::SizeMaskMismatch {
                expected,
                actual: header.size_mask,
            });
        }

        let state = EepromState::from_code(header.current_state)
            .ok_or(StorageError::InvalidStateCode(header.current_state))?;

        let transferring = matches!(state, EepromState::WriteData | EepromState::ReadData);
        if transferring && header.access_address > self.size.address_mask() {
            return Err(StorageError::AddressOutOfRange(header.access_address));
        }
        self.check_transfer(state, &header)?;

        r.load_bytes(&mut self.data);

        self.ready = header.ready;
        self.bit_offset = header.bit_offset;
        self.bit_read = header.bit_read;
        self.access_address = header.access_address;
        self.current_state = state;
        self.next_state = header.next_state;
        self.next_ready_cycle = header.next_ready_cycle;
        Ok(())
    }
}
