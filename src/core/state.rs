// gba-backup-rs/src/core/state.rs

//! Save-state byte cursors.
//!
//! Every backup chip writes the same fixed header followed by its raw
//! storage. Fields are little-endian regardless of host byte order:
//!
//! ```text
//! ready(1) size_mask(4) bit_offset(4) bit_read(4) access_address(4)
//! current_state(4) next_state(4) next_ready_cycle(8) [storage...]
//! ```
//!
//! The cursors do no bounds checking of their own. Callers size the buffer
//! from [`STATE_HEADER_SIZE`] plus the chip's storage length; running off the
//! end is a caller bug and panics through slice indexing.

/// Size of the fixed register header shared by every backup chip.
pub const STATE_HEADER_SIZE: usize = 1 + 4 * 6 + 8;

/// Chip registers, in save-state order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHeader {
    pub ready: bool,
    pub size_mask: u32,
    pub bit_offset: u32,
    pub bit_read: u32,
    pub access_address: u32,
    pub current_state: u32,
    pub next_state: u32,
    pub next_ready_cycle: u64,
}

impl StateHeader {
    /// Header of a chip with no serial protocol (always ready, nothing in flight).
    pub fn idle(size_mask: u32) -> Self {
        Self {
            ready: true,
            size_mask,
            bit_offset: 0,
            bit_read: 0,
            access_address: 0,
            current_state: 0,
            next_state: 0,
            next_ready_cycle: 0,
        }
    }

    pub fn save(&self, w: &mut StateWriter<'_>) {
        w.save_bool(self.ready)
            .save_u32(self.size_mask)
            .save_u32(self.bit_offset)
            .save_u32(self.bit_read)
            .save_u32(self.access_address)
            .save_u32(self.current_state)
            .save_u32(self.next_state)
            .save_u64(self.next_ready_cycle);
    }

    pub fn load(r: &mut StateReader<'_>) -> Self {
        Self {
            ready: r.load_bool(),
            size_mask: r.load_u32(),
            bit_offset: r.load_u32(),
            bit_read: r.load_u32(),
            access_address: r.load_u32(),
            current_state: r.load_u32(),
            next_state: r.load_u32(),
            next_ready_cycle: r.load_u64(),
        }
    }
}

/// Writing cursor over a pre-sized state buffer.
pub struct StateWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> StateWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current cursor offset in bytes.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn save_bool(&mut self, value: bool) -> &mut Self {
        self.save_bytes(&[value as u8])
    }

    pub fn save_u32(&mut self, value: u32) -> &mut Self {
        self.save_bytes(&value.to_le_bytes())
    }

    pub fn save_u64(&mut self, value: u64) -> &mut Self {
        self.save_bytes(&value.to_le_bytes())
    }

    /// Copies raw bytes (chip storage) verbatim.
    pub fn save_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        let end = self.pos + bytes.len();
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        self
    }
}

/// Reading cursor, the exact inverse of [`StateWriter`].
pub struct StateReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> StateReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current cursor offset in bytes.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Any non-zero byte loads as `true`.
    pub fn load_bool(&mut self) -> bool {
        let [b] = self.take::<1>();
        b != 0
    }

    pub fn load_u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take::<4>())
    }

    pub fn load_u64(&mut self) -> u64 {
        u64::from_le_bytes(self.take::<8>())
    }

    /// Fills `out` with the next `out.len()` bytes.
    pub fn load_bytes(&mut self, out: &mut [u8]) {
        let end = self.pos + out.len();
        out.copy_from_slice(&self.buf[self.pos..end]);
        self.pos = end;
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut bytes = [0u8; N];
        self.load_bytes(&mut bytes);
        bytes
    }
}
