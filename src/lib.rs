// Ponto de entrada principal da biblioteca.
//! Cartridge backup storage for a GBA emulator core.
//!
//! The bus dispatcher picks one [`Backend`] when a cartridge is loaded and
//! routes every access to the backup region (and every EEPROM data-port
//! access) to it for the rest of the session.

pub mod core;

// Re-exportações para facilitar o uso.
pub use crate::core::cartridge::backup::{
    create_backend, Backend, BackendKind, Eeprom, EepromSize, EepromState, NullStorage, SaveRam,
    StorageBackend, StorageError, StorageResult, WRITE_BUSY_CYCLES,
};
pub use crate::core::clock::{CycleSource, SystemClock};
pub use crate::core::state::{StateHeader, StateReader, StateWriter, STATE_HEADER_SIZE};

/// Versão da biblioteca.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
