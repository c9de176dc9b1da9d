//! Cartridge-side hardware.

pub mod backup;
