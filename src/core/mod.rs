//! Núcleo do subsistema de backup do cartucho.

pub mod cartridge;
pub mod clock;
pub mod state;
