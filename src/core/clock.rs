// gba-backup-rs/src/core/clock.rs

//! Shared CPU cycle counter.
//!
//! The CPU core owns a [`SystemClock`] and advances it; backup chips only get
//! a [`CycleSource`], which can read the counter but never move it. Each
//! emulation session builds its own clock, so there is no global state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Writable side of the cycle counter, held by the CPU core.
#[derive(Debug, Default)]
pub struct SystemClock {
    cycles: Arc<AtomicU64>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total cycles executed so far.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Avança o contador de ciclos
    pub fn add_cycles(&self, cycles: u64) {
        self.cycles.fetch_add(cycles, Ordering::Relaxed);
    }

    /// Moves the counter to `cycles`. Used when a save state is restored; the
    /// counter must not go backwards during normal emulation.
    pub fn set_cycles(&self, cycles: u64) {
        self.cycles.store(cycles, Ordering::Relaxed);
    }

    /// Read-only handle for devices that need to compare against the counter.
    pub fn source(&self) -> CycleSource {
        CycleSource {
            cycles: Arc::clone(&self.cycles),
        }
    }
}

/// Read-only view of a [`SystemClock`].
#[derive(Debug, Clone)]
pub struct CycleSource {
    cycles: Arc<AtomicU64>,
}

impl CycleSource {
    pub fn now(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }
}
