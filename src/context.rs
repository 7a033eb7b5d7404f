//! Per-tick simulation context threaded through every update.

use crate::utils::arena::TickArena;

/// Tick counter plus the query buffer pool. One per simulation driver,
/// shared across all levels it ticks.
#[derive(Debug, Default)]
pub struct SimulationContext {
    pub ticks: u64,
    pub arena: TickArena,
}

impl SimulationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances to the next tick and marks the arena's tick boundary.
    pub fn advance(&mut self) {
        self.ticks += 1;
        self.arena.reset();
    }
}
