//! Simulation tuning knobs, loadable from TOML.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Tunable parameters for a level. Every field has a default so a partial
/// TOML file (or none at all) still yields a working config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Upper bound on live entities per level.
    pub entity_capacity: usize,
    /// Downward acceleration per tick.
    pub gravity: f32,
    /// Cap on downward speed, in tiles per tick.
    pub terminal_velocity: f32,
    /// Default per-tick velocity multiplier for spawned bodies.
    pub drag: f32,
    /// Collider buffer size for tile-only movement queries.
    pub tile_collider_budget: usize,
    /// Collider buffer size for point containment queries.
    pub point_query_budget: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            entity_capacity: 4096,
            gravity: 0.08,
            terminal_velocity: 3.92,
            drag: 0.91,
            tile_collider_budget: 128,
            point_query_budget: 64,
        }
    }
}

impl SimConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }
}
