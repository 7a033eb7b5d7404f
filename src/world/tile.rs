//! Tile identifiers and the tile registry boundary.
//!
//! The simulation core only ever asks a tile whether it blocks movement and
//! what box it occupies; everything else about tiles (drops, visuals,
//! interaction) lives in outer layers that share this registry.

use std::collections::HashMap;
use std::sync::Arc;

use bitflags::bitflags;
use glam::IVec3;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::math::AABB;
use crate::world::coords::tile_aabb;

/// Stable numeric tile identifier. Zero is always the empty tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileId(pub u16);

pub const TILE_AIR: TileId = TileId(0);

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct TileFlags: u32 {
        const NONE = 0;
        const SOLID = 1 << 0;
        const FLUID = 1 << 1;
        const FLORA = 1 << 2;
        const DESTRUCTIBLE = 1 << 3;
    }
}

impl TileFlags {
    pub fn is_solid(&self) -> bool {
        self.contains(Self::SOLID)
    }

    pub fn is_fluid(&self) -> bool {
        self.contains(Self::FLUID)
    }
}

/// Per-tile-type definition consulted by collision queries.
#[derive(Debug, Clone)]
pub struct TileDef {
    pub name: String,
    pub flags: TileFlags,
    /// Height of the collider as a fraction of the cell; 1.0 is a full cube.
    pub collider_height: f32,
}

impl TileDef {
    pub fn new(name: impl Into<String>, flags: TileFlags) -> Self {
        Self {
            name: name.into(),
            flags,
            collider_height: 1.0,
        }
    }

    pub fn with_collider_height(mut self, height: f32) -> Self {
        self.collider_height = height;
        self
    }

    pub fn is_solid(&self) -> bool {
        self.flags.is_solid()
    }

    /// The box this tile occupies at `tile`, if it collides at all.
    pub fn collider(&self, tile: IVec3) -> Option<AABB> {
        if !self.is_solid() {
            return None;
        }
        let mut cell = tile_aabb(tile);
        cell.max.y = cell.min.y + self.collider_height;
        Some(cell)
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Duplicate tile name: {0}")]
    DuplicateName(String),

    #[error("Tile id space exhausted")]
    Exhausted,
}

/// Registry of tile definitions, indexed by [`TileId`].
#[derive(Debug)]
pub struct TileRegistry {
    defs: Vec<TileDef>,
    by_name: HashMap<String, TileId>,
}

impl TileRegistry {
    /// Creates a registry containing only the empty tile.
    pub fn new() -> Self {
        let mut registry = Self {
            defs: Vec::new(),
            by_name: HashMap::new(),
        };
        registry
            .register(TileDef::new("air", TileFlags::NONE))
            .expect("empty registry accepts the air tile");
        registry
    }

    pub fn register(&mut self, def: TileDef) -> Result<TileId, RegistryError> {
        if self.by_name.contains_key(&def.name) {
            return Err(RegistryError::DuplicateName(def.name));
        }
        if self.defs.len() > u16::MAX as usize {
            return Err(RegistryError::Exhausted);
        }
        let id = TileId(self.defs.len() as u16);
        self.by_name.insert(def.name.clone(), id);
        self.defs.push(def);
        Ok(id)
    }

    /// Looks up a definition. Panics on an unregistered id: that only
    /// happens when the spatial state is already corrupt.
    pub fn get(&self, id: TileId) -> &TileDef {
        self.defs
            .get(id.0 as usize)
            .expect("tile id not present in registry")
    }

    pub fn by_name(&self, name: &str) -> Option<TileId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

impl Default for TileRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// Built-in tile table. Ids are assigned in registration order, so these
// constants must match the order below.
pub const TILE_STONE: TileId = TileId(1);
pub const TILE_DIRT: TileId = TileId(2);
pub const TILE_GRASS: TileId = TileId(3);
pub const TILE_WATER: TileId = TileId(4);
pub const TILE_TALL_GRASS: TileId = TileId(5);
pub const TILE_SLAB: TileId = TileId(6);

static DEFAULT_REGISTRY: Lazy<Arc<TileRegistry>> = Lazy::new(|| {
    let mut registry = TileRegistry::new();
    let defs = [
        TileDef::new("stone", TileFlags::SOLID),
        TileDef::new("dirt", TileFlags::SOLID | TileFlags::DESTRUCTIBLE),
        TileDef::new("grass", TileFlags::SOLID | TileFlags::DESTRUCTIBLE),
        TileDef::new("water", TileFlags::FLUID),
        TileDef::new("tall_grass", TileFlags::FLORA | TileFlags::DESTRUCTIBLE),
        TileDef::new("slab", TileFlags::SOLID).with_collider_height(0.5),
    ];
    for def in defs {
        registry
            .register(def)
            .expect("built-in tile table has unique names");
    }
    Arc::new(registry)
});

/// The built-in tile table shared by tests and simple hosts.
pub fn default_registry() -> Arc<TileRegistry> {
    Arc::clone(&DEFAULT_REGISTRY)
}
