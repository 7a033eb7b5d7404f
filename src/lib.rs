//! Spatial simulation core for chunked tile worlds.
//!
//! A [`Level`] owns a finite grid of 16 x 256 x 16 chunks and a
//! fixed-capacity table of entities. Each tick, every entity runs its
//! behavior, moves through per-axis swept collision against tiles and
//! other entities, and is re-indexed into the chunk it now stands in.
//! Spatial queries are bounded: they write into caller-owned buffers from
//! a per-tick arena and report overflow instead of allocating.
//!
//! Rendering, terrain generation, persistence and networking all live
//! outside this crate; it only simulates.

pub mod config;
pub mod context;
pub mod entity;
pub mod utils;
pub mod world;

pub use config::SimConfig;
pub use context::SimulationContext;
pub use entity::{move_entity, Entity, EntityData, EntityId, EntityKind, SimpleBody};
pub use utils::{FixedVec, TickArena, AABB};
pub use world::{
    Chunk, ColliderMask, Level, QueryResult, TileArea, TileDef, TileFlags, TileId, TileRegistry,
    CHUNK_HEIGHT, CHUNK_SIZE,
};
