//! A 16 x 256 x 16 column of tiles plus the index of entities standing in
//! it.
//!
//! Chunks store tiles in a flat array and entities twice: a per-chunk list
//! for area queries, and per-XZ-column buckets so vertical lookups do not
//! scan the whole chunk.

use glam::{IVec2, IVec3};
use smallvec::SmallVec;

use crate::context::SimulationContext;
use crate::entity::base::EntityId;
use crate::world::coords::{chunk_origin, CHUNK_HEIGHT, CHUNK_SIZE};
use crate::world::tile::{TileId, TileRegistry, TILE_AIR};

const TILES_PER_CHUNK: usize = (CHUNK_SIZE * CHUNK_HEIGHT * CHUNK_SIZE) as usize;
const COLUMNS_PER_CHUNK: usize = (CHUNK_SIZE * CHUNK_SIZE) as usize;

fn tile_index(local: IVec3) -> usize {
    debug_assert!(
        (0..CHUNK_SIZE).contains(&local.x)
            && (0..CHUNK_HEIGHT).contains(&local.y)
            && (0..CHUNK_SIZE).contains(&local.z),
        "tile position out of chunk: {local:?}"
    );
    ((local.y * CHUNK_SIZE + local.z) * CHUNK_SIZE + local.x) as usize
}

pub struct Chunk {
    offset: IVec2,
    tiles: Vec<TileId>,
    /// Every entity whose indexed tile falls in this chunk.
    pub entities: Vec<EntityId>,
    columns: Vec<SmallVec<[EntityId; 4]>>,
    last_update_tick: u64,
}

impl Chunk {
    /// A chunk of pure air at the given grid offset.
    pub fn new(offset: IVec2) -> Self {
        Self {
            offset,
            tiles: vec![TILE_AIR; TILES_PER_CHUNK],
            entities: Vec::new(),
            columns: vec![SmallVec::new(); COLUMNS_PER_CHUNK],
            last_update_tick: 0,
        }
    }

    pub fn offset(&self) -> IVec2 {
        self.offset
    }

    /// Tile-space origin of this chunk.
    pub fn origin(&self) -> IVec3 {
        chunk_origin(self.offset)
    }

    pub fn tile(&self, local: IVec3) -> TileId {
        self.tiles[tile_index(local)]
    }

    pub fn set_tile(&mut self, local: IVec3, id: TileId) {
        self.tiles[tile_index(local)] = id;
    }

    /// Fills one full horizontal layer, a convenience for flat test worlds
    /// and generators.
    pub fn fill_layer(&mut self, y: i32, id: TileId) {
        for z in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                self.set_tile(IVec3::new(x, y, z), id);
            }
        }
    }

    /// Highest solid tile in the XZ column, if any.
    pub fn topmost_solid(&self, registry: &TileRegistry, x: i32, z: i32) -> Option<i32> {
        (0..CHUNK_HEIGHT).rev().find(|&y| {
            let id = self.tile(IVec3::new(x, y, z));
            id != TILE_AIR && registry.get(id).is_solid()
        })
    }

    /// Adds an entity to this chunk's index. The entity must not already be
    /// indexed here.
    pub fn insert_entity(&mut self, id: EntityId, column: usize) {
        assert!(
            !self.entities.contains(&id),
            "entity {id} already indexed in chunk {:?}",
            self.offset
        );
        self.entities.push(id);
        self.columns[column].push(id);
    }

    /// Removes an entity from this chunk's index. The entity must be
    /// indexed here, under the given column.
    pub fn remove_entity(&mut self, id: EntityId, column: usize) {
        let pos = self
            .entities
            .iter()
            .position(|&e| e == id)
            .unwrap_or_else(|| panic!("entity {id} not indexed in chunk {:?}", self.offset));
        self.entities.swap_remove(pos);

        let bucket = &mut self.columns[column];
        let pos = bucket
            .iter()
            .position(|&e| e == id)
            .unwrap_or_else(|| panic!("entity {id} not in column {column} of {:?}", self.offset));
        bucket.swap_remove(pos);
    }

    /// Moves an entity between XZ buckets without touching the chunk list.
    pub fn move_entity_column(&mut self, id: EntityId, from: usize, to: usize) {
        let bucket = &mut self.columns[from];
        let pos = bucket
            .iter()
            .position(|&e| e == id)
            .unwrap_or_else(|| panic!("entity {id} not in column {from} of {:?}", self.offset));
        bucket.swap_remove(pos);
        self.columns[to].push(id);
    }

    /// Entities indexed under one XZ column, any height.
    pub fn column_entities(&self, x: i32, z: i32) -> &[EntityId] {
        &self.columns[(z * CHUNK_SIZE + x) as usize]
    }

    pub fn update(&mut self, ctx: &SimulationContext) {
        self.last_update_tick = ctx.ticks;
    }

    pub fn last_update_tick(&self) -> u64 {
        self.last_update_tick
    }
}
