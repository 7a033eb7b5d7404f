//! The level: a finite chunk grid, the entity table, and the tick sweep
//! that drives both.

use std::sync::Arc;

use glam::{IVec2, IVec3, Vec3};
use log::{debug, warn};

use crate::config::SimConfig;
use crate::context::SimulationContext;
use crate::entity::base::{Entity, EntityId};
use crate::entity::behavior::EntityKind;
use crate::utils::math::AABB;
use crate::world::chunk::Chunk;
use crate::world::coords::{to_local, to_offset, CHUNK_HEIGHT, CHUNK_SIZE};
use crate::world::query::TileArea;
use crate::world::tile::{TileId, TileRegistry};

/// A simulated level with a fixed `size.x` by `size.y` chunk grid.
///
/// Entities live in a fixed-capacity slot table; an [`EntityId`] is the
/// index of its slot. During the tick sweep the current entity is taken out
/// of its slot, so looking it up through the level yields None while its
/// own hooks run.
pub struct Level {
    size: IVec2,
    chunks: Vec<Option<Chunk>>,
    entities: Vec<Option<Box<Entity>>>,
    /// Slot of the entity currently taken out by the tick sweep. Reserved
    /// so a spawn from inside a tick hook cannot claim it.
    ticking: Option<usize>,
    next_entity_id: u32,
    next_stack_id: u64,
    next_container_id: u64,
    pub registry: Arc<TileRegistry>,
    pub config: SimConfig,
}

impl Level {
    pub fn new(size: IVec2, registry: Arc<TileRegistry>, config: SimConfig) -> Self {
        assert!(size.x > 0 && size.y > 0, "level needs at least one chunk");
        let chunk_slots = (size.x * size.y) as usize;
        Self {
            size,
            chunks: (0..chunk_slots).map(|_| None).collect(),
            entities: (0..config.entity_capacity).map(|_| None).collect(),
            ticking: None,
            next_entity_id: 0,
            next_stack_id: 0,
            next_container_id: 0,
            registry,
            config,
        }
    }

    /// Grid dimensions, in chunks.
    pub fn size(&self) -> IVec2 {
        self.size
    }

    /// Tile-space bounds of the whole grid.
    pub fn aabb(&self) -> AABB {
        AABB::new(
            Vec3::ZERO,
            Vec3::new(
                (self.size.x * CHUNK_SIZE) as f32,
                CHUNK_HEIGHT as f32,
                (self.size.y * CHUNK_SIZE) as f32,
            ),
        )
    }

    pub fn offset_in_bounds(&self, offset: IVec2) -> bool {
        (0..self.size.x).contains(&offset.x) && (0..self.size.y).contains(&offset.y)
    }

    fn chunk_slot(&self, offset: IVec2) -> Option<usize> {
        self.offset_in_bounds(offset)
            .then(|| (offset.y * self.size.x + offset.x) as usize)
    }

    pub fn chunk(&self, offset: IVec2) -> Option<&Chunk> {
        self.chunks[self.chunk_slot(offset)?].as_ref()
    }

    pub fn chunk_mut(&mut self, offset: IVec2) -> Option<&mut Chunk> {
        let slot = self.chunk_slot(offset)?;
        self.chunks[slot].as_mut()
    }

    /// Ensures the chunk at `offset` is loaded, creating an air chunk on
    /// first load. `offset` must lie on the grid.
    pub fn load_chunk(&mut self, offset: IVec2) -> &mut Chunk {
        let slot = self
            .chunk_slot(offset)
            .unwrap_or_else(|| panic!("chunk offset {offset:?} outside {:?} grid", self.size));
        self.chunks[slot].get_or_insert_with(|| Chunk::new(offset))
    }

    pub fn load_all_chunks(&mut self) {
        for y in 0..self.size.y {
            for x in 0..self.size.x {
                self.load_chunk(IVec2::new(x, y));
            }
        }
    }

    /// Drops the chunk at `offset`. Entities indexed in it are detached and
    /// destroyed on their next tick.
    pub fn unload_chunk(&mut self, offset: IVec2) {
        let Some(slot) = self.chunk_slot(offset) else {
            return;
        };
        if let Some(chunk) = self.chunks[slot].take() {
            for id in chunk.entities {
                if let Some(entity) = self.entities[id.index()].as_deref_mut() {
                    entity.data.chunk = None;
                    entity.data.should_destroy = true;
                }
            }
            debug!("unloaded chunk {offset:?}");
        }
    }

    /// Tile at an absolute position, None when the position is above or
    /// below the world or its chunk is not loaded.
    pub fn tile(&self, pos: IVec3) -> Option<TileId> {
        if pos.y < 0 || pos.y >= CHUNK_HEIGHT {
            return None;
        }
        Some(self.chunk(to_offset(pos))?.tile(to_local(pos)))
    }

    /// Sets a tile, reporting whether the write landed in a loaded chunk.
    pub fn set_tile(&mut self, pos: IVec3, id: TileId) -> bool {
        if pos.y < 0 || pos.y >= CHUNK_HEIGHT {
            return false;
        }
        match self.chunk_mut(to_offset(pos)) {
            Some(chunk) => {
                chunk.set_tile(to_local(pos), id);
                true
            }
            None => false,
        }
    }

    /// Highest solid tile in the XZ column at `(x, z)`, if loaded.
    pub fn topmost_solid(&self, x: i32, z: i32) -> Option<i32> {
        let pos = IVec3::new(x, 0, z);
        let chunk = self.chunk(to_offset(pos))?;
        let local = to_local(pos);
        chunk.topmost_solid(&self.registry, local.x, local.z)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.index())?.as_deref()
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id.index())?.as_deref_mut()
    }

    /// Number of live entity slots. Entities taken out for ticking still
    /// count as absent here.
    pub fn entity_count(&self) -> usize {
        self.entities.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn iter_entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter_map(|slot| slot.as_deref())
    }

    /// Finds a free slot, probing forward with wraparound from the last
    /// allocation so ids are not reused immediately after destruction. The
    /// slot of an entity that is mid-tick looks empty but is not free.
    fn alloc_entity_id(&mut self) -> Option<EntityId> {
        let cap = self.entities.len();
        for probe in 0..cap {
            let index = (self.next_entity_id as usize + probe) % cap;
            if self.entities[index].is_none() && self.ticking != Some(index) {
                self.next_entity_id = ((index + 1) % cap) as u32;
                return Some(EntityId(index as u32));
            }
        }
        warn!("entity capacity ({cap}) exhausted, refusing spawn");
        None
    }

    pub fn alloc_stack_id(&mut self) -> u64 {
        let id = self.next_stack_id;
        self.next_stack_id += 1;
        id
    }

    pub fn alloc_container_id(&mut self) -> u64 {
        let id = self.next_container_id;
        self.next_container_id += 1;
        id
    }

    /// Spawns an entity at `pos`. Returns None when the table is full, the
    /// kind refuses an obstructed spawn area, or `pos` lies outside the
    /// loaded grid.
    pub fn spawn(
        &mut self,
        ctx: &mut SimulationContext,
        pos: Vec3,
        kind: Box<dyn EntityKind>,
    ) -> Option<EntityId> {
        let id = self.alloc_entity_id()?;
        let mut entity = Entity::new(id, pos, ctx.ticks, kind);
        entity.data.drag = self.config.drag;

        if entity.kind.check_spawn_collision() && self.spawn_blocked(ctx, &entity) {
            warn!("spawn area at {pos:?} obstructed, refusing");
            return None;
        }

        entity.recheck_position(true);
        entity.recheck_tile(self, true);
        if entity.data.should_destroy {
            return None;
        }

        {
            let Entity { data, kind } = &mut entity;
            kind.on_level_change(data);
            kind.init(data);
        }
        debug!("spawned entity {id} at {pos:?}");
        self.entities[id.index()] = Some(Box::new(entity));
        Some(id)
    }

    /// Whether the area around a prospective spawn is obstructed. Colliders
    /// are gathered from a box twice the entity's size, then tested strictly
    /// against the spawn box itself, so resting contact (feet flush on a
    /// floor) does not refuse the spawn. Query overflow counts as
    /// obstructed.
    fn spawn_blocked(&self, ctx: &mut SimulationContext, entity: &Entity) -> bool {
        let Some(bb) = entity.aabb() else {
            return false;
        };
        let area = TileArea::from_aabb(&bb.scaled_about_center(2.0));

        let mut tiles = ctx.arena.take_colliders(self.config.tile_collider_budget);
        let result = self.tile_colliders(&mut tiles, &area, Some(entity));
        let mut blocked =
            result.overflow || tiles.as_slice().iter().any(|c| c.overlaps(&bb));
        ctx.arena.put_colliders(tiles);

        if !blocked && entity.kind.collides_with_entities() {
            let cap = self.entity_count_in(&area).max(1);
            let mut boxes = ctx.arena.take_colliders(cap);
            let mut ids = ctx.arena.take_ids(cap);
            let result = self.entity_colliders(&mut boxes, &area, Some(entity), &mut ids, None);
            if result.overflow {
                blocked = true;
            } else {
                for (collider, &other_id) in boxes.as_slice().iter().zip(ids.as_slice()) {
                    if !collider.overlaps(&bb) {
                        continue;
                    }
                    let other = self.entity(other_id).expect("collider ids are live");
                    if entity.kind.does_stop(&entity.data, other)
                        && other.kind.does_stop(&other.data, entity)
                    {
                        blocked = true;
                        break;
                    }
                }
            }
            ctx.arena.put_ids(ids);
            ctx.arena.put_colliders(boxes);
        }
        blocked
    }

    /// Advances the level by one tick: chunk updates, then every entity in
    /// id order.
    pub fn tick(&mut self, ctx: &mut SimulationContext) {
        ctx.advance();

        for chunk in self.chunks.iter_mut().flatten() {
            chunk.update(ctx);
        }

        for index in 0..self.entities.len() {
            let Some(mut entity) = self.entities[index].take() else {
                continue;
            };
            self.ticking = Some(index);
            if !entity.data.should_destroy {
                entity.tick(self, ctx);
                entity.relocate(self, ctx);
            }
            if entity.data.should_destroy {
                {
                    let Entity { data, kind } = &mut *entity;
                    kind.on_destroy(data);
                }
                entity.detach(self);
                debug!("destroyed entity {}", entity.data.id);
                self.ticking = None;
                continue;
            }
            assert!(
                self.entities[index].is_none(),
                "entity slot reused while its owner was ticking"
            );
            self.entities[index] = Some(entity);
            self.ticking = None;
        }
    }
}
