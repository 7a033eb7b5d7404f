//! Bounded spatial queries over a level.
//!
//! Every query writes into a caller-owned [`FixedVec`] and reports how many
//! entries it appended plus whether it ran out of room. Overflow is a
//! signal, not an error: results already written stay valid, callers pick
//! the conservative fallback.

use bitflags::bitflags;
use glam::{IVec2, IVec3, Vec3};
use log::warn;

use crate::entity::base::{Entity, EntityId};
use crate::utils::arena::{FixedVec, TickArena};
use crate::utils::math::AABB;
use crate::world::coords::{tile_of, to_offset, CHUNK_HEIGHT};
use crate::world::level::Level;
use crate::world::tile::{TileFlags, TILE_AIR};

bitflags! {
    /// Selects which collider sources a combined query touches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ColliderMask: u8 {
        const TILE = 1 << 0;
        const ENTITY = 1 << 1;
    }
}

/// Outcome of a bounded query: entries appended, and whether more existed
/// than the destination could hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryResult {
    pub count: usize,
    pub overflow: bool,
}

impl QueryResult {
    fn merge(self, other: QueryResult) -> QueryResult {
        QueryResult {
            count: self.count + other.count,
            overflow: self.overflow || other.overflow,
        }
    }
}

/// Inclusive integer cell range, the region argument of every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileArea {
    pub min: IVec3,
    pub max: IVec3,
}

impl TileArea {
    pub fn new(min: IVec3, max: IVec3) -> Self {
        debug_assert!(
            min.x <= max.x && min.y <= max.y && min.z <= max.z,
            "inverted tile area: {min:?}..{max:?}"
        );
        Self { min, max }
    }

    /// Every cell a continuous box touches, with Y clamped to world height.
    pub fn from_aabb(aabb: &AABB) -> Self {
        let min = tile_of(aabb.min);
        let max = tile_of(aabb.max);
        Self {
            min: IVec3::new(min.x, min.y.clamp(0, CHUNK_HEIGHT - 1), min.z),
            max: IVec3::new(max.x, max.y.clamp(0, CHUNK_HEIGHT - 1), max.z),
        }
    }

    /// The single cell containing a continuous position.
    pub fn around_point(pos: Vec3) -> Self {
        let tile = tile_of(pos);
        Self { min: tile, max: tile }
    }

    pub fn cell_count(&self) -> usize {
        let span = self.max - self.min + IVec3::ONE;
        (span.x * span.y * span.z) as usize
    }

    /// Iterates cells column by column, Y innermost.
    pub fn iter(&self) -> impl Iterator<Item = IVec3> {
        let (min, max) = (self.min, self.max);
        (min.x..=max.x).flat_map(move |x| {
            (min.z..=max.z)
                .flat_map(move |z| (min.y..=max.y).map(move |y| IVec3::new(x, y, z)))
        })
    }
}

/// Predicate narrowing entity queries at the call site.
pub type EntityFilter<'a> = &'a dyn Fn(&Entity) -> bool;

impl Level {
    /// Chunk offsets overlapping `area`, clamped to the grid.
    fn chunk_offsets(&self, area: &TileArea) -> impl Iterator<Item = IVec2> {
        let min = to_offset(area.min).max(IVec2::ZERO);
        let max = to_offset(area.max).min(self.size() - IVec2::ONE);
        (min.y..=max.y).flat_map(move |z| (min.x..=max.x).map(move |x| IVec2::new(x, z)))
    }

    /// Appends the box of every stopping tile in `area`. `for_entity` lets
    /// an entity's own passability rules drop tiles it swims through.
    pub fn tile_colliders(
        &self,
        dest: &mut FixedVec<AABB>,
        area: &TileArea,
        for_entity: Option<&Entity>,
    ) -> QueryResult {
        let mut result = QueryResult::default();
        for cell in area.iter() {
            let Some(id) = self.tile(cell) else {
                continue;
            };
            if id == TILE_AIR {
                continue;
            }
            let def = self.registry.get(id);
            if let Some(entity) = for_entity {
                if entity.kind.ignores_tile(&entity.data, id, def) {
                    continue;
                }
            }
            let Some(collider) = def.collider(cell) else {
                continue;
            };
            if !dest.push(collider) {
                result.overflow = true;
                break;
            }
            result.count += 1;
        }
        result
    }

    /// Appends ids of entities indexed in chunks overlapping `area`.
    ///
    /// The broad phase is chunk-granular on X/Z; only Y is narrowed to the
    /// exact tile range. Callers wanting exact X/Z bounds test the results
    /// themselves. Entities taken out of the table (the one currently
    /// ticking) are invisible here.
    pub fn entities(
        &self,
        dest: &mut FixedVec<EntityId>,
        area: &TileArea,
        filter: Option<EntityFilter>,
    ) -> QueryResult {
        let mut result = QueryResult::default();
        for offset in self.chunk_offsets(area) {
            let Some(chunk) = self.chunk(offset) else {
                continue;
            };
            for &id in &chunk.entities {
                let Some(entity) = self.entity(id) else {
                    continue;
                };
                if entity.data.tile.y < area.min.y || entity.data.tile.y > area.max.y {
                    continue;
                }
                if let Some(filter) = filter {
                    if !filter(entity) {
                        continue;
                    }
                }
                if !dest.push(id) {
                    result.overflow = true;
                    return result;
                }
                result.count += 1;
            }
        }
        result
    }

    /// Like [`Level::entities`], but appends each entity's box, skipping
    /// point entities and `for_entity` itself. `dest` and `dest_entities`
    /// stay parallel so callers can correlate box to entity; nothing is
    /// written to one without the other.
    pub fn entity_colliders(
        &self,
        dest: &mut FixedVec<AABB>,
        area: &TileArea,
        for_entity: Option<&Entity>,
        dest_entities: &mut FixedVec<EntityId>,
        filter: Option<EntityFilter>,
    ) -> QueryResult {
        let mut result = QueryResult::default();
        let self_id = for_entity.map(|e| e.data.id);
        for offset in self.chunk_offsets(area) {
            let Some(chunk) = self.chunk(offset) else {
                continue;
            };
            for &id in &chunk.entities {
                if self_id == Some(id) {
                    continue;
                }
                let Some(entity) = self.entity(id) else {
                    continue;
                };
                if entity.data.tile.y < area.min.y || entity.data.tile.y > area.max.y {
                    continue;
                }
                if let Some(filter) = filter {
                    if !filter(entity) {
                        continue;
                    }
                }
                let Some(collider) = entity.aabb() else {
                    continue;
                };
                if dest.is_full() || dest_entities.is_full() {
                    result.overflow = true;
                    return result;
                }
                let pushed = dest.push(collider) && dest_entities.push(id);
                debug_assert!(pushed, "parallel buffers checked for room above");
                result.count += 1;
            }
        }
        result
    }

    /// Union of tile and entity colliders selected by `mask`, concatenated
    /// into `dest`. The tile pass always runs first, so entity colliders
    /// occupy the tail and line up with the tail of `dest_entities`.
    pub fn colliders(
        &self,
        dest: &mut FixedVec<AABB>,
        area: &TileArea,
        for_entity: Option<&Entity>,
        dest_entities: &mut FixedVec<EntityId>,
        filter: Option<EntityFilter>,
        mask: ColliderMask,
    ) -> QueryResult {
        let mut result = QueryResult::default();
        if mask.contains(ColliderMask::TILE) {
            result = result.merge(self.tile_colliders(dest, area, for_entity));
        }
        if mask.contains(ColliderMask::ENTITY) {
            result = result.merge(self.entity_colliders(
                dest,
                area,
                for_entity,
                dest_entities,
                filter,
            ));
        }
        result
    }

    /// Whether any selected collider contains `pos`. An overflowing gather
    /// conservatively reports a collision rather than guessing.
    pub fn collides(
        &self,
        arena: &mut TickArena,
        pos: Vec3,
        for_entity: Option<&Entity>,
        filter: Option<EntityFilter>,
        mask: ColliderMask,
    ) -> bool {
        let area = TileArea::around_point(pos);
        let cap = self.config.point_query_budget;
        let mut boxes = arena.take_colliders(cap);
        let mut ids = arena.take_ids(cap);
        let result = self.colliders(&mut boxes, &area, for_entity, &mut ids, filter, mask);

        let hit = if result.overflow {
            warn!("point query at {pos:?} overflowed, reporting a collision");
            true
        } else {
            boxes.as_slice().iter().any(|c| c.contains(pos))
        };

        arena.put_ids(ids);
        arena.put_colliders(boxes);
        hit
    }

    /// Appends the position of every tile in `area` carrying all of
    /// `flags`.
    pub fn offsets_with_flags(
        &self,
        dest: &mut FixedVec<IVec3>,
        area: &TileArea,
        flags: TileFlags,
    ) -> QueryResult {
        let mut result = QueryResult::default();
        for cell in area.iter() {
            let Some(id) = self.tile(cell) else {
                continue;
            };
            if id == TILE_AIR || !self.registry.get(id).flags.contains(flags) {
                continue;
            }
            if !dest.push(cell) {
                result.overflow = true;
                break;
            }
            result.count += 1;
        }
        result
    }

    /// Upper bound on entities an area query can yield, for sizing buffers.
    pub fn entity_count_in(&self, area: &TileArea) -> usize {
        self.chunk_offsets(area)
            .filter_map(|offset| self.chunk(offset))
            .map(|chunk| chunk.entities.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::context::SimulationContext;
    use crate::entity::base::EntityData;
    use crate::entity::behavior::{EntityKind, SimpleBody};
    use crate::world::tile::{default_registry, TileDef, TileId, TILE_SLAB, TILE_STONE};

    fn flat_level(size: IVec2, floor_y: i32) -> Level {
        let mut level = Level::new(size, default_registry(), SimConfig::default());
        level.load_all_chunks();
        for cy in 0..size.y {
            for cx in 0..size.x {
                level
                    .chunk_mut(IVec2::new(cx, cy))
                    .unwrap()
                    .fill_layer(floor_y, TILE_STONE);
            }
        }
        level
    }

    #[test]
    fn test_tile_area_from_aabb_clamps_height() {
        let area = TileArea::from_aabb(&AABB::new(
            Vec3::new(-0.5, -3.0, 7.2),
            Vec3::new(1.5, 300.0, 8.0),
        ));
        assert_eq!(area.min, IVec3::new(-1, 0, 7));
        assert_eq!(area.max, IVec3::new(1, 255, 8));
    }

    #[test]
    fn test_tile_area_iteration() {
        let area = TileArea::new(IVec3::new(0, 4, 0), IVec3::new(1, 5, 2));
        assert_eq!(area.cell_count(), 12);
        assert_eq!(area.iter().count(), 12);
        assert!(area.iter().all(|c| (4..=5).contains(&c.y)));
    }

    #[test]
    fn test_tile_colliders_skip_non_solid() {
        let level = flat_level(IVec2::new(1, 1), 3);
        let mut dest = FixedVec::new(64);
        // One column of floor plus the air above it.
        let area = TileArea::new(IVec3::new(5, 0, 5), IVec3::new(5, 10, 5));
        let result = level.tile_colliders(&mut dest, &area, None);
        assert_eq!(result.count, 1);
        assert!(!result.overflow);
        assert_eq!(dest.as_slice()[0].min, Vec3::new(5.0, 3.0, 5.0));
    }

    #[test]
    fn test_tile_colliders_overflow_keeps_prefix() {
        let level = flat_level(IVec2::new(1, 1), 3);
        let mut dest = FixedVec::new(4);
        let area = TileArea::new(IVec3::new(0, 3, 0), IVec3::new(15, 3, 15));
        let result = level.tile_colliders(&mut dest, &area, None);
        assert!(result.overflow);
        assert_eq!(result.count, 4);
        assert_eq!(dest.len(), 4);
    }

    #[test]
    fn test_tile_colliders_respect_entity_passability() {
        #[derive(Debug)]
        struct Burrower;
        impl EntityKind for Burrower {
            fn ignores_tile(&self, _me: &EntityData, id: TileId, _def: &TileDef) -> bool {
                id == TILE_STONE
            }
        }

        let mut level = flat_level(IVec2::new(1, 1), 3);
        level.set_tile(IVec3::new(5, 3, 5), TILE_SLAB);
        let mut ctx = SimulationContext::new();
        let id = level
            .spawn(&mut ctx, Vec3::new(8.0, 5.0, 8.0), Box::new(Burrower))
            .unwrap();

        let area = TileArea::new(IVec3::new(0, 3, 0), IVec3::new(15, 3, 15));
        let mut dest = FixedVec::new(512);
        let entity = level.entity(id).unwrap();
        let result = level.tile_colliders(&mut dest, &area, Some(entity));
        // Stone is ignored, only the slab remains.
        assert_eq!(result.count, 1);
        assert_eq!(dest.as_slice()[0].size().y, 0.5);
    }

    #[test]
    fn test_entities_chunk_granular_with_y_cull() {
        let mut level = flat_level(IVec2::new(2, 1), 3);
        let mut ctx = SimulationContext::new();
        let low = level
            .spawn(&mut ctx, Vec3::new(2.0, 4.0, 2.0), Box::new(SimpleBody::marker()))
            .unwrap();
        let high = level
            .spawn(&mut ctx, Vec3::new(2.0, 90.0, 2.0), Box::new(SimpleBody::marker()))
            .unwrap();
        let far_chunk = level
            .spawn(&mut ctx, Vec3::new(20.0, 4.0, 2.0), Box::new(SimpleBody::marker()))
            .unwrap();

        // The area only covers a corner of chunk (0,0), low tiles.
        let area = TileArea::new(IVec3::new(8, 0, 8), IVec3::new(12, 10, 12));
        let mut dest = FixedVec::new(16);
        let result = level.entities(&mut dest, &area, None);

        // Chunk-granular broad phase: `low` is outside the XZ range but in
        // the right chunk and Y band, so it is a candidate. `high` fails
        // the Y cull, `far_chunk` is in a chunk the area never touches.
        assert_eq!(result.count, 1);
        assert_eq!(dest.as_slice(), &[low]);
        assert!(!dest.as_slice().contains(&high));
        assert!(!dest.as_slice().contains(&far_chunk));
    }

    #[test]
    fn test_entities_filter() {
        let mut level = flat_level(IVec2::new(1, 1), 3);
        let mut ctx = SimulationContext::new();
        let a = level
            .spawn(&mut ctx, Vec3::new(2.0, 4.0, 2.0), Box::new(SimpleBody::marker()))
            .unwrap();
        let _b = level
            .spawn(&mut ctx, Vec3::new(3.0, 4.0, 2.0), Box::new(SimpleBody::marker()))
            .unwrap();

        let area = TileArea::new(IVec3::new(0, 0, 0), IVec3::new(15, 255, 15));
        let mut dest = FixedVec::new(16);
        let keep_a = |e: &Entity| e.data.id == a;
        let result = level.entities(&mut dest, &area, Some(&keep_a));
        assert_eq!(result.count, 1);
        assert_eq!(dest.as_slice(), &[a]);
    }

    #[test]
    fn test_entity_colliders_overflow_at_capacity() {
        let mut level = flat_level(IVec2::new(1, 1), 3);
        let mut ctx = SimulationContext::new();
        for i in 0..300 {
            let pos = Vec3::new(1.0 + (i % 14) as f32, 4.0, 1.0 + (i / 25) as f32);
            level
                .spawn(&mut ctx, pos, Box::new(SimpleBody::new(Vec3::ONE).floating()))
                .unwrap();
        }

        let area = TileArea::new(IVec3::new(0, 0, 0), IVec3::new(15, 255, 15));
        let mut boxes = FixedVec::new(256);
        let mut ids = FixedVec::new(256);
        let result = level.entity_colliders(&mut boxes, &area, None, &mut ids, None);

        assert!(result.overflow);
        assert_eq!(result.count, 256);
        assert_eq!(boxes.len(), ids.len());
    }

    #[test]
    fn test_entity_colliders_skip_self_and_points() {
        let mut level = flat_level(IVec2::new(1, 1), 3);
        let mut ctx = SimulationContext::new();
        let boxed = level
            .spawn(&mut ctx, Vec3::new(4.0, 4.0, 4.0), Box::new(SimpleBody::new(Vec3::ONE)))
            .unwrap();
        let _marker = level
            .spawn(&mut ctx, Vec3::new(5.0, 4.0, 4.0), Box::new(SimpleBody::marker()))
            .unwrap();

        let area = TileArea::new(IVec3::new(0, 0, 0), IVec3::new(15, 255, 15));
        let mut boxes = FixedVec::new(16);
        let mut ids = FixedVec::new(16);

        let result = level.entity_colliders(&mut boxes, &area, None, &mut ids, None);
        assert_eq!(result.count, 1);
        assert_eq!(ids.as_slice(), &[boxed]);

        // The same query on behalf of the boxed entity sees nothing.
        boxes.clear();
        ids.clear();
        let me = level.entity(boxed).unwrap();
        let result = level.entity_colliders(&mut boxes, &area, Some(me), &mut ids, None);
        assert_eq!(result.count, 0);
    }

    #[test]
    fn test_colliders_tile_pass_first() {
        let mut level = flat_level(IVec2::new(1, 1), 3);
        let mut ctx = SimulationContext::new();
        level
            .spawn(&mut ctx, Vec3::new(4.5, 4.0, 4.5), Box::new(SimpleBody::new(Vec3::ONE)))
            .unwrap();

        let area = TileArea::new(IVec3::new(4, 3, 4), IVec3::new(4, 5, 4));
        let mut boxes = FixedVec::new(16);
        let mut ids = FixedVec::new(16);
        let result = level.colliders(
            &mut boxes,
            &area,
            None,
            &mut ids,
            None,
            ColliderMask::TILE | ColliderMask::ENTITY,
        );

        assert_eq!(result.count, 2);
        assert_eq!(ids.len(), 1);
        // First the floor tile, then the entity box at the tail.
        assert_eq!(boxes.as_slice()[0].min.y, 3.0);
        assert_eq!(boxes.as_slice()[1].min.y, 4.0);
    }

    #[test]
    fn test_collides_point_containment() {
        let mut level = flat_level(IVec2::new(1, 1), 3);
        level.set_tile(IVec3::new(5, 10, 5), TILE_SLAB);
        let mut arena = TickArena::new();

        assert!(level.collides(&mut arena, Vec3::new(5.5, 3.5, 5.5), None, None, ColliderMask::TILE));
        assert!(!level.collides(&mut arena, Vec3::new(5.5, 4.5, 5.5), None, None, ColliderMask::TILE));
        // The slab only fills the lower half of its cell.
        assert!(level.collides(&mut arena, Vec3::new(5.5, 10.3, 5.5), None, None, ColliderMask::TILE));
        assert!(!level.collides(&mut arena, Vec3::new(5.5, 10.8, 5.5), None, None, ColliderMask::TILE));
        arena.reset();
    }

    #[test]
    fn test_collides_overflow_is_conservative() {
        let mut config = SimConfig::default();
        config.point_query_budget = 0;
        let mut level = Level::new(IVec2::new(1, 1), default_registry(), config);
        level.load_all_chunks();
        level.set_tile(IVec3::new(5, 10, 5), TILE_SLAB);
        let mut arena = TickArena::new();

        // The probed point is in the empty top half of the slab cell, but
        // the zero-budget gather overflows, so it reports a collision.
        assert!(level.collides(&mut arena, Vec3::new(5.5, 10.8, 5.5), None, None, ColliderMask::TILE));
        // An all-air cell has nothing to gather and stays clean.
        assert!(!level.collides(&mut arena, Vec3::new(5.5, 200.0, 5.5), None, None, ColliderMask::TILE));
        arena.reset();
    }

    #[test]
    fn test_offsets_with_flags() {
        let mut level = flat_level(IVec2::new(1, 1), 3);
        level.set_tile(IVec3::new(2, 4, 2), crate::world::tile::TILE_DIRT);
        level.set_tile(IVec3::new(3, 4, 2), crate::world::tile::TILE_WATER);

        let area = TileArea::new(IVec3::new(0, 4, 0), IVec3::new(15, 4, 15));
        let mut arena = TickArena::new();
        let mut dest = arena.take_offsets(16);
        let result = level.offsets_with_flags(&mut dest, &area, TileFlags::FLUID);
        assert_eq!(result.count, 1);
        assert_eq!(dest.as_slice(), &[IVec3::new(3, 4, 2)]);

        dest.clear();
        let result = level.offsets_with_flags(
            &mut dest,
            &area,
            TileFlags::SOLID | TileFlags::DESTRUCTIBLE,
        );
        assert_eq!(result.count, 1);
        assert_eq!(dest.as_slice(), &[IVec3::new(2, 4, 2)]);

        arena.put_offsets(dest);
        arena.reset();
    }

    #[test]
    fn test_entity_count_in_bounds_buffers() {
        let mut level = flat_level(IVec2::new(2, 1), 3);
        let mut ctx = SimulationContext::new();
        for x in [2.0, 4.0, 20.0] {
            level
                .spawn(&mut ctx, Vec3::new(x, 4.0, 4.0), Box::new(SimpleBody::marker()))
                .unwrap();
        }
        let left = TileArea::new(IVec3::new(0, 0, 0), IVec3::new(15, 255, 15));
        let both = TileArea::new(IVec3::new(0, 0, 0), IVec3::new(31, 255, 15));
        assert_eq!(level.entity_count_in(&left), 2);
        assert_eq!(level.entity_count_in(&both), 3);
    }
}
