//! Entity identity, per-instance spatial state and the per-tick update
//! pipeline shared by every entity kind.

use glam::{IVec2, IVec3, Vec3};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::context::SimulationContext;
use crate::entity::behavior::EntityKind;
use crate::entity::movement::{move_entity, MOVE_EPSILON};
use crate::utils::math::AABB;
use crate::world::coords::{column_index, tile_of, to_local, to_offset};
use crate::world::level::Level;

/// Position changes smaller than this do not trigger a spatial recheck.
pub const POSITION_EPSILON: f32 = 1e-5;

/// Handle to an entity slot in a [`Level`]. Stable for the lifetime of the
/// entity; slots are reused after destruction, and a handle held across a
/// reuse observes the new occupant (there is no generation counter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl EntityId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Spatial state common to all entity kinds. Kind-specific state lives in
/// the [`EntityKind`] box next to this.
#[derive(Debug)]
pub struct EntityData {
    pub id: EntityId,
    /// Chunk currently indexing this entity, None while detached.
    pub chunk: Option<IVec2>,
    pub pos: Vec3,
    pub last_pos: Vec3,
    pub velocity: Vec3,
    /// Movement actually applied last tick, after collision resolution.
    pub pos_delta: Vec3,
    /// Smoothed facing, updated only while moving.
    pub direction: Vec3,
    pub tile: IVec3,
    /// Tile this entity is indexed under; trails `tile` until rechecked.
    pub last_tile: IVec3,
    pub center: Vec3,
    pub center_tile: IVec3,
    pub last_move_ticks: u64,
    pub spawned_tick: u64,
    pub should_destroy: bool,
    /// Per-tick velocity multiplier.
    pub drag: f32,
    /// Bounce factor on blocked axes; None kills the axis velocity instead.
    pub restitution: Option<f32>,
}

/// An entity: shared spatial data plus boxed kind behavior.
///
/// The two fields are deliberately separate so behavior hooks can borrow the
/// data mutably while the kind itself is also borrowed mutably.
#[derive(Debug)]
pub struct Entity {
    pub data: EntityData,
    pub kind: Box<dyn EntityKind>,
}

impl Entity {
    pub fn new(id: EntityId, pos: Vec3, ticks: u64, kind: Box<dyn EntityKind>) -> Self {
        let tile = tile_of(pos);
        Self {
            data: EntityData {
                id,
                chunk: None,
                pos,
                last_pos: pos,
                velocity: Vec3::ZERO,
                pos_delta: Vec3::ZERO,
                direction: Vec3::ZERO,
                tile,
                last_tile: tile,
                center: pos,
                center_tile: tile,
                last_move_ticks: ticks,
                spawned_tick: ticks,
                should_destroy: false,
                drag: 1.0,
                restitution: None,
            },
            kind,
        }
    }

    /// Collision box at the current position, None for point entities.
    ///
    /// The box is anchored at the feet: `pos` is the center of the bottom
    /// face.
    pub fn aabb(&self) -> Option<AABB> {
        let size = self.kind.aabb_size()?;
        let min = Vec3::new(
            self.data.pos.x - size.x * 0.5,
            self.data.pos.y,
            self.data.pos.z - size.z * 0.5,
        );
        Some(AABB::new(min, min + size))
    }

    /// Refreshes the derived position fields (center, discretized tiles).
    pub fn recheck_position(&mut self, force: bool) {
        let moved = self.data.pos.distance_squared(self.data.last_pos)
            > POSITION_EPSILON * POSITION_EPSILON;
        if !force && !moved {
            return;
        }
        self.data.center = match self.aabb() {
            Some(bb) => bb.center(),
            None => self.data.pos,
        };
        self.data.tile = tile_of(self.data.pos);
        self.data.center_tile = tile_of(self.data.center);
    }

    /// Re-indexes this entity in the chunk grid after its tile changed.
    ///
    /// Crossing into an unloaded or out-of-range chunk destroys the entity:
    /// nothing outside the loaded grid is simulated.
    pub fn recheck_tile(&mut self, level: &mut Level, force: bool) {
        if !force && self.data.tile == self.data.last_tile {
            return;
        }

        let offset = to_offset(self.data.tile);
        if level.chunk(offset).is_none() {
            warn!(
                "entity {} left the loaded grid at {:?}, destroying",
                self.data.id, self.data.tile
            );
            self.detach(level);
            self.data.should_destroy = true;
            return;
        }

        let old_col = column_index(to_local(self.data.last_tile));
        let new_col = column_index(to_local(self.data.tile));

        if self.data.chunk != Some(offset) {
            self.detach(level);
            let chunk = level
                .chunk_mut(offset)
                .expect("destination chunk checked above");
            chunk.insert_entity(self.data.id, new_col);
            self.data.chunk = Some(offset);
        } else if old_col != new_col {
            let chunk = level
                .chunk_mut(offset)
                .expect("destination chunk checked above");
            chunk.move_entity_column(self.data.id, old_col, new_col);
        }

        self.data.last_tile = self.data.tile;
    }

    /// Removes this entity from its current chunk index, if any. Safe to
    /// call when the chunk has already been unloaded.
    pub fn detach(&mut self, level: &mut Level) {
        if let Some(offset) = self.data.chunk.take() {
            if let Some(chunk) = level.chunk_mut(offset) {
                chunk.remove_entity(self.data.id, column_index(to_local(self.data.last_tile)));
            }
        }
    }

    /// Post-movement bookkeeping: position delta, facing, re-indexing.
    pub fn relocate(&mut self, level: &mut Level, ctx: &SimulationContext) {
        self.data.pos_delta = self.data.pos - self.data.last_pos;
        if self.data.pos_delta.length_squared() > POSITION_EPSILON * POSITION_EPSILON {
            let heading = self.data.pos_delta.normalize();
            self.data.direction = if self.data.direction == Vec3::ZERO {
                heading
            } else {
                self.data.direction.lerp(heading, 0.3).normalize()
            };
            self.data.last_move_ticks = ctx.ticks;
        }
        self.recheck_position(false);
        if !self.data.should_destroy {
            self.recheck_tile(level, false);
        }
        self.data.last_pos = self.data.pos;
    }

    /// One simulation step: behavior hook, gravity, collision-resolved
    /// movement, velocity response on blocked axes.
    pub fn tick(&mut self, level: &mut Level, ctx: &mut SimulationContext) {
        {
            let Entity { data, kind } = &mut *self;
            kind.tick(data, level, ctx);
        }
        if self.data.should_destroy {
            return;
        }

        if self.kind.has_gravity() {
            self.data.velocity.y =
                (self.data.velocity.y - level.config.gravity).max(-level.config.terminal_velocity);
        }

        let wanted = self.data.velocity;
        let applied = move_entity(self, level, ctx, wanted);

        for axis in 0..3 {
            if (wanted[axis] - applied[axis]).abs() > MOVE_EPSILON {
                self.data.velocity[axis] = match self.data.restitution {
                    Some(r) => -wanted[axis] * r,
                    None => 0.0,
                };
            }
        }
        self.data.velocity *= self.data.drag;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::behavior::SimpleBody;

    #[test]
    fn test_aabb_anchored_at_feet() {
        let entity = Entity::new(
            EntityId(0),
            Vec3::new(8.0, 4.0, 8.0),
            0,
            Box::new(SimpleBody::new(Vec3::new(0.8, 1.8, 0.8))),
        );
        let bb = entity.aabb().unwrap();
        assert_eq!(bb.min, Vec3::new(7.6, 4.0, 7.6));
        assert_eq!(bb.max, Vec3::new(8.4, 5.8, 8.4));
    }

    #[test]
    fn test_point_entity_has_no_aabb() {
        let entity = Entity::new(
            EntityId(0),
            Vec3::ZERO,
            0,
            Box::new(SimpleBody::marker()),
        );
        assert!(entity.aabb().is_none());
        assert_eq!(entity.data.center, Vec3::ZERO);
    }

    #[test]
    fn test_recheck_position_updates_tiles() {
        let mut entity = Entity::new(
            EntityId(0),
            Vec3::new(0.5, 3.0, 0.5),
            0,
            Box::new(SimpleBody::new(Vec3::ONE)),
        );
        entity.data.pos = Vec3::new(-0.5, 3.0, 16.5);
        entity.recheck_position(false);
        assert_eq!(entity.data.tile, IVec3::new(-1, 3, 16));
        // Indexed tile only moves once recheck_tile runs.
        assert_eq!(entity.data.last_tile, IVec3::new(0, 3, 0));
    }
}
