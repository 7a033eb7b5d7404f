//! The capability contract every entity kind implements.
//!
//! Defaults describe an inert point marker; kinds override only the
//! capabilities they actually have. Hooks receive the shared
//! [`EntityData`] separately from `self` so both sides can be mutated in
//! the same call.

use glam::Vec3;

use crate::context::SimulationContext;
use crate::entity::base::{Entity, EntityData, EntityId};
use crate::world::level::Level;
use crate::world::tile::{TileDef, TileId};

pub trait EntityKind: std::fmt::Debug {
    /// Collision box dimensions, None for point entities that never collide.
    fn aabb_size(&self) -> Option<Vec3> {
        None
    }

    /// Whether movement gathers other entities as potential colliders.
    fn collides_with_entities(&self) -> bool {
        false
    }

    /// Veto for a specific collision pair. Both sides must agree before a
    /// contact is registered.
    fn does_collide(&self, _me: &EntityData, _other: &Entity) -> bool {
        true
    }

    /// Whether a registered contact also blocks movement. Both sides must
    /// agree, otherwise the pair only produces collision events.
    fn does_stop(&self, _me: &EntityData, _other: &Entity) -> bool {
        false
    }

    /// Whether spawning is refused when the spawn area is obstructed.
    fn check_spawn_collision(&self) -> bool {
        false
    }

    /// Waives the vertical half of the level containment rule, letting the
    /// entity fly above or fall below the grid without being destroyed.
    fn allow_vertically_out_of_level(&self) -> bool {
        false
    }

    fn has_gravity(&self) -> bool {
        true
    }

    /// Per-tile opt-out from tile collision, e.g. for entities that swim
    /// through what normally blocks them.
    fn ignores_tile(&self, _me: &EntityData, _id: TileId, _def: &TileDef) -> bool {
        false
    }

    /// Fired once per touched partner after a move resolves.
    fn on_collision(&mut self, _me: &mut EntityData, _other: EntityId) {}

    /// Runs once, after the entity is indexed into its level.
    fn init(&mut self, _me: &mut EntityData) {}

    /// Runs whenever the entity is attached to a level.
    fn on_level_change(&mut self, _me: &mut EntityData) {}

    /// Runs right before the entity slot is reclaimed.
    fn on_destroy(&mut self, _me: &mut EntityData) {}

    /// Kind-specific per-tick behavior, before physics.
    fn tick(&mut self, _me: &mut EntityData, _level: &mut Level, _ctx: &mut SimulationContext) {}
}

/// Minimal concrete kind: a box (or point) with no behavior of its own.
/// Useful as-is for props and projectiles, and as the workhorse of the
/// test suite.
#[derive(Debug, Clone)]
pub struct SimpleBody {
    size: Option<Vec3>,
    blocks_entities: bool,
    gravity: bool,
    spawn_check: bool,
}

impl SimpleBody {
    pub fn new(size: Vec3) -> Self {
        Self {
            size: Some(size),
            blocks_entities: false,
            gravity: true,
            spawn_check: false,
        }
    }

    /// A sizeless marker that ignores all collision.
    pub fn marker() -> Self {
        Self {
            size: None,
            blocks_entities: false,
            gravity: false,
            spawn_check: false,
        }
    }

    /// Makes this body collide with, and stop against, other blocking
    /// bodies.
    pub fn blocking(mut self) -> Self {
        self.blocks_entities = true;
        self
    }

    pub fn floating(mut self) -> Self {
        self.gravity = false;
        self
    }

    /// Refuse to spawn into an obstructed area.
    pub fn spawn_checked(mut self) -> Self {
        self.spawn_check = true;
        self
    }
}

impl EntityKind for SimpleBody {
    fn aabb_size(&self) -> Option<Vec3> {
        self.size
    }

    fn collides_with_entities(&self) -> bool {
        self.blocks_entities
    }

    fn does_stop(&self, _me: &EntityData, _other: &Entity) -> bool {
        self.blocks_entities
    }

    fn check_spawn_collision(&self) -> bool {
        self.spawn_check
    }

    fn has_gravity(&self) -> bool {
        self.gravity
    }
}
