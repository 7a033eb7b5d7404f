//! Per-axis swept collision movement.
//!
//! The resolver gathers colliders once for a broad region, then resolves
//! the three axes sequentially in a fixed X, Y, Z order. Sequential
//! resolution is what lets an entity slide along a wall it is blocked on:
//! the blocked axis clamps to the surface while the others keep their
//! motion. Near corners this is an approximation of a true vector sweep,
//! which is an accepted trade-off.

use glam::Vec3;
use log::warn;

use crate::context::SimulationContext;
use crate::entity::base::{Entity, EntityId};
use crate::utils::arena::FixedVec;
use crate::world::level::Level;
use crate::world::query::{ColliderMask, TileArea};

/// Displacements smaller than this are treated as zero.
pub const MOVE_EPSILON: f32 = 1e-4;
/// Gap left between a clamped box and the collider that stopped it, so the
/// two never end up exactly flush.
pub const RESOLVE_EPSILON: f32 = 1e-4;
/// Broad-phase gather region, as a multiple of the entity's box.
const BROAD_SCALE: f32 = 4.0;
/// Entity collider headroom past the counted chunk population.
const ENTITY_SLACK: usize = 128;
/// Distinct collision partners tracked per move.
const CONTACT_BUDGET: usize = 32;

fn axis_unit(axis: usize) -> Vec3 {
    match axis {
        0 => Vec3::X,
        1 => Vec3::Y,
        _ => Vec3::Z,
    }
}

/// Moves `entity` by up to `delta`, resolving collisions, and returns the
/// displacement actually applied. Each component of the result has the
/// same sign as the request (or is zero) and never exceeds it in
/// magnitude. `entity.pos` is updated as a side effect.
///
/// The entity must be detached from the table while this runs (the tick
/// sweep guarantees that); other entities are looked up through the level.
pub fn move_entity(
    entity: &mut Entity,
    level: &mut Level,
    ctx: &mut SimulationContext,
    delta: Vec3,
) -> Vec3 {
    if delta.length() < MOVE_EPSILON {
        return Vec3::ZERO;
    }

    // Point entities do not collide with anything.
    let Some(start) = entity.aabb() else {
        entity.data.pos += delta;
        return delta;
    };

    let area = TileArea::from_aabb(&start.scaled_about_center(BROAD_SCALE));
    let with_entities = entity.kind.collides_with_entities();
    let (cap, mask) = if with_entities {
        (
            level.config.tile_collider_budget + level.entity_count_in(&area) + ENTITY_SLACK,
            ColliderMask::TILE | ColliderMask::ENTITY,
        )
    } else {
        (level.config.tile_collider_budget, ColliderMask::TILE)
    };

    let mut boxes = ctx.arena.take_colliders(cap);
    let mut ids = ctx.arena.take_ids(cap);
    let gather = level.colliders(&mut boxes, &area, Some(&*entity), &mut ids, None, mask);
    if gather.overflow {
        warn!(
            "collider gather overflowed moving entity {} ({} captured), resolving best-effort",
            entity.data.id, gather.count
        );
    }
    // Tile colliders occupy the head of `boxes`; the tail pairs with `ids`.
    let tile_count = boxes.len() - ids.len();

    let mut contacts = ctx.arena.take_ids(CONTACT_BUDGET);
    let level_bounds = level.aabb();
    let waive_y = entity.kind.allow_vertically_out_of_level();

    let mut current = start;
    for axis in 0..3 {
        let wanted = delta[axis];
        if wanted.abs() < MOVE_EPSILON {
            continue;
        }
        let mut m = wanted;
        let mut translated = current.translated(axis_unit(axis) * m);

        for (index, collider) in boxes.as_slice().iter().enumerate() {
            if !translated.overlaps(collider) {
                continue;
            }

            let mut stops = true;
            if index >= tile_count {
                let other_id = ids.as_slice()[index - tile_count];
                let Some(other) = level.entity(other_id) else {
                    continue;
                };
                let both_collide = entity.kind.does_collide(&entity.data, other)
                    && other.kind.does_collide(&other.data, &*entity);
                if !both_collide {
                    continue;
                }
                queue_contact(&mut contacts, entity, other_id);
                stops = entity.kind.does_stop(&entity.data, other)
                    && other.kind.does_stop(&other.data, &*entity);
            }
            if !stops || m == 0.0 {
                continue;
            }

            let depth = translated.penetration(collider, axis, m);
            if depth <= 0.0 {
                continue;
            }
            m -= m.signum() * (depth + RESOLVE_EPSILON);
            if m.abs() < MOVE_EPSILON || m.signum() != wanted.signum() {
                m = 0.0;
            }
            translated = current.translated(axis_unit(axis) * m);
        }

        // Containment: the box may never leave the grid on X or Z, nor on
        // Y unless this kind waives it. A violating axis is rejected
        // outright, not partially applied.
        let contained = translated.min[axis] >= level_bounds.min[axis]
            && translated.max[axis] <= level_bounds.max[axis];
        if !contained && !(axis == 1 && waive_y) {
            translated = current;
        }
        current = translated;
    }

    let applied = current.min - start.min;
    entity.data.pos += applied;

    // Contact events fire after the walk so resolution never observes a
    // partner mid-mutation. Both sides fire or neither.
    for &other_id in contacts.as_slice() {
        if let Some(other) = level.entity_mut(other_id) {
            let Entity { data, kind } = other;
            kind.on_collision(data, entity.data.id);
        }
        let Entity { data, kind } = &mut *entity;
        kind.on_collision(data, other_id);
    }

    ctx.arena.put_ids(contacts);
    ctx.arena.put_ids(ids);
    ctx.arena.put_colliders(boxes);
    applied
}

fn queue_contact(contacts: &mut FixedVec<EntityId>, entity: &Entity, other_id: EntityId) {
    if contacts.as_slice().contains(&other_id) {
        return;
    }
    if !contacts.push(other_id) {
        warn!(
            "contact list full for entity {}, dropping event against {other_id}",
            entity.data.id
        );
    }
}
