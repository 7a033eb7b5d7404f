pub mod base;
pub mod behavior;
pub mod movement;

pub use base::{Entity, EntityData, EntityId, POSITION_EPSILON};
pub use behavior::{EntityKind, SimpleBody};
pub use movement::{move_entity, MOVE_EPSILON, RESOLVE_EPSILON};
