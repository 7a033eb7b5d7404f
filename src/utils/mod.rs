pub mod arena;
pub mod math;

pub use arena::{FixedVec, TickArena};
pub use math::AABB;
