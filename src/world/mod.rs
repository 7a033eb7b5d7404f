pub mod chunk;
pub mod coords;
pub mod level;
pub mod query;
pub mod tile;

pub use chunk::Chunk;
pub use coords::{CHUNK_HEIGHT, CHUNK_SIZE};
pub use level::Level;
pub use query::{ColliderMask, EntityFilter, QueryResult, TileArea};
pub use tile::{default_registry, TileDef, TileFlags, TileId, TileRegistry, TILE_AIR};
