//! Coordinate conversions between level space, chunk offsets, chunk-local
//! positions and discretized tiles.
//!
//! Everything here is Euclidean (floor division / `rem_euclid`), not
//! truncating: negative coordinates must land in the chunk and column to
//! their "lower left", or chunk and bucket membership silently corrupts.

use glam::{IVec2, IVec3, Vec3};

use crate::utils::math::AABB;

/// Chunk edge length on X and Z, in tiles.
pub const CHUNK_SIZE: i32 = 16;
/// World height in tiles; every chunk spans the full height.
pub const CHUNK_HEIGHT: i32 = 256;

/// Chunk offset containing the given tile.
pub fn to_offset(tile: IVec3) -> IVec2 {
    IVec2::new(tile.x.div_euclid(CHUNK_SIZE), tile.z.div_euclid(CHUNK_SIZE))
}

/// Chunk-local position of the given tile (Y passes through unchanged).
pub fn to_local(tile: IVec3) -> IVec3 {
    IVec3::new(
        tile.x.rem_euclid(CHUNK_SIZE),
        tile.y,
        tile.z.rem_euclid(CHUNK_SIZE),
    )
}

/// Discretized tile containing a continuous position.
pub fn tile_of(pos: Vec3) -> IVec3 {
    pos.floor().as_ivec3()
}

/// Continuous center of a tile cell.
pub fn tile_center(tile: IVec3) -> Vec3 {
    tile.as_vec3() + Vec3::splat(0.5)
}

/// The unit cell occupied by a tile.
pub fn tile_aabb(tile: IVec3) -> AABB {
    let min = tile.as_vec3();
    AABB::new(min, min + Vec3::ONE)
}

/// Tile-space origin of a chunk.
pub fn chunk_origin(offset: IVec2) -> IVec3 {
    IVec3::new(offset.x * CHUNK_SIZE, 0, offset.y * CHUNK_SIZE)
}

/// Flat XZ bucket index of a chunk-local position.
pub fn column_index(local: IVec3) -> usize {
    debug_assert!(
        (0..CHUNK_SIZE).contains(&local.x) && (0..CHUNK_SIZE).contains(&local.z),
        "column index out of chunk: {local:?}"
    );
    (local.z * CHUNK_SIZE + local.x) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_euclidean_at_negative_coords() {
        assert_eq!(to_offset(IVec3::new(0, 0, 0)), IVec2::new(0, 0));
        assert_eq!(to_offset(IVec3::new(15, 40, 15)), IVec2::new(0, 0));
        assert_eq!(to_offset(IVec3::new(16, 0, 0)), IVec2::new(1, 0));
        assert_eq!(to_offset(IVec3::new(-1, 0, -1)), IVec2::new(-1, -1));
        assert_eq!(to_offset(IVec3::new(-16, 0, -17)), IVec2::new(-1, -2));
    }

    #[test]
    fn test_local_euclidean_at_negative_coords() {
        assert_eq!(to_local(IVec3::new(-1, 7, -16)), IVec3::new(15, 7, 0));
        assert_eq!(to_local(IVec3::new(17, 0, 33)), IVec3::new(1, 0, 1));
    }

    #[test]
    fn test_offset_local_roundtrip() {
        for &tile in &[
            IVec3::new(-33, 5, 100),
            IVec3::new(0, 0, 0),
            IVec3::new(255, 10, -1),
        ] {
            let rebuilt = chunk_origin(to_offset(tile))
                + IVec3::new(to_local(tile).x, tile.y, to_local(tile).z);
            assert_eq!(rebuilt, tile);
        }
    }

    #[test]
    fn test_tile_of_floors_negatives() {
        assert_eq!(tile_of(Vec3::new(0.5, 0.0, 0.9)), IVec3::new(0, 0, 0));
        assert_eq!(tile_of(Vec3::new(-0.5, -1.1, 2.0)), IVec3::new(-1, -2, 2));
    }

    #[test]
    fn test_tile_center_and_aabb() {
        let tile = IVec3::new(3, 0, -2);
        assert_eq!(tile_center(tile), Vec3::new(3.5, 0.5, -1.5));
        let cell = tile_aabb(tile);
        assert!(cell.contains(tile_center(tile)));
        assert_eq!(cell.size(), Vec3::ONE);
    }

    #[test]
    fn test_column_index_layout() {
        assert_eq!(column_index(IVec3::new(0, 0, 0)), 0);
        assert_eq!(column_index(IVec3::new(15, 99, 0)), 15);
        assert_eq!(column_index(IVec3::new(0, 0, 1)), CHUNK_SIZE as usize);
        assert_eq!(
            column_index(IVec3::new(15, 0, 15)),
            (CHUNK_SIZE * CHUNK_SIZE - 1) as usize
        );
    }
}
