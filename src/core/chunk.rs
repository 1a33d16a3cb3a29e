use glam::Vec3;

use crate::constants::CHUNK_SIZE;
use crate::render::frustum::AABB;

/// Integer position of a cubic chunk on the chunk grid.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkCoord {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Chunk containing the given world-space position.
    pub fn from_world(position: Vec3) -> Self {
        let size = CHUNK_SIZE as f32;
        Self {
            x: (position.x / size).floor() as i32,
            y: (position.y / size).floor() as i32,
            z: (position.z / size).floor() as i32,
        }
    }

    pub fn column(&self) -> ColumnKey {
        ColumnKey {
            x: self.x,
            z: self.z,
        }
    }

    /// Squared distance on the chunk grid.
    pub fn distance_sq(&self, other: ChunkCoord) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        let dz = (self.z - other.z) as i64;
        dx * dx + dy * dy + dz * dz
    }

    pub fn within_radius(&self, center: ChunkCoord, radius: i32) -> bool {
        let r = radius as i64;
        self.distance_sq(center) <= r * r
    }

    pub fn world_origin(&self) -> Vec3 {
        Vec3::new(
            (self.x * CHUNK_SIZE) as f32,
            (self.y * CHUNK_SIZE) as f32,
            (self.z * CHUNK_SIZE) as f32,
        )
    }

    pub fn aabb(&self) -> AABB {
        let min = self.world_origin();
        AABB::new(min, min + Vec3::splat(CHUNK_SIZE as f32))
    }

    /// The six face-adjacent chunk coordinates.
    pub fn neighbors(&self) -> [ChunkCoord; 6] {
        [
            Self::new(self.x - 1, self.y, self.z),
            Self::new(self.x + 1, self.y, self.z),
            Self::new(self.x, self.y - 1, self.z),
            Self::new(self.x, self.y + 1, self.z),
            Self::new(self.x, self.y, self.z - 1),
            Self::new(self.x, self.y, self.z + 1),
        ]
    }
}

/// An (x, z) column of vertically stacked chunks.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnKey {
    pub x: i32,
    pub z: i32,
}

impl ColumnKey {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_world_floors_negative_positions() {
        let coord = ChunkCoord::from_world(Vec3::new(-0.5, 17.0, 31.9));
        assert_eq!(coord, ChunkCoord::new(-1, 1, 1));
    }

    #[test]
    fn test_radius_uses_squared_grid_distance() {
        let center = ChunkCoord::new(0, 0, 0);
        assert!(ChunkCoord::new(3, 4, 0).within_radius(center, 5));
        assert!(!ChunkCoord::new(3, 4, 1).within_radius(center, 5));
    }

    #[test]
    fn test_aabb_spans_one_chunk() {
        let aabb = ChunkCoord::new(1, -1, 2).aabb();
        assert_eq!(aabb.min, Vec3::new(16.0, -16.0, 32.0));
        assert_eq!(aabb.max, Vec3::new(32.0, 0.0, 48.0));
    }
}
