use crate::constants::{CHUNK_SIZE, FLOATS_PER_VERTEX};
use crate::core::chunk::ChunkCoord;
use crate::world::ChunkMesher;
use crate::world::terrain::HeightmapWorld;

/// Appends a quad as two counter-clockwise triangles (v0, v1, v2) and
/// (v0, v2, v3), six floats per vertex.
pub fn add_quad(
    vertices: &mut Vec<f32>,
    v0: [f32; 3],
    v1: [f32; 3],
    v2: [f32; 3],
    v3: [f32; 3],
    normal: [f32; 3],
) {
    for position in [v0, v1, v2, v0, v2, v3] {
        vertices.extend_from_slice(&position);
        vertices.extend_from_slice(&normal);
    }
}

struct Face {
    offset: [i32; 3],
    normal: [f32; 3],
    corners: [[f32; 3]; 4],
}

// Corners are unit-cube offsets, counter-clockwise seen from outside.
const FACES: [Face; 6] = [
    Face {
        offset: [1, 0, 0],
        normal: [1.0, 0.0, 0.0],
        corners: [
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [1.0, 1.0, 1.0],
            [1.0, 0.0, 1.0],
        ],
    },
    Face {
        offset: [-1, 0, 0],
        normal: [-1.0, 0.0, 0.0],
        corners: [
            [0.0, 0.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.0, 1.0, 1.0],
            [0.0, 1.0, 0.0],
        ],
    },
    Face {
        offset: [0, 1, 0],
        normal: [0.0, 1.0, 0.0],
        corners: [
            [0.0, 1.0, 0.0],
            [0.0, 1.0, 1.0],
            [1.0, 1.0, 1.0],
            [1.0, 1.0, 0.0],
        ],
    },
    Face {
        offset: [0, -1, 0],
        normal: [0.0, -1.0, 0.0],
        corners: [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 0.0, 1.0],
            [0.0, 0.0, 1.0],
        ],
    },
    Face {
        offset: [0, 0, 1],
        normal: [0.0, 0.0, 1.0],
        corners: [
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [1.0, 1.0, 1.0],
            [0.0, 1.0, 1.0],
        ],
    },
    Face {
        offset: [0, 0, -1],
        normal: [0.0, 0.0, -1.0],
        corners: [
            [0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
            [1.0, 0.0, 0.0],
        ],
    },
];

/// Per-block face mesher: one quad for every solid block face that touches a
/// non-solid block. Faces on chunk borders look at the neighbouring chunk.
#[derive(Debug, Default)]
pub struct FaceMesher {
    meshes_built: u64,
}

impl FaceMesher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn meshes_built(&self) -> u64 {
        self.meshes_built
    }
}

impl ChunkMesher<HeightmapWorld> for FaceMesher {
    fn build_mesh(&mut self, world: &HeightmapWorld, coord: ChunkCoord) -> Vec<f32> {
        self.meshes_built += 1;

        let base_x = coord.x * CHUNK_SIZE;
        let base_y = coord.y * CHUNK_SIZE;
        let base_z = coord.z * CHUNK_SIZE;
        let mut vertices = Vec::new();

        for lx in 0..CHUNK_SIZE {
            for lz in 0..CHUNK_SIZE {
                let x = base_x + lx;
                let z = base_z + lz;
                // Columns that end below the chunk have nothing to mesh
                if world.column_top(x, z) <= base_y {
                    continue;
                }
                for ly in 0..CHUNK_SIZE {
                    let y = base_y + ly;
                    if !world.is_solid(x, y, z) {
                        continue;
                    }
                    for face in &FACES {
                        let [ox, oy, oz] = face.offset;
                        if world.is_solid(x + ox, y + oy, z + oz) {
                            continue;
                        }
                        let corner = |c: [f32; 3]| {
                            [x as f32 + c[0], y as f32 + c[1], z as f32 + c[2]]
                        };
                        add_quad(
                            &mut vertices,
                            corner(face.corners[0]),
                            corner(face.corners[1]),
                            corner(face.corners[2]),
                            corner(face.corners[3]),
                            face.normal,
                        );
                    }
                }
            }
        }

        debug_assert_eq!(vertices.len() % FLOATS_PER_VERTEX, 0);
        vertices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::block::BlockType;
    use crate::core::vertex::Vertex;
    use glam::Vec3;

    #[test]
    fn test_add_quad_emits_two_ccw_triangles() {
        let mut vertices = Vec::new();
        add_quad(
            &mut vertices,
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        );
        assert_eq!(vertices.len(), 6 * FLOATS_PER_VERTEX);

        let position = |i: usize| Vec3::from_slice(&vertices[i * FLOATS_PER_VERTEX..][..3]);
        let normal = Vec3::new(0.0, 0.0, 1.0);
        for tri in 0..2 {
            let (a, b, c) = (position(tri * 3), position(tri * 3 + 1), position(tri * 3 + 2));
            assert!((b - a).cross(c - a).dot(normal) > 0.0);
        }
    }

    #[test]
    fn test_face_windings_match_normals() {
        for face in &FACES {
            let c: Vec<Vec3> = face.corners.iter().map(|c| Vec3::from_array(*c)).collect();
            let winding = (c[1] - c[0]).cross(c[2] - c[0]);
            assert!(winding.dot(Vec3::from_array(face.normal)) > 0.0);
        }
    }

    #[test]
    fn test_flat_world_meshes_only_the_top_layer() {
        let world = HeightmapWorld::flat(8);
        let mut mesher = FaceMesher::new();

        let ground = mesher.build_mesh(&world, ChunkCoord::new(0, 0, 0));
        assert_eq!(ground.len(), 256 * 6 * FLOATS_PER_VERTEX);
        let vertices: &[Vertex] = bytemuck::cast_slice(&ground);
        assert!(
            vertices
                .iter()
                .all(|v| v.position[1] == 8.0 && v.normal == [0.0, 1.0, 0.0])
        );

        let sky = mesher.build_mesh(&world, ChunkCoord::new(0, 1, 0));
        assert!(sky.is_empty());
        assert_eq!(mesher.meshes_built(), 2);
    }

    #[test]
    fn test_floating_block_is_meshed_above_the_surface() {
        let mut world = HeightmapWorld::flat(8);
        world.set_block(2, 20, 2, BlockType::Stone);
        let mut mesher = FaceMesher::new();

        let mesh = mesher.build_mesh(&world, ChunkCoord::new(0, 1, 0));
        assert_eq!(mesh.len(), 6 * 6 * FLOATS_PER_VERTEX);
    }

    #[test]
    fn test_removed_block_exposes_pit_walls() {
        let mut world = HeightmapWorld::flat(8);
        world.set_block(4, 7, 4, BlockType::Air);
        let mut mesher = FaceMesher::new();

        let mesh = mesher.build_mesh(&world, ChunkCoord::new(0, 0, 0));
        // 255 top faces, the pit floor and four walls
        assert_eq!(mesh.len(), (255 + 1 + 4) * 6 * FLOATS_PER_VERTEX);
    }
}
