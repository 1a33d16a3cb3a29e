use crate::constants::SEA_LEVEL;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum BlockType {
    #[default]
    Air,
    Grass,
    Dirt,
    Stone,
    Sand,
}

impl BlockType {
    pub fn is_solid(&self) -> bool {
        !matches!(self, BlockType::Air)
    }

    /// Block for a solid cell at height `y` below a surface at `surface_height`.
    pub fn for_depth(y: i32, surface_height: i32) -> Self {
        if y >= surface_height {
            BlockType::Air
        } else if y == surface_height - 1 {
            if surface_height <= SEA_LEVEL + 1 {
                BlockType::Sand
            } else {
                BlockType::Grass
            }
        } else if y >= surface_height - 4 {
            BlockType::Dirt
        } else {
            BlockType::Stone
        }
    }
}
