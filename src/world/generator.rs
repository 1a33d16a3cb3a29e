//! Terrain height generation using FastNoiseLite

use fastnoise_lite::{FastNoiseLite, FractalType, NoiseType};

use crate::constants::*;

/// Surface height source for the heightmap world
pub struct TerrainGenerator {
    noise_terrain: FastNoiseLite,
    noise_detail: FastNoiseLite,
    flat_height: Option<i32>,
    pub seed: u32,
}

impl TerrainGenerator {
    /// Create a noise-driven generator with the specified seed
    pub fn new(seed: u32) -> Self {
        TerrainGenerator {
            noise_terrain: Self::create_fbm_noise(seed, 0.008),
            noise_detail: Self::create_noise(seed.wrapping_add(1), 0.04),
            flat_height: None,
            seed,
        }
    }

    /// Generator whose surface is at `height` everywhere
    pub fn flat(height: i32) -> Self {
        let mut generator = Self::new(0);
        generator.flat_height = Some(height.clamp(0, WORLD_HEIGHT));
        generator
    }

    fn create_noise(seed: u32, frequency: f32) -> FastNoiseLite {
        let mut noise = FastNoiseLite::with_seed(seed as i32);
        noise.set_noise_type(Some(NoiseType::OpenSimplex2));
        noise.set_frequency(Some(frequency));
        noise
    }

    fn create_fbm_noise(seed: u32, frequency: f32) -> FastNoiseLite {
        let mut noise = FastNoiseLite::with_seed(seed as i32);
        noise.set_noise_type(Some(NoiseType::OpenSimplex2));
        noise.set_fractal_type(Some(FractalType::FBm));
        noise.set_fractal_octaves(Some(4));
        noise.set_fractal_lacunarity(Some(2.0));
        noise.set_fractal_gain(Some(0.5));
        noise.set_frequency(Some(frequency));
        noise
    }

    /// Number of solid blocks in the column at world (x, z)
    pub fn height(&self, x: i32, z: i32) -> i32 {
        if let Some(height) = self.flat_height {
            return height;
        }
        let fx = x as f32;
        let fz = z as f32;

        let terrain = self.noise_terrain.get_noise_2d(fx, fz);
        let detail = self.noise_detail.get_noise_2d(fx, fz);

        let height = SEA_LEVEL as f32 + terrain * 28.0 + detail * 3.0;
        (height as i32).clamp(1, WORLD_HEIGHT - 20)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heights_are_deterministic_and_bounded() {
        let a = TerrainGenerator::new(2137);
        let b = TerrainGenerator::new(2137);
        for (x, z) in [(0, 0), (-37, 512), (1000, -1000), (5, 5)] {
            let h = a.height(x, z);
            assert_eq!(h, b.height(x, z));
            assert!((1..=WORLD_HEIGHT - 20).contains(&h));
        }
    }

    #[test]
    fn test_flat_generator() {
        let generator = TerrainGenerator::flat(8);
        assert_eq!(generator.height(-400, 77), 8);
    }
}
