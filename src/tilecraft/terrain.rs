use ::noise::NoiseFn;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::{block_type::{BlockId, BlockType}, chunk::{Chunk, CHUNK_SIZE}, noise::{chunk_seed, derive_seed, Fbm}};

// y grows downwards, so smaller heights are taller hills
pub const BASE_HEIGHT: i64 = 8;
pub const HEIGHT_AMPLITUDE: f64 = 12.0;
pub const HEIGHT_SCALE: f64 = 1.0 / 48.0;
pub const BIOME_SCALE: f64 = 1.0 / 256.0;
pub const FILLER_DEPTH: i64 = 4;
pub const OBSIDIAN_DEPTH: i64 = 32;

const HEIGHT_LAYER: u64 = 1;
const BIOME_LAYER: u64 = 2;
const MATERIAL_STREAM: u64 = 3;
const VEGETATION_STREAM: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Biome {
    Desert,
    Plains,
    Forest,
    Mountain,
    IcePlains
}

impl Biome {
    // five contiguous bands over the biome noise
    pub fn from_noise(value: f64) -> Biome {
        if value < 0.35 {
            Biome::Desert
        } else if value < 0.45 {
            Biome::Plains
        } else if value < 0.55 {
            Biome::Forest
        } else if value < 0.65 {
            Biome::Mountain
        } else {
            Biome::IcePlains
        }
    }

    /// Chance that a column in this biome grows a tree or cactus.
    pub fn vegetation_chance(self) -> f64 {
        match self {
            Biome::Forest => 0.18,
            Biome::Mountain => 0.05,
            Biome::Desert => 0.04,
            Biome::Plains | Biome::IcePlains => 0.0
        }
    }

    pub fn surface_blocks(self) -> &'static [BlockType] {
        match self {
            Biome::Desert => &[BlockType::Sand],
            Biome::Plains | Biome::Forest => &[BlockType::Grass],
            Biome::Mountain => &[BlockType::Stone, BlockType::Gravel],
            Biome::IcePlains => &[BlockType::Snow, BlockType::Ice]
        }
    }

    fn surface_block<R: Rng>(self, rng: &mut R) -> BlockType {
        match self {
            Biome::Desert => BlockType::Sand,
            Biome::Plains | Biome::Forest => BlockType::Grass,
            Biome::Mountain => if rng.gen::<f64>() < 0.7 { BlockType::Stone } else { BlockType::Gravel },
            Biome::IcePlains => if rng.gen::<f64>() < 0.75 { BlockType::Snow } else { BlockType::Ice }
        }
    }

    fn filler_block<R: Rng>(self, rng: &mut R) -> BlockType {
        let roll = rng.gen::<f64>();
        match self {
            Biome::Desert => if roll < 0.35 { BlockType::Sandstone } else { BlockType::Sand },
            Biome::IcePlains => if roll < 0.2 { BlockType::Stone } else { BlockType::Dirt },
            _ => if roll < 0.35 { BlockType::Stone } else { BlockType::Dirt }
        }
    }
}

/// Anything that can fill a chunk on demand.
pub trait ChunkGenerator {
    fn generate_chunk(&self, cx: i32, cy: i32) -> Chunk;
}

/// Seeded terrain generator. Output is a pure function of the world seed and
/// the chunk coordinate, so client and server always agree.
#[derive(Debug, Clone, Copy)]
pub struct TerrainGenerator {
    seed: u64,
    height_noise: Fbm,
    biome_noise: Fbm
}

impl TerrainGenerator {
    pub fn new(seed: u64) -> TerrainGenerator {
        let height_noise = Fbm::new(derive_seed(seed, HEIGHT_LAYER) as u32, 4, HEIGHT_SCALE);
        let biome_noise = Fbm::new(derive_seed(seed, BIOME_LAYER) as u32, 3, BIOME_SCALE);
        TerrainGenerator { seed, height_noise, biome_noise }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Row of the last air cell in a column; the surface block sits one below.
    pub fn height(&self, global_x: i64) -> i64 {
        let noise = self.height_noise.get(global_x as f64);
        BASE_HEIGHT - ((noise - 0.5) * 2.0 * HEIGHT_AMPLITUDE).round() as i64
    }

    pub fn biome(&self, global_x: i64) -> Biome {
        Biome::from_noise(self.biome_noise.get(global_x as f64))
    }

    fn rng(&self, cx: i32, cy: i32, stream: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(derive_seed(chunk_seed(self.seed, cx, cy), stream))
    }

    /// Ground and ores only, without the vegetation pass.
    pub fn generate_terrain(&self, cx: i32, cy: i32) -> Chunk {
        let mut chunk = Chunk::air();
        let mut rng = self.rng(cx, cy, MATERIAL_STREAM);
        let columns: Vec<(i64, Biome)> = (0..CHUNK_SIZE)
            .map(|x| {
                let global_x = cx as i64 * CHUNK_SIZE as i64 + x as i64;
                (self.height(global_x), self.biome(global_x))
            })
            .collect();

        for y in 0..CHUNK_SIZE {
            let global_y = cy as i64 * CHUNK_SIZE as i64 + y as i64;
            for (x, (height, biome)) in columns.iter().enumerate() {
                let depth = global_y - height;
                let block = if depth <= 0 {
                    continue;
                } else if depth == 1 {
                    biome.surface_block(&mut rng)
                } else if depth <= FILLER_DEPTH {
                    biome.filler_block(&mut rng)
                } else {
                    deep_block(&mut rng, depth)
                };
                chunk.set_block(x, y, block.id());
            }
        }
        chunk
    }

    fn grow_vegetation(&self, chunk: &mut Chunk, cx: i32, cy: i32) {
        let mut rng = self.rng(cx, cy, VEGETATION_STREAM);
        for x in 0..CHUNK_SIZE {
            let global_x = cx as i64 * CHUNK_SIZE as i64 + x as i64;
            let biome = self.biome(global_x);
            let roll = rng.gen::<f64>();
            let anchor = self.height(global_x) - cy as i64 * CHUNK_SIZE as i64;
            if anchor < 0 || anchor >= CHUNK_SIZE as i64 || roll >= biome.vegetation_chance() {
                continue;
            }

            match biome {
                Biome::Desert => {
                    let height = rng.gen_range(2..=4);
                    for i in 0..height {
                        stamp(chunk, x as i64, anchor - i, BlockType::Cactus.id());
                    }
                },
                _ => {
                    let height = rng.gen_range(3..=5);
                    for i in 0..height {
                        stamp(chunk, x as i64, anchor - i, BlockType::Wood.id());
                    }
                    let canopy_y = anchor - height;
                    for dx in -2..=2i64 {
                        for dy in -2..=2i64 {
                            if dx.abs() + dy.abs() < 4 {
                                stamp(chunk, x as i64 + dx, canopy_y + dy, BlockType::Leaves.id());
                            }
                        }
                    }
                }
            }
        }
    }
}

impl Default for TerrainGenerator {
    fn default() -> Self {
        TerrainGenerator::new(0)
    }
}

impl ChunkGenerator for TerrainGenerator {
    fn generate_chunk(&self, cx: i32, cy: i32) -> Chunk {
        let mut chunk = self.generate_terrain(cx, cy);
        self.grow_vegetation(&mut chunk, cx, cy);
        chunk
    }
}

// coal 6%, copper 3%, dirt 5% at every depth; deep rock gives up 2% to obsidian
fn deep_block<R: Rng>(rng: &mut R, depth: i64) -> BlockType {
    let mut roll = rng.gen::<f64>();
    if depth > OBSIDIAN_DEPTH {
        if roll < 0.02 {
            return BlockType::Obsidian;
        }
        roll -= 0.02;
    }
    if roll < 0.06 {
        BlockType::CoalOre
    } else if roll < 0.09 {
        BlockType::CopperOre
    } else if roll < 0.14 {
        BlockType::Dirt
    } else {
        BlockType::Stone
    }
}

// clipped to the chunk, never replaces terrain
fn stamp(chunk: &mut Chunk, x: i64, y: i64, block: BlockId) {
    if x < 0 || y < 0 || x >= CHUNK_SIZE as i64 || y >= CHUNK_SIZE as i64 {
        return;
    }
    let (x, y) = (x as usize, y as usize);
    if chunk.is_air(x, y) {
        chunk.set_block(x, y, block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_columns(cx: i32) -> impl Iterator<Item = (usize, i64)> {
        (0..CHUNK_SIZE).map(move |x| (x, cx as i64 * CHUNK_SIZE as i64 + x as i64))
    }

    #[test]
    fn generation_is_deterministic() {
        let a = TerrainGenerator::new(1234);
        let b = TerrainGenerator::new(1234);
        for (cx, cy) in [(0, 0), (-3, 1), (7, -2), (100, 0)].iter() {
            assert_eq!(a.generate_chunk(*cx, *cy), b.generate_chunk(*cx, *cy));
        }
        assert_eq!(a.height(-77), b.height(-77));
        assert_eq!(a.biome(5000), b.biome(5000));
    }

    #[test]
    fn terrain_invariant_holds_for_every_column() {
        let generator = TerrainGenerator::new(99);
        for cx in -6..6 {
            for cy in -2..3 {
                let chunk = generator.generate_terrain(cx, cy);
                for (x, global_x) in chunk_columns(cx) {
                    let height = generator.height(global_x);
                    let surface = generator.biome(global_x).surface_blocks();
                    for y in 0..CHUNK_SIZE {
                        let global_y = cy as i64 * CHUNK_SIZE as i64 + y as i64;
                        let tile = chunk.get(x, y).unwrap();
                        if global_y <= height {
                            assert_eq!(tile, BlockType::Air.id(), "air expected at ({}, {})", global_x, global_y);
                        } else if global_y == height + 1 {
                            assert!(
                                surface.iter().any(|block| block.id() == tile),
                                "surface expected at ({}, {}), got {}", global_x, global_y, tile
                            );
                        } else {
                            assert_ne!(tile, BlockType::Air.id());
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn vegetation_only_adds_plants_above_ground() {
        let generator = TerrainGenerator::new(7);
        let plants = [BlockType::Wood.id(), BlockType::Leaves.id(), BlockType::Cactus.id()];
        for cx in -20..20 {
            for cy in -2..2 {
                let terrain = generator.generate_terrain(cx, cy);
                let full = generator.generate_chunk(cx, cy);
                for x in 0..CHUNK_SIZE {
                    for y in 0..CHUNK_SIZE {
                        let before = terrain.get(x, y).unwrap();
                        let after = full.get(x, y).unwrap();
                        if before != BlockType::Air.id() {
                            assert_eq!(before, after, "vegetation replaced terrain");
                        } else if after != BlockType::Air.id() {
                            assert!(plants.contains(&after));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn some_forest_grows_trees() {
        let generator = TerrainGenerator::new(3);
        let mut trees = 0;
        for cx in -200..200 {
            let global_x = cx as i64 * CHUNK_SIZE as i64;
            if generator.biome(global_x) != Biome::Forest {
                continue;
            }
            let cy = (generator.height(global_x)).div_euclid(CHUNK_SIZE as i64) as i32;
            let chunk = generator.generate_chunk(cx, cy);
            trees += chunk.rows().iter().flatten().filter(|tile| **tile == BlockType::Wood.id()).count();
        }
        assert!(trees > 0);
    }

    #[test]
    fn biome_bands_are_contiguous() {
        assert_eq!(Biome::from_noise(0.0), Biome::Desert);
        assert_eq!(Biome::from_noise(0.4), Biome::Plains);
        assert_eq!(Biome::from_noise(0.5), Biome::Forest);
        assert_eq!(Biome::from_noise(0.6), Biome::Mountain);
        assert_eq!(Biome::from_noise(0.99), Biome::IcePlains);
        assert!(Biome::Forest.vegetation_chance() > Biome::Mountain.vegetation_chance());
        assert!(Biome::Mountain.vegetation_chance() > Biome::Desert.vegetation_chance());
        assert_eq!(Biome::Plains.vegetation_chance(), 0.0);
    }

    #[test]
    fn ore_shares_do_not_depend_on_depth() {
        let samples = 200_000;
        for depth in [FILLER_DEPTH + 1, OBSIDIAN_DEPTH + 1].iter() {
            let mut rng = ChaCha8Rng::seed_from_u64(17);
            let mut counts = std::collections::HashMap::new();
            for _ in 0..samples {
                *counts.entry(deep_block(&mut rng, *depth)).or_insert(0usize) += 1;
            }
            let share = |block: BlockType| *counts.get(&block).unwrap_or(&0) as f64 / samples as f64;
            assert!((share(BlockType::CoalOre) - 0.06).abs() < 0.005, "coal {} at depth {}", share(BlockType::CoalOre), depth);
            assert!((share(BlockType::CopperOre) - 0.03).abs() < 0.005);
            assert!((share(BlockType::Dirt) - 0.05).abs() < 0.005);
            let obsidian = if *depth > OBSIDIAN_DEPTH { 0.02 } else { 0.0 };
            assert!((share(BlockType::Obsidian) - obsidian).abs() < 0.005);
        }
    }

    #[test]
    fn extreme_coordinates_do_not_panic() {
        let generator = TerrainGenerator::new(5);
        generator.generate_chunk(i32::MAX, i32::MIN);
        generator.generate_chunk(i32::MIN, i32::MAX);
        generator.height(i64::MAX);
        generator.biome(i64::MIN);
    }
}
