use std::collections::HashMap;
use std::convert::TryFrom;

use tracing::debug;

use super::{block_type::{BlockId, BlockRegistry, BlockType}, chunk::{Chunk, ChunkCoord, CHUNK_SIZE}, terrain::{ChunkGenerator, TerrainGenerator}};

/// Lazily generated chunk cache. Chunks are generated at most once per
/// coordinate and are never evicted.
pub struct ChunkStore<G = TerrainGenerator> {
    chunks: HashMap<ChunkCoord, Chunk>,
    generator: G
}

impl<G: ChunkGenerator> ChunkStore<G> {
    pub fn new(generator: G) -> ChunkStore<G> {
        ChunkStore { chunks: HashMap::new(), generator }
    }

    /// Returns the chunk at `(chunk_x, chunk_y)`, generating it on first access.
    pub fn get_chunk(&mut self, chunk_x: i32, chunk_y: i32) -> &Chunk {
        self.get_chunk_mut(chunk_x, chunk_y)
    }

    fn get_chunk_mut(&mut self, chunk_x: i32, chunk_y: i32) -> &mut Chunk {
        let generator = &self.generator;
        self.chunks.entry((chunk_x, chunk_y)).or_insert_with(|| {
            debug!(chunk_x, chunk_y, "generating chunk");
            generator.generate_chunk(chunk_x, chunk_y)
        })
    }

    pub fn loaded_chunk(&self, chunk_x: i32, chunk_y: i32) -> Option<&Chunk> {
        self.chunks.get(&(chunk_x, chunk_y))
    }

    pub fn contains(&self, chunk_x: i32, chunk_y: i32) -> bool {
        self.chunks.contains_key(&(chunk_x, chunk_y))
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Writes a single tile. Returns false, touching nothing, when the tile
    /// lies outside the addressable chunk range.
    pub fn place(&mut self, world_x: i64, world_y: i64, block: BlockId) -> bool {
        match localize_coords_to_chunk(world_x, world_y) {
            Some((chunk_x, chunk_y, local_x, local_y)) => {
                self.get_chunk_mut(chunk_x, chunk_y).set_block(local_x, local_y, block)
            },
            None => false
        }
    }

    pub fn tile_at(&mut self, world_x: i64, world_y: i64) -> BlockId {
        match localize_coords_to_chunk(world_x, world_y) {
            Some((chunk_x, chunk_y, local_x, local_y)) => self
                .get_chunk(chunk_x, chunk_y)
                .get(local_x, local_y)
                .unwrap_or(BlockType::Air.id()),
            None => BlockType::Air.id()
        }
    }

    pub fn is_solid(&mut self, world_x: i64, world_y: i64, blocks: &BlockRegistry) -> bool {
        blocks.is_solid(self.tile_at(world_x, world_y))
    }
}

/// Splits a global tile coordinate into chunk coordinate and local offset.
/// `None` when the chunk coordinate does not fit an `i32`.
pub fn localize_coords_to_chunk(world_x: i64, world_y: i64) -> Option<(i32, i32, usize, usize)> {
    let size = CHUNK_SIZE as i64;
    let chunk_x = i32::try_from(world_x.div_euclid(size)).ok()?;
    let chunk_y = i32::try_from(world_y.div_euclid(size)).ok()?;
    let local_x = world_x.rem_euclid(size) as usize;
    let local_y = world_y.rem_euclid(size) as usize;
    Some((chunk_x, chunk_y, local_x, local_y))
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    struct CountingGenerator {
        inner: TerrainGenerator,
        calls: Cell<usize>
    }

    impl ChunkGenerator for CountingGenerator {
        fn generate_chunk(&self, cx: i32, cy: i32) -> Chunk {
            self.calls.set(self.calls.get() + 1);
            self.inner.generate_chunk(cx, cy)
        }
    }

    fn counting_store() -> ChunkStore<CountingGenerator> {
        ChunkStore::new(CountingGenerator { inner: TerrainGenerator::new(11), calls: Cell::new(0) })
    }

    #[test]
    fn chunks_are_generated_once() {
        let mut store = counting_store();
        for (cx, cy) in [(0, 0), (-1, 2), (40, -40)].iter() {
            let first = store.get_chunk(*cx, *cy).clone();
            let calls = store.generator().calls.get();
            assert!(store.contains(*cx, *cy));
            let second = store.get_chunk(*cx, *cy).clone();
            assert_eq!(store.generator().calls.get(), calls);
            assert_eq!(first, second);
            assert_eq!(second.rows().len(), CHUNK_SIZE);
            assert!(second.rows().iter().all(|row| row.len() == CHUNK_SIZE));
        }
        assert_eq!(store.generator().calls.get(), 3);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn localize_handles_negative_coordinates() {
        assert_eq!(localize_coords_to_chunk(0, 0), Some((0, 0, 0, 0)));
        assert_eq!(localize_coords_to_chunk(15, 16), Some((0, 1, 15, 0)));
        assert_eq!(localize_coords_to_chunk(-1, -16), Some((-1, -1, 15, 0)));
        assert_eq!(localize_coords_to_chunk(-17, 33), Some((-2, 2, 15, 1)));
        assert_eq!(localize_coords_to_chunk(i64::MAX, 0), None);
        assert_eq!(localize_coords_to_chunk(0, i64::MIN), None);
    }

    #[test]
    fn tile_at_matches_direct_chunk_indexing() {
        let mut store = ChunkStore::new(TerrainGenerator::new(2));
        for x in -40..40i64 {
            for y in (-20..40i64).step_by(3) {
                let tile = store.tile_at(x, y);
                let chunk = store.get_chunk(x.div_euclid(16) as i32, y.div_euclid(16) as i32);
                let direct = chunk.get(x.rem_euclid(16) as usize, y.rem_euclid(16) as usize);
                assert_eq!(Some(tile), direct);
            }
        }
        assert_eq!(store.tile_at(i64::MIN, i64::MAX), BlockType::Air.id());
    }

    #[test]
    fn place_then_read_back() {
        let mut store = counting_store();
        for (x, y) in [(10, 5), (-1, -1), (0, 200), (-33, 17)].iter() {
            assert!(store.place(*x, *y, BlockType::Obsidian.id()));
            assert_eq!(store.tile_at(*x, *y), BlockType::Obsidian.id());
        }
        // the neighbour of a placed tile keeps its generated value
        let before = store.generator().inner.generate_chunk(0, 0).get(11, 5);
        assert_eq!(Some(store.tile_at(11, 5)), before);
    }

    #[test]
    fn far_out_of_range_place_is_a_no_op() {
        let mut store = counting_store();
        assert!(!store.place(i64::MAX, 0, BlockType::Stone.id()));
        assert!(!store.place(0, i64::MIN, BlockType::Stone.id()));
        assert!(store.is_empty());
        assert_eq!(store.generator().calls.get(), 0);
    }

    #[test]
    fn solidity_comes_from_the_registry() {
        let mut store = ChunkStore::new(TerrainGenerator::new(2));
        let blocks = BlockRegistry::builtin();
        store.place(3, 3, BlockType::Air.id());
        store.place(4, 3, BlockType::Stone.id());
        assert!(!store.is_solid(3, 3, &blocks));
        assert!(store.is_solid(4, 3, &blocks));
    }
}
