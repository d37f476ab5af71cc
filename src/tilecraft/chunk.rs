use serde::{Deserialize, Serialize};

use super::block_type::{BlockId, BlockType};

pub const CHUNK_SIZE: usize = 16;

pub type ChunkCoord = (i32, i32);

/// Square grid of tiles, indexed `tiles[local_y][local_x]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Chunk {
    tiles: [[BlockId; CHUNK_SIZE]; CHUNK_SIZE]
}

impl Chunk {
    pub fn air() -> Chunk {
        Chunk { tiles: [[BlockType::Air.id(); CHUNK_SIZE]; CHUNK_SIZE] }
    }

    pub fn get(&self, x: usize, y: usize) -> Option<BlockId> {
        self.tiles.get(y).and_then(|row| row.get(x)).copied()
    }

    // out of bounds writes are ignored
    pub fn set_block(&mut self, x: usize, y: usize, block: BlockId) -> bool {
        match self.tiles.get_mut(y).and_then(|row| row.get_mut(x)) {
            Some(tile) => {
                *tile = block;
                true
            },
            None => false
        }
    }

    pub fn is_air(&self, x: usize, y: usize) -> bool {
        self.get(x, y) == Some(BlockType::Air.id())
    }

    pub fn rows(&self) -> &[[BlockId; CHUNK_SIZE]; CHUNK_SIZE] {
        &self.tiles
    }
}

impl Default for Chunk {
    fn default() -> Self {
        Chunk::air()
    }
}
