// world data: blocks, chunks, terrain generation and the chunk store
pub mod block_type;
pub mod chunk;
pub mod noise;
pub mod player;
pub mod terrain;
pub mod world;
