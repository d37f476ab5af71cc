use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;

use crate::{config::ServerConfig, tilecraft::{block_type::{BlockRegistry, ItemRegistry}, terrain::TerrainGenerator, world::ChunkStore}};

use super::{client::OutboxLimits, clients::Clients, sessions::SessionRegistry, throttle::BroadcastThrottle};

// struct for organizing server state
// for each read thread
#[derive(Clone)]
pub struct State {
    pub world: Arc<Mutex<ChunkStore>>,
    pub sessions: Arc<SessionRegistry>,
    pub clients: Clients,
    pub throttle: Arc<BroadcastThrottle>,
    pub blocks: Arc<BlockRegistry>,
    pub items: Arc<ItemRegistry>,
    pub version: Arc<str>,
    pub limits: OutboxLimits,
    pub handshake_timeout: Duration
}

impl State {
    pub fn new(config: &ServerConfig) -> State {
        let world = ChunkStore::new(TerrainGenerator::new(config.world_seed));
        State {
            world: Arc::new(Mutex::new(world)),
            sessions: Arc::new(SessionRegistry::new()),
            clients: Clients::new(),
            throttle: Arc::new(BroadcastThrottle::new(config.broadcast_interval())),
            blocks: Arc::new(BlockRegistry::builtin()),
            items: Arc::new(ItemRegistry::builtin()),
            version: Arc::from(config.version.as_str()),
            limits: config.outbox_limits(),
            handshake_timeout: config.handshake_timeout()
        }
    }
}
