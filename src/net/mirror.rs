//! Client-side partial replica of the world.
//!
//! A [`ClientMirror`] holds whatever chunks the client has fetched plus the
//! latest snapshot of all players. Online, missing chunks are requested from
//! the server and an all-air placeholder is returned until `chunk_data`
//! arrives; offline, chunks are generated locally with the same terrain
//! generator the server uses.

use std::{
    collections::{HashMap, HashSet},
    sync::{atomic::{AtomicBool, Ordering}, Arc},
    thread::{self, JoinHandle}
};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::{
    config::ClientConfig,
    tilecraft::{
        block_type::{BlockId, BlockRegistry, BlockType, ItemRegistry},
        chunk::{Chunk, ChunkCoord},
        player::{PlayerState, SessionId},
        terrain::{ChunkGenerator, TerrainGenerator},
        world::localize_coords_to_chunk
    }
};
use super::{client::Outbox, connection::Connection, error::NetError, events::{Message, PlayerMap}};

enum Link {
    Online(Arc<Outbox>),
    Offline(TerrainGenerator)
}

pub struct ClientMirror {
    session_id: Option<SessionId>,
    blocks: BlockRegistry,
    items: ItemRegistry,
    chunks: RwLock<HashMap<ChunkCoord, Chunk>>,
    requested: Mutex<HashSet<ChunkCoord>>,
    players: RwLock<Arc<PlayerMap>>,
    link: Link,
    shutdown: AtomicBool
}

impl ClientMirror {
    /// Mirror for a connection that completed the handshake.
    pub fn online(connection: &Connection) -> ClientMirror {
        ClientMirror::with_link(
            Some(connection.session_id),
            connection.blocks.clone(),
            connection.items.clone(),
            Link::Online(connection.outbox())
        )
    }

    /// Single player mirror that generates its own terrain.
    pub fn offline(seed: u64) -> ClientMirror {
        ClientMirror::with_link(
            None,
            BlockRegistry::builtin(),
            ItemRegistry::builtin(),
            Link::Offline(TerrainGenerator::new(seed))
        )
    }

    fn with_link(session_id: Option<SessionId>, blocks: BlockRegistry, items: ItemRegistry, link: Link) -> ClientMirror {
        ClientMirror {
            session_id,
            blocks,
            items,
            chunks: RwLock::new(HashMap::new()),
            requested: Mutex::new(HashSet::new()),
            players: RwLock::new(Arc::new(PlayerMap::new())),
            link,
            shutdown: AtomicBool::new(false)
        }
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    pub fn is_online(&self) -> bool {
        matches!(self.link, Link::Online(_))
    }

    pub fn blocks(&self) -> &BlockRegistry {
        &self.blocks
    }

    pub fn items(&self) -> &ItemRegistry {
        &self.items
    }

    pub fn is_loaded(&self, chunk_x: i32, chunk_y: i32) -> bool {
        self.chunks.read().contains_key(&(chunk_x, chunk_y))
    }

    pub fn loaded_count(&self) -> usize {
        self.chunks.read().len()
    }

    /// Returns a copy of the chunk. Online, a chunk that has not arrived yet
    /// is requested once and reads as air in the meantime.
    pub fn get_chunk(&self, chunk_x: i32, chunk_y: i32) -> Chunk {
        if let Some(chunk) = self.chunks.read().get(&(chunk_x, chunk_y)) {
            return chunk.clone();
        }

        match &self.link {
            Link::Offline(generator) => {
                let chunk = generator.generate_chunk(chunk_x, chunk_y);
                self.chunks.write().entry((chunk_x, chunk_y)).or_insert(chunk).clone()
            },
            Link::Online(outbox) => {
                self.request_chunk(outbox, chunk_x, chunk_y);
                Chunk::air()
            }
        }
    }

    fn request_chunk(&self, outbox: &Outbox, chunk_x: i32, chunk_y: i32) {
        if !self.requested.lock().insert((chunk_x, chunk_y)) {
            return;
        }
        debug!(chunk_x, chunk_y, "requesting chunk");
        if let Err(e) = outbox.send(&Message::GetChunk { cx: chunk_x, cy: chunk_y }) {
            // allow a retry on the next access
            self.requested.lock().remove(&(chunk_x, chunk_y));
            debug!(chunk_x, chunk_y, error = %e, "chunk request failed");
        }
    }

    pub fn tile_at(&self, world_x: i64, world_y: i64) -> BlockId {
        let air = BlockType::Air.id();
        let (chunk_x, chunk_y, local_x, local_y) = match localize_coords_to_chunk(world_x, world_y) {
            Some(coords) => coords,
            None => return air
        };
        if let Some(chunk) = self.chunks.read().get(&(chunk_x, chunk_y)) {
            return chunk.get(local_x, local_y).unwrap_or(air);
        }
        self.get_chunk(chunk_x, chunk_y).get(local_x, local_y).unwrap_or(air)
    }

    pub fn is_solid(&self, world_x: i64, world_y: i64) -> bool {
        self.blocks.is_solid(self.tile_at(world_x, world_y))
    }

    /// Loads or requests every chunk within `radius` chunks of the centre.
    pub fn preload_around(&self, chunk_x: i32, chunk_y: i32, radius: i32) {
        let radius = radius.max(0);
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if let (Some(x), Some(y)) = (chunk_x.checked_add(dx), chunk_y.checked_add(dy)) {
                    self.get_chunk(x, y);
                }
            }
        }
    }

    /// Online the placement goes to the server and shows up once the
    /// matching `block_change` comes back. Offline it is applied directly.
    pub fn place_block(&self, world_x: i64, world_y: i64, block: BlockId) -> Result<(), NetError> {
        match &self.link {
            Link::Online(outbox) => outbox.send(&Message::PlaceBlock { x: world_x, y: world_y, block_type: block }),
            Link::Offline(_) => {
                if let Some((chunk_x, chunk_y, local_x, local_y)) = localize_coords_to_chunk(world_x, world_y) {
                    self.get_chunk(chunk_x, chunk_y);
                    if let Some(chunk) = self.chunks.write().get_mut(&(chunk_x, chunk_y)) {
                        chunk.set_block(local_x, local_y, block);
                    }
                }
                Ok(())
            }
        }
    }

    pub fn send_player_update(&self, player: &PlayerState) -> Result<(), NetError> {
        match &self.link {
            Link::Online(outbox) => outbox.send(&Message::player_update(player)),
            Link::Offline(_) => Ok(())
        }
    }

    /// Latest snapshot of every connected player, ourselves included.
    pub fn players(&self) -> Arc<PlayerMap> {
        self.players.read().clone()
    }

    /// Applies one server message to the mirror.
    pub fn apply(&self, message: Message) {
        match message {
            Message::ChunkData { cx, cy, data } => {
                self.chunks.write().insert((cx, cy), data);
                self.requested.lock().remove(&(cx, cy));
            },
            Message::BlockChange { x, y, block_type } => {
                if let Some((chunk_x, chunk_y, local_x, local_y)) = localize_coords_to_chunk(x, y) {
                    // unloaded chunks pick the change up when they are fetched
                    if let Some(chunk) = self.chunks.write().get_mut(&(chunk_x, chunk_y)) {
                        chunk.set_block(local_x, local_y, block_type);
                    }
                }
            },
            Message::PlayersUpdate { players } => {
                *self.players.write() = Arc::new(players);
            },
            other => warn!(kind = other.kind(), "ignoring unexpected message from server")
        }
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Leaves the server. Safe to call more than once.
    pub fn disconnect(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Link::Online(outbox) = &self.link {
            if let Err(e) = outbox.send(&Message::Disconnect) {
                debug!(error = %e, "disconnect notice not delivered");
            }
            outbox.close();
        }
    }
}

/// An online mirror plus the thread that keeps it up to date.
pub struct ClientSession {
    mirror: Arc<ClientMirror>,
    receiver: Option<JoinHandle<()>>
}

impl ClientSession {
    pub fn connect(addr: &str, config: &ClientConfig) -> Result<ClientSession, NetError> {
        let connection = Connection::connect(addr, config)?;
        let session = ClientSession::start(connection)?;
        let (spawn_x, spawn_y) = PlayerState::new(session.mirror.session_id().unwrap_or_default()).center_tile();
        if let Some((chunk_x, chunk_y, _, _)) = localize_coords_to_chunk(spawn_x, spawn_y) {
            session.mirror.preload_around(chunk_x, chunk_y, config.preload_radius);
        }
        Ok(session)
    }

    /// Spawns the receive loop for an established connection.
    pub fn start(connection: Connection) -> Result<ClientSession, NetError> {
        let mirror = Arc::new(ClientMirror::online(&connection));
        let loop_mirror = mirror.clone();
        let receiver = thread::Builder::new()
            .name(format!("receive-{}", connection.session_id))
            .spawn(move || receive_loop(connection, loop_mirror))?;
        Ok(ClientSession { mirror, receiver: Some(receiver) })
    }

    pub fn mirror(&self) -> &Arc<ClientMirror> {
        &self.mirror
    }

    pub fn disconnect(&mut self) {
        self.mirror.disconnect();
        if let Some(receiver) = self.receiver.take() {
            if receiver.join().is_err() {
                warn!("receive thread panicked");
            }
        }
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn receive_loop(mut connection: Connection, mirror: Arc<ClientMirror>) {
    while !mirror.is_shutdown() {
        match connection.poll() {
            Ok(Some(message)) => mirror.apply(message),
            Ok(None) => {},
            Err(e @ NetError::Decode(_)) => warn!(error = %e, "skipping undecodable message"),
            Err(e) if e.is_disconnect() => {
                info!("server closed the connection");
                break;
            },
            Err(e) => {
                if !mirror.is_shutdown() {
                    warn!(error = %e, "receive failed");
                }
                break;
            }
        }
    }
    mirror.request_shutdown();
}
