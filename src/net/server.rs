use std::{io, net::{SocketAddr, TcpListener, TcpStream}, thread::{self, JoinHandle}, time::Instant};

use cgmath::Vector2;
use tracing::{debug, info, warn};

use crate::{config::ServerConfig, tilecraft::{block_type::BlockId, player::SessionId}};
use super::{client::Client, error::NetError, events::{Message, PlayerMap, PlayerView}, state::State};

/// Dedicated server: an accept loop, one read thread per connection and one
/// broadcaster thread for player snapshots.
pub struct Server {
    listener: TcpListener,
    state: State
}

impl Server {
    pub fn bind(config: &ServerConfig) -> Result<Server, NetError> {
        let addr = config.bind_addr();
        let listener = TcpListener::bind(&addr).map_err(|source| NetError::Bind { addr, source })?;
        Ok(Server { listener, state: State::new(config) })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Serves forever on the calling thread.
    pub fn run(self) -> Result<(), NetError> {
        spawn_broadcaster(self.state.clone())?;
        info!(addr = ?self.listener.local_addr().ok(), version = %self.state.version, "server listening");

        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    if let Err(e) = accept(stream, &self.state) {
                        warn!(error = %e, "failed to set up connection");
                    }
                },
                Err(e) => warn!(error = %e, "accept failed")
            }
        }
        Ok(())
    }

    /// Runs the server on a background thread.
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new().name("accept".to_string()).spawn(move || {
            if let Err(e) = self.run() {
                warn!(error = %e, "server stopped");
            }
        })
    }
}

fn accept(stream: TcpStream, state: &State) -> io::Result<()> {
    let id = state.sessions.register();
    let client = match Client::new(id, stream, state.limits) {
        Ok(client) => client,
        Err(e) => {
            state.sessions.remove(id);
            return Err(e);
        }
    };
    info!(session = id, addr = %client.addr, "connection accepted");

    let state = state.clone();
    let spawned = thread::Builder::new()
        .name(format!("session-{}", id))
        .spawn(move || create_read_thread(client, state));
    spawned.map(|_| ())
}

fn spawn_broadcaster(state: State) -> io::Result<JoinHandle<()>> {
    thread::Builder::new().name("broadcaster".to_string()).spawn(move || loop {
        thread::sleep(state.throttle.poll_period());
        if state.throttle.poll(Instant::now()) {
            broadcast_players(&state);
        }
    })
}

fn broadcast_players(state: &State) {
    let players: PlayerMap = state
        .sessions
        .snapshot()
        .iter()
        .map(|(id, player)| (*id, PlayerView::from(player)))
        .collect();
    let count = players.len();
    let delivered = state.clients.broadcast(&Message::PlayersUpdate { players });
    debug!(players = count, delivered, "players update broadcast");
}

fn create_read_thread(mut client: Client, state: State) {
    let id = client.id;
    match handshake(&mut client, &state) {
        Ok(true) => {
            state.clients.add(client.outbox());
            info!(session = id, "player joined");
            serve(&mut client, &state);
        },
        Ok(false) => {},
        Err(e) if e.is_disconnect() => debug!(session = id, "closed during handshake"),
        Err(e) => warn!(session = id, error = %e, "handshake failed")
    }

    state.clients.remove(id);
    state.sessions.remove(id);
    state.throttle.request();
    client.close();
    info!(session = id, "player left");
}

/// Returns false when the client was rejected.
fn handshake(client: &mut Client, state: &State) -> Result<bool, NetError> {
    client.send(&Message::SessionAssigned { session_id: client.id })?;

    client.set_read_timeout(Some(state.handshake_timeout))?;
    let rejection = match client.read() {
        Ok(Message::VersionCheck { version }) if *version == *state.version => None,
        Ok(Message::VersionCheck { version }) => Some(format!(
            "client version {} does not match server version {}",
            version, state.version
        )),
        Ok(other) => Some(format!("expected version_check, got {}", other.kind())),
        Err(NetError::Decode(e)) => Some(format!("expected version_check, got undecodable message: {}", e)),
        Err(e) if e.is_timeout() => Some("timed out waiting for version_check".to_string()),
        Err(e) => return Err(e)
    };

    if let Some(reason) = rejection {
        info!(session = client.id, %reason, "rejecting connection");
        client.send(&Message::ConnectionRejected { reason })?;
        return Ok(false);
    }
    client.set_read_timeout(None)?;

    client.send(&Message::VersionCheckOk)?;
    client.send(&Message::BlockDefinitions { blocks: (*state.blocks).clone() })?;
    client.send(&Message::ItemDefinitions { items: (*state.items).clone() })?;
    Ok(true)
}

fn serve(client: &mut Client, state: &State) {
    let id = client.id;
    loop {
        let message = match client.read() {
            Ok(message) => message,
            Err(e) if e.is_disconnect() => break,
            Err(e @ NetError::Decode(_)) => {
                warn!(session = id, error = %e, "malformed message, closing");
                break;
            },
            Err(e) => {
                debug!(session = id, error = %e, "read failed");
                break;
            }
        };

        match message {
            Message::PlayerUpdate { x, y, vel_x, vel_y, on_ground } => {
                state.sessions.update(id, Vector2::new(x, y), Vector2::new(vel_x, vel_y), on_ground);
                state.throttle.request();
            },
            Message::PlaceBlock { x, y, block_type } => place_block(id, state, x, y, block_type),
            Message::GetChunk { cx, cy } => {
                // queued under the world lock so no block_change for this
                // chunk can get ahead of it; the write happens elsewhere
                let mut world = state.world.lock();
                let data = world.get_chunk(cx, cy).clone();
                if let Err(e) = client.send(&Message::ChunkData { cx, cy, data }) {
                    warn!(session = id, error = %e, "chunk reply failed, closing");
                    break;
                }
            },
            Message::Disconnect => break,
            other => warn!(session = id, kind = other.kind(), "unexpected message from client")
        }
    }
}

fn place_block(id: SessionId, state: &State, x: i64, y: i64, block_type: BlockId) {
    if !state.blocks.contains_id(block_type) {
        warn!(session = id, block_type, "dropping placement of unknown block");
        return;
    }

    let mut world = state.world.lock();
    if !world.place(x, y, block_type) {
        warn!(session = id, x, y, "dropping placement outside the world");
        return;
    }
    debug!(session = id, x, y, block_type, "block placed");
    state.clients.broadcast(&Message::BlockChange { x, y, block_type });
}
