use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use tracing::warn;

use crate::tilecraft::player::SessionId;
use super::{client::Outbox, event::serialize_event, events::Message};

/// Connections that completed the handshake and receive broadcasts.
#[derive(Clone, Default)]
pub struct Clients {
    clients: Arc<Mutex<HashMap<SessionId, Arc<Outbox>>>>
}

impl Clients {
    pub fn new() -> Clients {
        Clients::default()
    }

    pub fn add(&self, outbox: Arc<Outbox>) {
        self.clients.lock().insert(outbox.id(), outbox);
    }

    pub fn remove(&self, id: SessionId) -> Option<Arc<Outbox>> {
        self.clients.lock().remove(&id)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.clients.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }

    fn outboxes(&self) -> Vec<Arc<Outbox>> {
        self.clients.lock().values().cloned().collect()
    }

    /// Queues the message for every client and returns how many took it.
    /// A client that cannot take it would miss the update for good, so it is
    /// disconnected and its read thread runs the usual cleanup.
    pub fn broadcast(&self, message: &Message) -> usize {
        let payload: Arc<[u8]> = match serialize_event(message) {
            Ok(payload) => payload.into(),
            Err(e) => {
                warn!(kind = message.kind(), error = %e, "failed to encode broadcast");
                return 0;
            }
        };

        let mut queued = 0;
        for outbox in self.outboxes() {
            match outbox.send_payload(payload.clone()) {
                Ok(()) => queued += 1,
                Err(e) => {
                    warn!(session = outbox.id(), kind = message.kind(), error = %e, "dropping client that missed a broadcast");
                    outbox.shutdown();
                    self.remove(outbox.id());
                }
            }
        }
        queued
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::{self, Read},
        net::{TcpListener, TcpStream},
        time::Duration
    };

    use super::*;
    use crate::{net::client::OutboxLimits, tilecraft::chunk::Chunk};

    #[test]
    fn stalled_client_is_dropped_from_broadcasts() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut stalled = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server_side, _) = listener.accept().unwrap();

        let clients = Clients::new();
        let limits = OutboxLimits { capacity: 4, write_timeout: Duration::from_millis(200) };
        clients.add(Arc::new(Outbox::new(1, server_side, limits).unwrap()));

        let message = Message::ChunkData { cx: 0, cy: 0, data: Chunk::air() };
        let mut sent = 0;
        while clients.contains(1) && sent < 200_000 {
            clients.broadcast(&message);
            sent += 1;
        }
        assert!(clients.is_empty(), "peer still subscribed after {} broadcasts", sent);

        // the socket is closed rather than left open with frames missing
        stalled.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let mut received = Vec::new();
        let drained = stalled.read_to_end(&mut received);
        assert!(!matches!(drained, Err(ref e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut));
    }

    #[test]
    fn broadcast_reaches_every_client() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let clients = Clients::new();
        let mut peers = Vec::new();
        for id in 1..=3 {
            let peer = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
            let (server_side, _) = listener.accept().unwrap();
            clients.add(Arc::new(Outbox::new(id, server_side, OutboxLimits::default()).unwrap()));
            peer.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
            peers.push(peer);
        }

        let message = Message::BlockChange { x: 10, y: 5, block_type: 2 };
        assert_eq!(clients.broadcast(&message), 3);
        for peer in peers.iter_mut() {
            assert_eq!(crate::net::event::read_message(peer).unwrap(), message);
        }
        assert_eq!(clients.len(), 3);
    }
}
