use std::{
    io::{self, BufReader},
    net::{Shutdown, SocketAddr, TcpStream},
    sync::{atomic::{AtomicBool, Ordering}, Arc},
    thread,
    time::Duration
};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::debug;

use crate::tilecraft::player::SessionId;
use super::{error::NetError, event::{read_message, serialize_event}, events::Message, framing::{write_frame, FrameError}};

/// How much a peer may fall behind before it is dropped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutboxLimits {
    /// Frames queued but not yet written.
    pub capacity: usize,
    /// Longest a single socket write may block.
    pub write_timeout: Duration
}

impl Default for OutboxLimits {
    fn default() -> Self {
        OutboxLimits { capacity: 1024, write_timeout: Duration::from_secs(5) }
    }
}

enum Outgoing {
    Frame(Arc<[u8]>),
    Close
}

/// Write half of a connection. Sends only enqueue; a dedicated writer thread
/// owns the socket, so a slow peer never blocks the sender. Frames leave in
/// the order they were queued.
pub struct Outbox {
    id: SessionId,
    queue: Sender<Outgoing>,
    stream: TcpStream,
    closed: AtomicBool
}

impl Outbox {
    pub fn new(id: SessionId, stream: TcpStream, limits: OutboxLimits) -> io::Result<Outbox> {
        stream.set_write_timeout(Some(limits.write_timeout))?;
        let (queue, pending) = bounded(limits.capacity.max(1));
        let writer = stream.try_clone()?;
        thread::Builder::new()
            .name(format!("writer-{}", id))
            .spawn(move || write_loop(id, writer, pending))?;
        Ok(Outbox { id, queue, stream, closed: AtomicBool::new(false) })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn send(&self, message: &Message) -> Result<(), NetError> {
        let payload = serialize_event(message)?;
        self.send_payload(payload.into())
    }

    /// Queues an already serialized message, so broadcasts encode once.
    /// Fails with [`NetError::Backlogged`] when the peer is not keeping up.
    pub fn send_payload(&self, payload: Arc<[u8]>) -> Result<(), NetError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(FrameError::ConnectionClosed.into());
        }
        match self.queue.try_send(Outgoing::Frame(payload)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(NetError::Backlogged { session: self.id }),
            Err(TrySendError::Disconnected(_)) => Err(FrameError::ConnectionClosed.into())
        }
    }

    /// Flushes what is already queued, then closes the socket.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.queue.try_send(Outgoing::Close).is_err() {
            self.abort();
        }
    }

    /// Closes the socket now, dropping anything still queued.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.abort();
    }

    fn abort(&self) {
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            debug!(session = self.id, error = %e, "shutdown on closed socket");
        }
    }
}

fn write_loop(id: SessionId, mut stream: TcpStream, pending: Receiver<Outgoing>) {
    for outgoing in pending.iter() {
        match outgoing {
            Outgoing::Frame(payload) => {
                if let Err(e) = write_frame(&mut stream, &payload) {
                    debug!(session = id, error = %e, "write failed");
                    break;
                }
            },
            Outgoing::Close => break
        }
    }
    // a failed write may have left half a frame behind, so the stream is done
    if let Err(e) = stream.shutdown(Shutdown::Both) {
        debug!(session = id, error = %e, "shutdown on closed socket");
    }
}

// server side of one player connection
pub struct Client {
    pub id: SessionId,
    pub addr: SocketAddr,
    reader: BufReader<TcpStream>,
    outbox: Arc<Outbox>
}

impl Client {
    pub fn new(id: SessionId, stream: TcpStream, limits: OutboxLimits) -> io::Result<Client> {
        let addr = stream.peer_addr()?;
        stream.set_nodelay(true)?;
        let reader = BufReader::new(stream.try_clone()?);
        let outbox = Arc::new(Outbox::new(id, stream, limits)?);
        Ok(Client { id, addr, reader, outbox })
    }

    pub fn send(&self, message: &Message) -> Result<(), NetError> {
        self.outbox.send(message)
    }

    /// Blocks until the next message arrives, the connection ends or the
    /// read timeout passes.
    pub fn read(&mut self) -> Result<Message, NetError> {
        read_message(&mut self.reader)
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.reader.get_ref().set_read_timeout(timeout)
    }

    pub fn outbox(&self) -> Arc<Outbox> {
        self.outbox.clone()
    }

    pub fn close(&self) {
        self.outbox.close();
    }
}
