use std::{io, net::{TcpStream, ToSocketAddrs}, sync::Arc, time::Instant};

use tracing::{debug, info};

use crate::{config::ClientConfig, tilecraft::{block_type::{BlockRegistry, ItemRegistry}, player::SessionId}};
use super::{client::{Outbox, OutboxLimits}, error::NetError, event::deserialize_event, events::Message, framing::FrameReader};

/// Client end of a connection that completed the handshake.
pub struct Connection {
    pub session_id: SessionId,
    pub blocks: BlockRegistry,
    pub items: ItemRegistry,
    reader: FrameReader<TcpStream>,
    outbox: Arc<Outbox>
}

impl Connection {
    /// Connects to `addr` and runs the handshake. Returns
    /// [`NetError::Rejected`] when the server refuses our version.
    pub fn connect(addr: &str, config: &ClientConfig) -> Result<Connection, NetError> {
        let stream = open_stream(addr, config)?;
        stream.set_nodelay(true)?;
        // the handshake as a whole must finish within the connect timeout
        stream.set_read_timeout(Some(config.connect_timeout()))?;
        let deadline = Instant::now() + config.connect_timeout();

        let mut reader = FrameReader::new(stream.try_clone()?);
        let session_id = match recv_before(&mut reader, deadline)? {
            Message::SessionAssigned { session_id } => session_id,
            other => return Err(unexpected("session_assigned", &other))
        };
        let outbox = Arc::new(Outbox::new(session_id, stream, OutboxLimits::default())?);

        outbox.send(&Message::VersionCheck { version: config.version.clone() })?;
        match recv_before(&mut reader, deadline)? {
            Message::VersionCheckOk => {},
            Message::ConnectionRejected { reason } => {
                outbox.shutdown();
                return Err(NetError::Rejected { reason });
            },
            other => return Err(unexpected("version_check_ok", &other))
        }

        let mut blocks = None;
        let mut items = None;
        while blocks.is_none() || items.is_none() {
            match recv_before(&mut reader, deadline)? {
                Message::BlockDefinitions { blocks: defs } if blocks.is_none() => blocks = Some(defs),
                Message::ItemDefinitions { items: defs } if items.is_none() => items = Some(defs),
                other => return Err(unexpected("definitions", &other))
            }
        }
        let (blocks, items) = match (blocks, items) {
            (Some(blocks), Some(items)) => (blocks, items),
            _ => return Err(NetError::Handshake("definitions missing".to_string()))
        };

        reader.get_ref().set_read_timeout(Some(config.read_timeout()))?;
        info!(session = session_id, addr, blocks = blocks.len(), items = items.len(), "connected");
        Ok(Connection { session_id, blocks, items, reader, outbox })
    }

    pub fn outbox(&self) -> Arc<Outbox> {
        self.outbox.clone()
    }

    pub fn send(&self, message: &Message) -> Result<(), NetError> {
        self.outbox.send(message)
    }

    /// Next message, or `None` if the read timeout passed first.
    pub fn poll(&mut self) -> Result<Option<Message>, NetError> {
        match self.reader.poll_frame()? {
            Some(payload) => deserialize_event(&payload).map(Some),
            None => Ok(None)
        }
    }
}

fn open_stream(addr: &str, config: &ClientConfig) -> Result<TcpStream, NetError> {
    let connect_error = |source| NetError::Connect { addr: addr.to_string(), source };
    let candidates = addr.to_socket_addrs().map_err(connect_error)?;

    let mut last_error = io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing");
    for candidate in candidates {
        match TcpStream::connect_timeout(&candidate, config.connect_timeout()) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!(%candidate, error = %e, "connect attempt failed");
                last_error = e;
            }
        }
    }
    Err(connect_error(last_error))
}

fn recv_before(reader: &mut FrameReader<TcpStream>, deadline: Instant) -> Result<Message, NetError> {
    loop {
        if let Some(payload) = reader.poll_frame()? {
            return deserialize_event(&payload);
        }
        if Instant::now() >= deadline {
            return Err(NetError::Handshake("timed out waiting for the server".to_string()));
        }
    }
}

fn unexpected(expected: &str, got: &Message) -> NetError {
    NetError::Handshake(format!("expected {}, got {}", expected, got.kind()))
}
