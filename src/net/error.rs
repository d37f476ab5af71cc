use std::io;

use crate::tilecraft::player::SessionId;
use super::framing::FrameError;

#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("could not connect to {addr}: {source}")]
    Connect { addr: String, #[source] source: io::Error },

    #[error("could not bind {addr}: {source}")]
    Bind { addr: String, #[source] source: io::Error },

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("connection rejected: {reason}")]
    Rejected { reason: String },

    #[error("outbound queue for session {session} is full")]
    Backlogged { session: SessionId },

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error)
}

impl NetError {
    /// The peer went away, cleanly or mid-frame.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, NetError::Frame(FrameError::ConnectionClosed))
    }

    /// A read timeout fired before a whole frame arrived.
    pub fn is_timeout(&self) -> bool {
        match self {
            NetError::Frame(FrameError::Io(e)) | NetError::Io(e) => {
                matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
            },
            _ => false
        }
    }
}
