//! Replication protocol: framing, messages, the server and the client mirror.

pub mod client;
pub mod clients;
pub mod connection;
pub mod error;
pub mod event;
pub mod events;
pub mod framing;
pub mod mirror;
pub mod server;
pub mod sessions;
pub mod state;
pub mod throttle;

pub use connection::Connection;
pub use error::NetError;
pub use events::{Message, PlayerMap, PlayerView};
pub use mirror::{ClientMirror, ClientSession};
pub use server::Server;
