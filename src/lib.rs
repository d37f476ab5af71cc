pub mod config;
pub mod logging;
pub mod net;
pub mod tilecraft;

/// Version this build reports during the handshake.
pub const GAME_VERSION: &str = env!("CARGO_PKG_VERSION");
