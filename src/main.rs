use std::{path::PathBuf, process};

use clap::Parser;
use tracing::{error, info};

use tilecraft::{config::ServerConfig, logging::init_logging, net::Server};

/// Dedicated TileCraft server.
///
/// Command line values override settings loaded from `server.ron`.
#[derive(Parser, Debug)]
#[command(name = "tilecraft-server", version, about = "TileCraft multiplayer server")]
struct Args {
    /// Interface to listen on.
    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Directory holding server.ron.
    #[arg(long, default_value = ".")]
    config: PathBuf,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    log_level: Option<String>
}

impl Args {
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(ref host) = self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(ref level) = self.log_level {
            config.log_level = level.clone();
        }
    }
}

fn main() {
    let args = Args::parse();

    // the log level comes from the file, so logging starts after loading
    let mut config = match ServerConfig::load_or_create(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("could not load config from {}: {}", args.config.display(), e);
            process::exit(1);
        }
    };
    args.apply(&mut config);
    init_logging(&config.log_level);

    let server = match Server::bind(&config) {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "failed to start server");
            process::exit(1);
        }
    };
    info!(seed = config.world_seed, "world ready");

    if let Err(e) = server.run() {
        error!(error = %e, "server stopped");
        process::exit(1);
    }
}
