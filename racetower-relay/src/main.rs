//! Race tower relay.
//!
//! Binds `HOSTNAME:PORT` (default `127.0.0.1:3000`) and re-broadcasts every
//! `update_positions` event to all other connected towers.
//!
//! ```text
//! HOSTNAME=0.0.0.0 PORT=3000 RUST_LOG=info racetower-relay
//! ```

use log::{error, info};
use racetower_collab::server::{RelayConfig, RelayServer};

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = RelayConfig::from_env();
    info!(
        "Starting relay on ws://{} (max {} peers)",
        config.bind_addr, config.max_peers
    );

    let server = RelayServer::new(config);
    if let Err(e) = server.run().await {
        error!("Relay stopped: {e}");
        std::process::exit(1);
    }
}
