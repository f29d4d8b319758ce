// crates/idmesh-node/src/bin/idmesh-node.rs
// ============================================================================
// Module: idmesh Node Binary
// Description: Config-driven entry point for the platform node.
// Purpose: Load configuration, wire the server, and run the sweeper.
// Dependencies: idmesh-config, idmesh-node, tokio
// ============================================================================

//! ## Overview
//! Starts a platform node from `idmesh.toml` (or the path given as the first
//! argument / `IDMESH_CONFIG`). The sweeper runs alongside the platform API
//! for the lifetime of the process.

use std::env;
use std::path::PathBuf;

use idmesh_config::NodeConfig;
use idmesh_node::NodeServerError;
use idmesh_node::PlatformServer;
use idmesh_node::Sweeper;

#[tokio::main]
async fn main() -> Result<(), NodeServerError> {
    let path = env::args().nth(1).map(PathBuf::from);
    let config = NodeConfig::load(path.as_deref())
        .map_err(|err| NodeServerError::Config(err.to_string()))?;
    let interval_ms = config.sweeper.interval_ms;
    let server = PlatformServer::from_config(config)?;
    let sweeper = Sweeper::new(server.engine(), interval_ms);
    tokio::spawn(sweeper.run());
    server.serve().await
}
