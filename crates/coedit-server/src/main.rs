//! # coedit Server
//!
//! Sequencing server for collaborative document rooms.
//!
//! ## Architecture
//!
//! Three kinds of tasks cooperate:
//! 1. **Accept loop**: owns the TCP listener and spawns connection tasks
//! 2. **Connection tasks**: parse newline-delimited JSON into hub commands
//!    and drain server messages back to the socket
//! 3. **Hub**: the single task owning every room — the per-document
//!    sequencing authority that rebases, applies, acks, and broadcasts
//!
//! Documents are seeded from SQLite when a room opens and snapshotted back
//! after every accepted operation.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

mod config;
mod hub;
mod persistence;
mod room;
mod runtime;

pub use config::ServerConfig;
pub use runtime::Server;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting coedit server");

    let config = ServerConfig::from_env()?;
    let server = Server::new(config);

    server.run().await?;

    Ok(())
}
