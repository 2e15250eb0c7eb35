//! Server runtime: the TCP accept loop and per-connection tasks.
//!
//! Clients speak newline-delimited JSON. Each connection gets a reader task
//! (parsing lines into hub commands) and a writer task (draining the
//! client's message channel back onto the socket). Malformed lines are
//! dropped with a warning; the engine never sees them.

use crate::config::ServerConfig;
use crate::hub::{Hub, HubCommand};
use crate::persistence::SqliteStore;
use anyhow::{Context, Result};
use coedit_proto::{ClientMessage, ServerMessage};
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use uuid::Uuid;

/// The coedit server.
pub struct Server {
    config: ServerConfig,
}

impl Server {
    /// Create a server from configuration.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Run until ctrl-c.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be opened or the listener cannot
    /// bind.
    pub async fn run(self) -> Result<()> {
        let store = match self.config.persistence.store_type.as_str() {
            "memory" => Some(
                SqliteStore::in_memory().context("Failed to open in-memory database")?,
            ),
            _ => Some(
                SqliteStore::open(&self.config.persistence.db_path)
                    .context("Failed to open SQLite database")?,
            ),
        };

        let (hub_tx, hub_rx) = mpsc::channel::<HubCommand>(256);
        tokio::spawn(Hub::new(store).run(hub_rx));

        let listener = TcpListener::bind(&self.config.listen_addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.config.listen_addr))?;
        tracing::info!(addr = %self.config.listen_addr, "listening for connections");

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            tokio::spawn(handle_connection(stream, peer, hub_tx.clone()));
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                        }
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, hub: mpsc::Sender<HubCommand>) {
    tracing::debug!(%peer, "connection opened");
    let (read_half, mut write_half) = stream.into_split();

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let line = match msg.to_json() {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to encode server message");
                    continue;
                }
            };
            if write_half.write_all(line.as_bytes()).await.is_err()
                || write_half.write_all(b"\n").await.is_err()
            {
                break;
            }
        }
    });

    let mut lines = BufReader::new(read_half).lines();
    let mut connected_client: Option<Uuid> = None;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(%peer, error = %e, "read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let msg = match ClientMessage::from_json(&line) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(%peer, error = %e, "dropping malformed message");
                continue;
            }
        };

        let command = match msg {
            ClientMessage::Join {
                document_id,
                client_id,
            } => {
                connected_client = Some(client_id);
                HubCommand::Join {
                    document_id,
                    client_id,
                    sender: tx.clone(),
                }
            }
            ClientMessage::Operation {
                document_id,
                client_id,
                version,
                operation,
            } => HubCommand::Operation {
                document_id,
                client_id,
                version,
                operation,
            },
            ClientMessage::Cursor {
                document_id,
                client_id,
                cursor,
            } => HubCommand::Cursor {
                document_id,
                client_id,
                cursor,
            },
        };

        if hub.send(command).await.is_err() {
            break;
        }
    }

    if let Some(client_id) = connected_client {
        let _ = hub.send(HubCommand::Leave { client_id }).await;
    }
    writer.abort();
    tracing::debug!(%peer, "connection closed");
}
