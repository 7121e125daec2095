//! Alert delivery
//!
//! Transports move raw alert bytes to the configured reader: a one-shot
//! file replay, or a TCP listener that feeds each connection through the
//! reader. The engine only ever sees normalized [`crate::model::Alert`]
//! records.

use crate::engine::CorrelationEngine;
use crate::ingest::ReaderKind;
use anyhow::{Context, Result};
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader as AsyncBufReader};
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Where alert bytes come from.
#[derive(Debug, Clone)]
pub enum Transport {
    /// Replay a log file once.
    File { path: PathBuf },
    /// Accept connections and stream newline-delimited records from each.
    Tcp { listen_address: String },
}

impl Transport {
    /// Run the transport to completion. File replay returns once the file
    /// is consumed; the TCP listener runs until the accept loop fails.
    pub async fn run(&self, engine: Arc<CorrelationEngine>, reader: ReaderKind) -> Result<()> {
        match self {
            Transport::File { path } => {
                let path = path.clone();
                info!(path = %path.display(), "replaying alert file");

                // The readers are synchronous; keep the replay off the
                // async workers so the pipeline stays fed.
                tokio::task::spawn_blocking(move || -> Result<()> {
                    let file = std::fs::File::open(&path)
                        .with_context(|| format!("could not open {}", path.display()))?;
                    reader.channel_alerts(&engine, BufReader::new(file))
                })
                .await
                .context("file replay task failed")?
            }
            Transport::Tcp { listen_address } => {
                let listener = TcpListener::bind(listen_address)
                    .await
                    .with_context(|| format!("could not listen on {}", listen_address))?;
                info!(address = %listen_address, "listening for alert streams");

                loop {
                    let (stream, peer) = listener.accept().await?;
                    let engine = Arc::clone(&engine);

                    tokio::spawn(async move {
                        let mut lines = AsyncBufReader::new(stream).lines();
                        loop {
                            match lines.next_line().await {
                                Ok(Some(line)) => {
                                    if let Some(alert) = reader.parse_line(&line) {
                                        if let Err(error) = engine.submit(alert) {
                                            warn!(%error, %peer, "dropping connection");
                                            break;
                                        }
                                    }
                                }
                                Ok(None) => break,
                                Err(error) => {
                                    warn!(%error, %peer, "error reading alert stream");
                                    break;
                                }
                            }
                        }
                    });
                }
            }
        }
    }
}
