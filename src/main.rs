//! Attackgraph binary — feed alert logs or a TCP stream into the
//! correlation engine, optionally serve the visualizer API, and export the
//! resulting graphs on stop.

use anyhow::{Context, Result};
use attackgraph::engine::{CorrelationEngine, EngineConfig};
use attackgraph::http::HttpServer;
use attackgraph::ingest::ReaderKind;
use attackgraph::model::{IpAddress, RiskLevel};
use attackgraph::transport::Transport;
use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "attackgraph", version, about = "Streaming attack-graph correlation engine")]
struct Cli {
    /// Alert log file to replay (Suricata eve.json, Zeek JSON, or a native
    /// alert array)
    #[arg(long)]
    file: Option<PathBuf>,

    /// TCP address to listen on for streamed alerts
    #[arg(long)]
    listen: Option<String>,

    /// Address for the visualizer web interface
    #[arg(long)]
    server: Option<String>,

    /// Import previously exported graphs from a graphs.json file
    #[arg(long)]
    import: Option<PathBuf>,

    /// Input format
    #[arg(long, value_enum, default_value_t = ReaderKind::Json)]
    reader: ReaderKind,

    /// How alerts are delivered
    #[arg(long, value_enum, default_value_t = TransportKind::File)]
    transport: TransportKind,

    /// Graph exports written on stop
    #[arg(long, value_enum)]
    export: Vec<ExportFormat>,

    /// IP addresses of valuable assets to pre-seed with a high risk score
    #[arg(long = "valuable-assets")]
    valuable_assets: Vec<String>,

    /// Worker count per pipeline stage
    #[arg(long, default_value_t = 1)]
    workers: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TransportKind {
    File,
    Tcp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ExportFormat {
    Json,
    Dot,
}

async fn export_json(engine: &CorrelationEngine) -> Result<()> {
    let graphs = engine.export_graphs().await;
    let mut file = File::create("graphs.json").context("error creating file for export")?;
    let body = serde_json::to_vec_pretty(&graphs).context("error encoding JSON")?;
    file.write_all(&body).context("error writing JSON")?;
    info!(bytes = body.len(), "wrote graphs.json");
    Ok(())
}

async fn export_dot(engine: &CorrelationEngine) -> Result<()> {
    std::fs::create_dir_all("graphs")?;

    for (count, (id, dot)) in engine.export_dot(false).await.into_iter().enumerate() {
        let path = PathBuf::from("graphs").join(format!("{}-{}.dot", count, id));
        let mut file = File::create(&path)
            .with_context(|| format!("error creating {}", path.display()))?;
        file.write_all(dot.as_bytes())?;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let start_time = Instant::now();

    let engine = Arc::new(CorrelationEngine::new(EngineConfig {
        workers: cli.workers,
        ..EngineConfig::default()
    }));

    for address in &cli.valuable_assets {
        engine
            .set_host_risk(IpAddress::parse(address), RiskLevel::HIGH)
            .await;
    }

    if let Some(path) = &cli.import {
        match File::open(path) {
            Ok(file) => {
                if let Err(error) = engine.import_save(BufReader::new(file)).await {
                    warn!(%error, "could not load save");
                }
            }
            Err(error) => warn!(%error, path = %path.display(), "could not load save"),
        }
    }

    if let Some(listen_address) = cli.server.clone() {
        let server_engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let server = HttpServer::new(server_engine, listen_address);
            if let Err(error) = server.start().await {
                error!(%error, "visualizer server failed");
            }
        });
    }

    let transport = match cli.transport {
        TransportKind::File => cli.file.as_ref().map(|path| Transport::File {
            path: path.clone(),
        }),
        TransportKind::Tcp => cli.listen.as_ref().map(|listen_address| Transport::Tcp {
            listen_address: listen_address.clone(),
        }),
    };

    if let Some(transport) = transport {
        transport
            .run(Arc::clone(&engine), cli.reader)
            .await
            .context("error channeling alerts")?;
    }

    engine.shutdown().await;

    if cli.export.contains(&ExportFormat::Json) {
        if let Err(error) = export_json(&engine).await {
            error!(%error, "json export failed");
        }
    }

    if cli.export.contains(&ExportFormat::Dot) {
        if let Err(error) = export_dot(&engine).await {
            error!(%error, "dot export failed");
        }
    }

    info!(
        elapsed = ?start_time.elapsed(),
        graphs = engine.graph_list(-1).await.count,
        "done"
    );

    if cli.server.is_some() {
        // Keep serving the visualizer after ingestion finishes.
        std::future::pending::<()>().await;
    }

    Ok(())
}
