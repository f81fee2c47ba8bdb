use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use cellflow_core::document::{CreateDocument, DocumentStatus};
use cellflow_server::store::Store;
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cellflow-server")]
struct Cli {
    /// Seed the store with a document imported from a CSV file
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Moderation status for the seeded document (open, request_only, locked)
    #[arg(long, default_value = "open")]
    seed_status: String,
}

fn read_csv_rows(path: &PathBuf) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let store = Store::new();

    if let Some(path) = &cli.seed {
        let status = DocumentStatus::from_str(&cli.seed_status)
            .with_context(|| format!("unknown seed status: {}", cli.seed_status))?;
        let rows = read_csv_rows(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "seed".to_string());
        let document = store.create_document(&CreateDocument { name, status, rows });
        tracing::info!(id = %document.id, "seeded document from {}", path.display());
    }

    let bind = std::env::var("CELLFLOW_BIND").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("CELLFLOW_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(4810);
    let addr = SocketAddr::new(bind.parse()?, port);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("cellflow-server listening on http://{addr}");

    cellflow_server::serve(listener, store).await
}
