use anyhow::Result;
use axum::Router;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use termspread::persist::{load_store, SnapshotPaths};
use termspread::MemoryStore;
use tracing_subscriber::{fmt, EnvFilter};
use server::build_app;
use tokio::net::TcpListener;

#[derive(Parser)]
struct Args {
    /// Store directory written by `indexer build`; starts empty when omitted
    #[arg(long)]
    data: Option<String>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let store = match &args.data {
        Some(dir) => MemoryStore::from_snapshot(load_store(&SnapshotPaths::new(dir))?),
        None => MemoryStore::new(),
    };
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    if admin_token.is_none() {
        tracing::warn!("ADMIN_TOKEN not set; write routes will reject every request");
    }
    let app: Router = build_app(Arc::new(store), admin_token);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
