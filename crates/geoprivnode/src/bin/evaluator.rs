// geoprivnode/src/bin/evaluator.rs
// Geofence holder: serves /calculate and /calculate_rotated over HTTP.
// Only ever sees the client's public key and ciphertexts.

use anyhow::Result;
use clap::Parser;
use geoprivalgo::{FenceSet, LocalEvaluator, ProtocolConfig};
use geoprivnode::{init_tracing, serve, DEFAULT_LISTEN};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::net::TcpListener;

#[derive(Debug, Parser)]
struct Opt {
    /// Listen address
    #[arg(long, env = "GEOPRIV_LISTEN", default_value = DEFAULT_LISTEN)]
    listen: SocketAddr,

    /// Fence JSON: { "axis_aligned": {..}, "rotated": {..} }; defaults to Colorado
    #[arg(long)]
    fence: Option<PathBuf>,

    #[arg(long, env = "GEOPRIV_LOG", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let opt = Opt::parse();
    init_tracing(&opt.log_level);

    let fences = match &opt.fence {
        Some(path) => FenceSet::load(path)?,
        None => FenceSet::colorado(),
    };
    let evaluator = Arc::new(LocalEvaluator::new(&fences, &ProtocolConfig::default())?);

    let listener = TcpListener::bind(opt.listen).await?;
    tracing::info!("geofence evaluator listening on http://{}", listener.local_addr()?);

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install ctrl-c handler: {}", err);
        }
    };
    serve(listener, evaluator, shutdown).await?;
    tracing::info!("evaluator stopped");
    Ok(())
}
