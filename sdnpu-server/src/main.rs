use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use sdnpu_core::{select_device, PipelineCache, PreviewLoader};
use sdnpu_server::{config::Args, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_logging(&args.log_level);

    let device = select_device(args.device_map());
    let cache = Arc::new(PipelineCache::new(PreviewLoader, device, args.cache_config()));

    if let Some(model) = args.preload.clone() {
        sdnpu_server::preload(cache.clone(), model);
    }

    // A listener that fails to start is logged, the host itself keeps running.
    let listener = sdnpu_server::start(args.server_config(), cache);
    match listener.ready().await {
        Ok(addr) => tracing::info!(%addr, "serving until interrupted"),
        Err(e) => tracing::error!("API server unavailable: {e}"),
    }

    // Neither the listener nor the preload thread is joined; returning from main ends them.
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    Ok(())
}
