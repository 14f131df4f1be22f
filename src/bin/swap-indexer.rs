use std::sync::Arc;

use anyhow::Context;
use log::{error, info};
use sol_swap_indexer::grpc::{all_swap_program_ids, TransactionFilter, YellowstoneGrpc};
use sol_swap_indexer::{
    FallbackSpool, IndexerConfig, JsonlStore, PipelineSettings, PriceResolver, RpcAccountReader,
    SwapPipeline,
};
use tokio::sync::{mpsc, watch};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = IndexerConfig::from_env().context("invalid configuration")?;
    info!(
        "starting swap indexer: grpc={} rpc={} reference={} output={}",
        config.grpc_endpoint, config.rpc_url, config.reference_mint, config.output_path
    );

    let reader = Arc::new(
        RpcAccountReader::new(config.rpc_url.clone()).with_mint_cache_capacity(config.mint_cache_capacity),
    );
    let resolver = PriceResolver::new(reader, config.resolver_config()?);
    let store = Arc::new(
        JsonlStore::open(&config.output_path)
            .await
            .with_context(|| format!("cannot open {}", config.output_path))?,
    );
    let pipeline = SwapPipeline::new(resolver, store, PipelineSettings::from(&config))
        .with_spool(FallbackSpool::new(&config.fallback_path));

    let client_config = config.client_config();
    let (notification_tx, notification_rx) = mpsc::channel(client_config.buffer_size);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let grpc = YellowstoneGrpc::new_with_config(
        config.grpc_endpoint.clone(),
        config.grpc_x_token.clone(),
        client_config,
    );
    let filter = TransactionFilter::from_program_ids(all_swap_program_ids());
    let subscription = tokio::spawn(async move {
        grpc.subscribe_transactions(filter, notification_tx, shutdown_rx).await;
    });
    let running = tokio::spawn(pipeline.run(notification_rx));

    tokio::signal::ctrl_c().await.context("cannot listen for ctrl-c")?;
    info!("shutdown requested");
    let _ = shutdown_tx.send(true);

    if let Err(e) = subscription.await {
        error!("subscription task failed: {}", e);
    }
    let stats = running.await.context("pipeline task failed")?;
    info!(
        "done: {} notifications, {} swaps, {} prices",
        stats.notifications, stats.swaps, stats.prices
    );
    Ok(())
}
