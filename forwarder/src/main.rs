use std::error::Error;
use std::sync::Arc;

use configuration::ForwarderConfiguration;
use pending_query_actor::ActorHandle;
use record_store::{FileStorage, RecordStore};
use resolution_engine::{EngineSettings, ResolutionEngine};
use tokio::net::UdpSocket;
use tracing_subscriber::EnvFilter;

mod cli_args;

use cli_args::CliArgs;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args: CliArgs = argh::from_env();
    let config: ForwarderConfiguration = configuration::get_config(args.config.clone())?;

    let mut settings = EngineSettings::new(args.upstream.unwrap_or(config.upstream.server_address));
    settings.forwarding_only = args.forwarding_only || config.cache.forwarding_only;
    settings.answer_ttl = config.cache.answer_ttl;
    settings.duplicate_policy = config.pending.duplicate_policy;

    let store = RecordStore::new(FileStorage::new(config.cache.storage_path.clone()));
    store.load_from_storage().await?;

    let bind_address = config.server.bind_address();
    let socket = UdpSocket::bind(bind_address).await?;

    tracing::info!(
        "listening on {}, upstream {}, forwarding only: {}, pid: {}",
        bind_address,
        settings.upstream,
        settings.forwarding_only,
        std::process::id()
    );

    let pending = ActorHandle::new(config.pending.timeout());
    let sweeper = pending.spawn_sweeper(config.pending.sweep_interval());

    let engine = Arc::new(ResolutionEngine::new(socket, store, pending, settings));
    let flusher = engine.spawn_store_flusher(config.pending.sweep_interval());

    tokio::select! {
        _ = engine.clone().run(config.transport.max_datagram_size) => {}
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("shutting down");
        }
    }

    sweeper.abort();
    flusher.abort();

    let unpersisted = engine.store().flush_unpersisted().await;
    if let Err(e) = unpersisted {
        tracing::error!("exiting with records not persisted: {}", e);
    }

    Ok(())
}
