use fragment_relay::config::RelayConfig;
use fragment_relay::dispatch::handlers::dispatch_router;
use fragment_relay::forward::HttpForwarder;
use fragment_relay::reassembly::{Reassembler, Reconciler};
use fragment_relay::store::handlers::store_router;
use fragment_relay::store::{FragmentStore, MemoryFragmentStore, RemoteFragmentStore};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Missing credentials are a startup failure, never a runtime one.
    let config = RelayConfig::load()?;

    tracing::info!("Starting fragment relay on {}", config.bind_addr);
    tracing::info!("Forwarding completed messages to {}", config.api_base);

    // 1. Storage:
    let local_store = Arc::new(MemoryFragmentStore::new());
    let store: Arc<dyn FragmentStore> = match &config.store_url {
        Some(url) => {
            tracing::info!("Using shared store node at {}", url);
            Arc::new(RemoteFragmentStore::new(
                url,
                config.store_timeout,
                config.store_attempts,
            ))
        }
        None => {
            tracing::info!("Using in-process store");
            local_store.clone() as Arc<dyn FragmentStore>
        }
    };

    // 2. Delivery:
    let forwarder = Arc::new(HttpForwarder::new(
        &config.api_base,
        &config.api_token,
        config.forward.clone(),
    ));
    let reassembler = Arc::new(Reassembler::new(store, forwarder, config.claim_lease));

    // 3. Reconciliation sweep:
    if !config.reconcile_interval.is_zero() {
        Reconciler::new(reassembler.clone(), config.reconcile_interval, 100).start();
    }

    // 4. HTTP Router:
    let mut app = dispatch_router(reassembler);
    if config.serve_store {
        tracing::info!("Serving in-process store to other relays");
        app = app.merge(store_router(local_store));
    }

    // 5. Start HTTP server:
    tracing::info!("Press Ctrl+C to shutdown");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
