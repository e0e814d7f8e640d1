use std::error::Error;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use domain::restriction::RestrictionCategory;
use server::bootstrap::router::create_router;
use server::bootstrap::state::AppState;
use server::config_loader;
use server::observability;
use warden_adapters::incoming::event_feed::rejoin_listener::run_rejoin_listener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = config_loader::load_config()?;

    observability::tracing::setup_logging(&config)?;

    info!("Starting Warden restriction service");
    info!("Configuration loaded successfully");
    observability::startup_info::print_startup_info(&config);

    let mut state = AppState::new(config.clone()).await?;
    let active_mutes = state.stores.get(RestrictionCategory::Mute).len().await;
    let active_bans = state.stores.get(RestrictionCategory::Ban).len().await;
    info!(active_mutes, active_bans, "Restriction stores loaded");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut background = Vec::new();
    for scheduler in &state.schedulers {
        background.push(tokio::spawn(
            Arc::clone(scheduler).run(shutdown_rx.clone()),
        ));
    }
    let rejoin_feed = state
        .take_rejoin_feed()
        .ok_or("rejoin feed was already taken")?;
    background.push(tokio::spawn(run_rejoin_listener(
        rejoin_feed,
        state.rejoin_use_case(),
        shutdown_rx,
    )));

    let app = create_router(&state);

    let listener = TcpListener::bind(&config.server_address()).await?;
    info!("Server listening on http://{}", config.server_address());

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_tx.send_replace(true);
        })
        .await;

    for task in background {
        if let Err(e) = task.await {
            error!("Background task failed: {}", e);
        }
    }

    if let Err(e) = result {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server shutdown completed");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
            }
        }
    };

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, starting graceful shutdown...");
        },
        () = terminate => {
            info!("Received terminate signal, starting graceful shutdown...");
        },
    }
}
