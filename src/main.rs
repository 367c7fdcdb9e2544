#![warn(unused_crate_dependencies)]

use axum::{Extension, Router};
use config::{load_config, VERSION};
use log::{error, info};
use state::AppState;
use std::{net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, signal};

mod auth;
mod channel;
mod codec;
mod config;
mod database;
mod gateway;
mod logging;
mod multiplayer;
mod presence;
mod score;
mod session;
mod state;

#[tokio::main]
async fn main() {
    let config = load_config().unwrap_or_default();

    logging::setup(config.logging, &config.log_dir);
    log_panics::init();

    let addr: SocketAddr = SocketAddr::new([0, 0, 0, 0].into(), config.port);

    let db = match database::connect(&config.database_file).await {
        Ok(value) => value,
        Err(err) => {
            error!("Failed to connect to database: {:?}", err);
            return;
        }
    };

    let state = Arc::new(AppState::new(db, config));

    gateway::spawn_idle_sweeper(state.clone());

    let router: Router = gateway::router().layer(Extension(state));
    let service = router.into_make_service_with_connect_info::<SocketAddr>();

    info!("Starting bancho relay on {} (v{})", addr, VERSION);

    let listener = match TcpListener::bind(addr).await {
        Ok(value) => value,
        Err(err) => {
            error!("Failed to bind HTTP server on {}: {:?}", addr, err);
            return;
        }
    };

    if let Err(err) = axum::serve(listener, service)
        .with_graceful_shutdown(async move {
            _ = signal::ctrl_c().await;
        })
        .await
    {
        error!("Error within HTTP server: {:?}", err);
    }
}
