mod config;
mod global;
mod network;
mod session;
mod tick;

use std::path::Path;

use tokio::net::TcpListener;
use tracing::{error, info};

use config::ServerConfig;
use global::GlobalState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting voxeld server...");

    let config = ServerConfig::load(Path::new("config/server.toml"))?;
    info!(
        "Config loaded: bind={}:{}, max_view_distance={}",
        config.bind, config.port, config.max_view_distance
    );

    let addr = format!("{}:{}", config.bind, config.port);
    let global = GlobalState::new(config);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {addr}");

    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received shutdown signal");
        std::process::exit(0);
    });

    tokio::select! {
        _ = tick::run_tick_loop(global.clone()) => {
            info!("Tick loop exited");
        }
        _ = accept_loop(listener, global) => {
            error!("Accept loop exited unexpectedly");
        }
    }

    Ok(())
}

async fn accept_loop(listener: TcpListener, global: std::sync::Arc<GlobalState>) {
    loop {
        match listener.accept().await {
            Ok((socket, peer)) => {
                info!("New connection from {peer}");
                let global = global.clone();
                tokio::spawn(async move {
                    network::handle_connection(socket, global).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {e}");
            }
        }
    }
}
