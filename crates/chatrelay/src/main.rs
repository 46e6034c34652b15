use clap::Parser;
use tracing_subscriber::EnvFilter;

use chatrelay::{lan_address, ChatServerBuilder, ServerConfig};

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = ServerConfig::parse();
    let server = ChatServerBuilder::from_config(&config).build().await?;

    tracing::info!(
        mode = %config.mode,
        max_clients = config.max_clients,
        addr = %server.local_addr()?,
        "server started"
    );
    if config.host.is_unspecified() {
        if let Some(ip) = lan_address().await {
            tracing::info!(%ip, port = config.port, "LAN address for clients");
        }
    }

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }

    Ok(())
}
