use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use broadcast_relay::{Relay, cli::Cli};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Cli::parse().into_config();
    let relay = match Relay::bind(config).await {
        Ok(relay) => relay,
        Err(err) => {
            error!("listener failed: {err:?}");
            return Err(err).context("failed to start relay");
        }
    };

    let addr = relay.local_addr()?;
    info!("relay listening on {}", addr);

    let summary = relay.run_until_signal().await?;
    info!(
        peers_seen = summary.peers_seen,
        messages_relayed = summary.messages_relayed,
        peers_closed = summary.peers_closed_at_shutdown,
        "relay exited"
    );

    Ok(())
}
