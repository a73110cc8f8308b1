use tracing::{info, warn};

/// Resolves on the first SIGINT or SIGTERM (Ctrl-C on other platforms).
///
/// If the handlers cannot be installed this never resolves, so the relay
/// keeps running instead of shutting down straight away.
pub async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let installed = signal(SignalKind::interrupt())
            .and_then(|sigint| Ok((sigint, signal(SignalKind::terminate())?)));
        let (mut sigint, mut sigterm) = match installed {
            Ok(handlers) => handlers,
            Err(error) => {
                warn!(?error, "failed to install signal handlers");
                return std::future::pending().await;
            }
        };

        tokio::select! {
            _ = sigint.recv() => info!("received SIGINT, shutting down"),
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(?error, "failed to install ctrl-c handler");
            return std::future::pending().await;
        }
        info!("received ctrl-c, shutting down");
    }
}
