use std::{future::Future, net::SocketAddr};

use tokio::{
    net::TcpListener,
    sync::{oneshot, watch},
};
use tracing::debug;

use crate::{
    acceptor::accept_loop,
    config::RelayConfig,
    coordinator::{Coordinator, handoff_channels},
    error::RelayError,
    signal::wait_for_shutdown_signal,
};

/// Counters reported once the relay has stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelaySummary {
    /// Peers that were registered at any point.
    pub peers_seen: usize,
    /// Chunks that went through a fanout pass.
    pub messages_relayed: usize,
    /// Peers still connected when shutdown closed them.
    pub peers_closed_at_shutdown: usize,
}

pub struct Relay {
    listener: TcpListener,
    config: RelayConfig,
    peer_count: watch::Sender<usize>,
}

impl Relay {
    /// Binds the configured address. Failing to bind is fatal for the relay.
    pub async fn bind(config: RelayConfig) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(config.listen)
            .await
            .map_err(|source| RelayError::Bind {
                addr: config.listen,
                source,
            })?;
        Ok(Self::new(listener, config))
    }

    /// Wraps an already bound listener. `config.listen` is not used.
    pub fn new(listener: TcpListener, config: RelayConfig) -> Self {
        Self {
            listener,
            config,
            peer_count: watch::channel(0).0,
        }
    }

    /// Number of registered peers, updated by the coordinator after every
    /// add and removal. Drops to zero on shutdown.
    pub fn peer_count(&self) -> watch::Receiver<usize> {
        self.peer_count.subscribe()
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        self.listener.local_addr().map_err(RelayError::LocalAddr)
    }

    /// Relays until `shutdown` resolves.
    ///
    /// The shutdown future is just another event source: once it resolves,
    /// the coordinator receives a shutdown event, closes every peer and the
    /// listener, and this call returns after the acceptor has dropped the
    /// listening socket.
    pub async fn run_until<F>(self, shutdown: F) -> Result<RelaySummary, RelayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Relay {
            listener,
            config,
            peer_count,
        } = self;
        let (handoff, inbox) = handoff_channels();
        let (close_tx, close_rx) = oneshot::channel::<()>();

        let coordinator =
            Coordinator::new(inbox, handoff.clone(), close_tx, &config).with_peer_count(peer_count);
        let coordinator = tokio::spawn(coordinator.run());

        let shutdown_tx = handoff.shutdown.clone();
        let forwarder = tokio::spawn(async move {
            shutdown.await;
            if shutdown_tx.send_async(()).await.is_err() {
                debug!("coordinator already stopped");
            }
        });

        accept_loop(listener, handoff.added.clone(), close_rx).await;
        drop(handoff);

        let summary = coordinator.await.map_err(RelayError::CoordinatorPanicked)?;
        forwarder.abort();
        Ok(summary)
    }

    /// Relays until the process receives SIGINT or SIGTERM.
    pub async fn run_until_signal(self) -> Result<RelaySummary, RelayError> {
        self.run_until(wait_for_shutdown_signal()).await
    }
}
