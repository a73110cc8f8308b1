//! The single task that owns the peer set.
//!
//! Four rendezvous channels feed the coordinator: new connections, removals,
//! inbound chunks and shutdown. Each channel has capacity zero, so a producer
//! waits until the coordinator takes its event, and the coordinator handles
//! exactly one event at a time. `select!` polls the inboxes in random order,
//! so no source is favoured over another.
//!
//! Fanout writes happen inside the same step that received the chunk. A peer
//! that is slow to accept writes therefore delays the peers after it and
//! every producer waiting on a handoff.

use std::net::SocketAddr;

use flume::{Receiver, Sender};
use tokio::{
    net::TcpStream,
    select,
    sync::{oneshot, watch},
};
use tracing::{debug, info, warn};

use crate::{
    acceptor::Incoming,
    config::{RelayConfig, WriteFailurePolicy},
    message::Message,
    reader::{ReaderHandoff, read_loop},
    registry::{Peer, PeerRegistry},
    relay::RelaySummary,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Running,
    ShuttingDown,
    Stopped,
}

#[derive(Debug)]
pub enum Event {
    PeerAdded(Incoming),
    PeerRemoved(SocketAddr),
    MessageReceived(Message),
    Shutdown,
}

/// Sending halves of the four coordinator inboxes.
#[derive(Clone)]
pub struct Handoff {
    pub added: Sender<Incoming>,
    pub removed: Sender<SocketAddr>,
    pub messages: Sender<Message>,
    pub shutdown: Sender<()>,
}

impl Handoff {
    pub fn for_reader(&self) -> ReaderHandoff {
        ReaderHandoff {
            messages: self.messages.clone(),
            removals: self.removed.clone(),
        }
    }
}

/// Receiving halves of the four coordinator inboxes.
pub struct Inbox {
    added: Receiver<Incoming>,
    removed: Receiver<SocketAddr>,
    messages: Receiver<Message>,
    shutdown: Receiver<()>,
}

/// Creates the four zero-capacity handoff channels.
pub fn handoff_channels() -> (Handoff, Inbox) {
    let (added, added_rx) = flume::bounded(0);
    let (removed, removed_rx) = flume::bounded(0);
    let (messages, messages_rx) = flume::bounded(0);
    let (shutdown, shutdown_rx) = flume::bounded(0);

    let handoff = Handoff {
        added,
        removed,
        messages,
        shutdown,
    };
    let inbox = Inbox {
        added: added_rx,
        removed: removed_rx,
        messages: messages_rx,
        shutdown: shutdown_rx,
    };
    (handoff, inbox)
}

pub struct Coordinator {
    registry: PeerRegistry,
    state: CoordinatorState,
    inbox: Inbox,
    // Kept so no inbox ever reports a disconnect while the coordinator runs.
    handoff: Handoff,
    close_listener: Option<oneshot::Sender<()>>,
    read_buffer_size: usize,
    on_write_error: WriteFailurePolicy,
    summary: RelaySummary,
    peer_count: watch::Sender<usize>,
}

impl Coordinator {
    pub fn new(
        inbox: Inbox,
        handoff: Handoff,
        close_listener: oneshot::Sender<()>,
        config: &RelayConfig,
    ) -> Self {
        Self {
            registry: PeerRegistry::new(),
            state: CoordinatorState::Running,
            inbox,
            handoff,
            close_listener: Some(close_listener),
            read_buffer_size: config.read_buffer_size,
            on_write_error: config.on_write_error,
            summary: RelaySummary::default(),
            peer_count: watch::channel(0).0,
        }
    }

    /// Publishes the registry size on `peer_count` after every add and removal.
    pub fn with_peer_count(mut self, peer_count: watch::Sender<usize>) -> Self {
        peer_count.send_replace(self.registry.len());
        self.peer_count = peer_count;
        self
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    pub fn summary(&self) -> RelaySummary {
        self.summary
    }

    /// Processes events until a shutdown event has been handled.
    pub async fn run(mut self) -> RelaySummary {
        while self.state == CoordinatorState::Running {
            let event = self.next_event().await;
            self.handle(event).await;
        }
        self.summary
    }

    async fn next_event(&self) -> Event {
        let inbox = &self.inbox;
        select! {
            Ok(incoming) = inbox.added.recv_async() => Event::PeerAdded(incoming),
            Ok(addr) = inbox.removed.recv_async() => Event::PeerRemoved(addr),
            Ok(message) = inbox.messages.recv_async() => Event::MessageReceived(message),
            Ok(()) = inbox.shutdown.recv_async() => Event::Shutdown,
            else => Event::Shutdown,
        }
    }

    /// Applies one event. Events arriving after shutdown are ignored.
    pub async fn handle(&mut self, event: Event) {
        if self.state != CoordinatorState::Running {
            debug!(?event, "coordinator stopped; ignoring event");
            return;
        }

        match event {
            Event::PeerAdded((stream, addr)) => self.add_peer(stream, addr).await,
            Event::PeerRemoved(addr) => self.remove_peer(addr).await,
            Event::MessageReceived(message) => self.relay(message).await,
            Event::Shutdown => self.shut_down().await,
        }
    }

    async fn add_peer(&mut self, stream: TcpStream, addr: SocketAddr) {
        let (reader, writer) = stream.into_split();
        let task = tokio::spawn(read_loop(
            reader,
            addr,
            self.read_buffer_size,
            self.handoff.for_reader(),
        ));
        let peer = Peer::new(addr, writer).with_reader(task.abort_handle());

        match self.registry.add(peer) {
            Ok(()) => {
                self.summary.peers_seen += 1;
                self.peer_count.send_replace(self.registry.len());
                info!(peer = %addr, peers = self.registry.len(), "new peer connected");
            }
            Err(rejected) => {
                warn!(peer = %addr, "peer address already registered; dropping connection");
                rejected.close().await;
            }
        }
    }

    async fn remove_peer(&mut self, addr: SocketAddr) {
        if self.registry.remove(&addr).await {
            self.peer_count.send_replace(self.registry.len());
            info!(peer = %addr, peers = self.registry.len(), "peer disconnected");
        } else {
            debug!(peer = %addr, "peer already removed");
        }
    }

    async fn relay(&mut self, message: Message) {
        info!(from = %message.from(), message = %message.text(), "received message");

        let failed = self.registry.fanout(&message).await;
        self.summary.messages_relayed += 1;

        for (addr, error) in failed {
            warn!(peer = %addr, ?error, "failed to deliver message");
            if self.on_write_error == WriteFailurePolicy::Drop {
                self.remove_peer(addr).await;
            }
        }
    }

    async fn shut_down(&mut self) {
        self.state = CoordinatorState::ShuttingDown;
        info!(peers = self.registry.len(), "relay shutting down");

        let closed = self.registry.close_all().await;
        self.summary.peers_closed_at_shutdown = closed;
        self.peer_count.send_replace(0);

        if let Some(close_listener) = self.close_listener.take() {
            // The acceptor may already be gone if it was never started.
            let _ = close_listener.send(());
        }

        self.state = CoordinatorState::Stopped;
        info!(closed, "relay stopped");
    }
}
