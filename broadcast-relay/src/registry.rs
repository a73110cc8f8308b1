use std::{
    collections::{HashMap, hash_map::Entry},
    io,
    net::SocketAddr,
};

use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    net::tcp::OwnedWriteHalf,
    task::AbortHandle,
};
use tracing::debug;

use crate::message::Message;

/// A connected client: its address, the write side of its connection and a
/// handle on the task reading the other side.
pub struct Peer<W = OwnedWriteHalf> {
    addr: SocketAddr,
    writer: W,
    reader: Option<AbortHandle>,
}

impl<W> Peer<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(addr: SocketAddr, writer: W) -> Self {
        Self {
            addr,
            writer,
            reader: None,
        }
    }

    /// Attaches the reader task so closing the peer also stops its reads.
    pub fn with_reader(mut self, reader: AbortHandle) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer.write_all(data).await?;
        self.writer.flush().await
    }

    /// Closes the connection. Consumes the peer, so it can only happen once.
    pub async fn close(mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Err(error) = self.writer.shutdown().await {
            debug!(peer = %self.addr, ?error, "peer connection was already broken on close");
        }
    }
}

/// The set of live peers, keyed by remote address.
///
/// Not synchronized: the coordinator owns it and is the only caller.
pub struct PeerRegistry<W = OwnedWriteHalf> {
    peers: HashMap<SocketAddr, Peer<W>>,
}

impl<W> Default for PeerRegistry<W> {
    fn default() -> Self {
        Self {
            peers: HashMap::new(),
        }
    }
}

impl<W> PeerRegistry<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a peer. A peer whose address is already registered is handed
    /// back untouched instead of replacing the existing entry.
    pub fn add(&mut self, peer: Peer<W>) -> Result<(), Peer<W>> {
        match self.peers.entry(peer.addr) {
            Entry::Occupied(_) => Err(peer),
            Entry::Vacant(slot) => {
                slot.insert(peer);
                Ok(())
            }
        }
    }

    /// Removes and closes the peer. Returns `false` if it was not registered.
    pub async fn remove(&mut self, addr: &SocketAddr) -> bool {
        match self.peers.remove(addr) {
            Some(peer) => {
                peer.close().await;
                true
            }
            None => false,
        }
    }

    /// Every peer except the one at `exclude`.
    pub fn iter_except_mut(
        &mut self,
        exclude: SocketAddr,
    ) -> impl Iterator<Item = &mut Peer<W>> + '_ {
        self.peers
            .values_mut()
            .filter(move |peer| peer.addr != exclude)
    }

    /// Writes the message to every peer but its sender, one after another.
    ///
    /// A slow peer delays every peer visited after it. Returns the peers
    /// whose write failed.
    pub async fn fanout(&mut self, message: &Message) -> Vec<(SocketAddr, io::Error)> {
        let mut failed = Vec::new();
        for peer in self.iter_except_mut(message.from()) {
            if let Err(error) = peer.send(message.data()).await {
                failed.push((peer.addr(), error));
            }
        }
        failed
    }

    /// Closes every peer and empties the registry. Returns how many were closed.
    pub async fn close_all(&mut self) -> usize {
        let peers: Vec<Peer<W>> = self.peers.drain().map(|(_, peer)| peer).collect();
        let closed = peers.len();
        for peer in peers {
            peer.close().await;
        }
        closed
    }

    pub fn contains(&self, addr: &SocketAddr) -> bool {
        self.peers.contains_key(addr)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
