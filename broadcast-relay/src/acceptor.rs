use std::{future::Future, net::SocketAddr};

use flume::Sender;
use tokio::{
    net::{TcpListener, TcpStream},
    select,
};
use tracing::{debug, warn};

/// A freshly accepted connection on its way to the coordinator.
pub type Incoming = (TcpStream, SocketAddr);

/// Accepts connections until `closed` resolves, then drops the listener.
///
/// Each connection is handed to the coordinator from its own short task so
/// a busy coordinator never holds up `accept`. The acceptor does not read
/// from the connection; the coordinator starts the reader once it has
/// registered the peer.
pub async fn accept_loop<F>(listener: TcpListener, added: Sender<Incoming>, closed: F)
where
    F: Future,
{
    tokio::pin!(closed);

    loop {
        select! {
            _ = &mut closed => {
                debug!("listener closed");
                break;
            }
            accept_result = listener.accept() => {
                handle_accept_result(accept_result, &added);
            }
        }
    }
}

fn handle_accept_result(result: std::io::Result<Incoming>, added: &Sender<Incoming>) {
    match result {
        Ok((stream, peer)) => spawn_handoff(stream, peer, added),
        Err(err) => warn!(error = ?err, "failed to accept connection"),
    }
}

fn spawn_handoff(stream: TcpStream, peer: SocketAddr, added: &Sender<Incoming>) {
    let added = added.clone();
    tokio::spawn(async move {
        match added.send_async((stream, peer)).await {
            Ok(()) => debug!(peer = %peer, "connection handed to coordinator"),
            Err(_) => debug!(peer = %peer, "relay stopped before the connection was registered"),
        }
    });
}
