use std::{net::SocketAddr, time::Duration};

use anyhow::Result;
use broadcast_relay::{Relay, RelayConfig, RelaySummary};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::{oneshot, watch},
    task::JoinHandle,
    time::timeout,
};

const READ_TIMEOUT: Duration = Duration::from_secs(1);
const QUIET: Duration = Duration::from_millis(200);

struct RunningRelay {
    addr: SocketAddr,
    peers: watch::Receiver<usize>,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<Result<RelaySummary, broadcast_relay::RelayError>>,
}

impl RunningRelay {
    async fn start() -> Result<Self> {
        let relay = Relay::bind(RelayConfig::with_listen("127.0.0.1:0".parse()?)).await?;
        let addr = relay.local_addr()?;
        let peers = relay.peer_count();

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(relay.run_until(async move {
            let _ = shutdown_rx.await;
        }));

        Ok(Self {
            addr,
            peers,
            shutdown,
            task,
        })
    }

    /// Connects and returns once the coordinator has registered the new peer.
    async fn connect(&mut self) -> Result<TcpStream> {
        let registered = *self.peers.borrow();
        let stream = TcpStream::connect(self.addr).await?;
        self.wait_for_peers(registered + 1).await?;
        Ok(stream)
    }

    async fn wait_for_peers(&mut self, count: usize) -> Result<()> {
        timeout(READ_TIMEOUT, self.peers.wait_for(|&peers| peers == count)).await??;
        Ok(())
    }

    async fn stop(self) -> Result<RelaySummary> {
        let _ = self.shutdown.send(());
        let summary = timeout(READ_TIMEOUT, self.task).await???;
        Ok(summary)
    }
}

async fn expect_chunk(stream: &mut TcpStream, expected: &[u8]) -> Result<()> {
    let mut buf = vec![0u8; expected.len()];
    timeout(READ_TIMEOUT, stream.read_exact(&mut buf)).await??;
    assert_eq!(buf, expected);
    Ok(())
}

async fn expect_silence(stream: &mut TcpStream) {
    let mut buf = [0u8; 16];
    assert!(
        timeout(QUIET, stream.read(&mut buf)).await.is_err(),
        "peer should not have received anything"
    );
}

async fn expect_closed(stream: &mut TcpStream) -> Result<()> {
    let mut buf = [0u8; 16];
    let read = timeout(READ_TIMEOUT, stream.read(&mut buf))
        .await?
        .unwrap_or(0);
    assert_eq!(read, 0, "relay should have closed the connection");
    Ok(())
}

#[tokio::test]
async fn three_peers_then_one_leaves() -> Result<()> {
    let mut relay = RunningRelay::start().await?;
    let mut a = relay.connect().await?;
    let mut b = relay.connect().await?;
    let mut c = relay.connect().await?;

    a.write_all(b"hello").await?;
    expect_chunk(&mut b, b"hello").await?;
    expect_chunk(&mut c, b"hello").await?;
    expect_silence(&mut a).await;

    drop(c);
    relay.wait_for_peers(2).await?;

    a.write_all(b"world").await?;
    expect_chunk(&mut b, b"world").await?;
    expect_silence(&mut a).await;

    let summary = relay.stop().await?;
    assert_eq!(summary.peers_seen, 3);
    assert_eq!(summary.messages_relayed, 2);
    assert_eq!(summary.peers_closed_at_shutdown, 2);
    Ok(())
}

#[tokio::test]
async fn bytes_are_relayed_verbatim() -> Result<()> {
    let mut relay = RunningRelay::start().await?;
    let mut sender = relay.connect().await?;
    let mut receiver = relay.connect().await?;

    let payload: Vec<u8> = vec![0x00, 0xff, b'\n', 0x80, b'x', 0x7f];
    sender.write_all(&payload).await?;
    expect_chunk(&mut receiver, &payload).await?;

    relay.stop().await?;
    Ok(())
}

#[tokio::test]
async fn every_peer_can_send() -> Result<()> {
    let mut relay = RunningRelay::start().await?;
    let mut a = relay.connect().await?;
    let mut b = relay.connect().await?;

    a.write_all(b"from a").await?;
    expect_chunk(&mut b, b"from a").await?;

    b.write_all(b"from b").await?;
    expect_chunk(&mut a, b"from b").await?;

    relay.stop().await?;
    Ok(())
}

#[tokio::test]
async fn shutdown_closes_peers_and_stops_accepting() -> Result<()> {
    let mut relay = RunningRelay::start().await?;
    let addr = relay.addr;
    let mut a = relay.connect().await?;
    let mut b = relay.connect().await?;

    let summary = relay.stop().await?;
    assert_eq!(summary.peers_closed_at_shutdown, 2);

    expect_closed(&mut a).await?;
    expect_closed(&mut b).await?;
    assert!(
        TcpStream::connect(addr).await.is_err(),
        "no connections may be accepted after shutdown"
    );
    Ok(())
}

#[tokio::test]
async fn shutdown_with_no_peers() -> Result<()> {
    let relay = RunningRelay::start().await?;
    let summary = relay.stop().await?;
    assert_eq!(summary, RelaySummary::default());
    Ok(())
}

#[tokio::test]
async fn binding_a_taken_address_fails() -> Result<()> {
    let relay = RunningRelay::start().await?;

    let result = Relay::bind(RelayConfig::with_listen(relay.addr)).await;
    assert!(matches!(
        result,
        Err(broadcast_relay::RelayError::Bind { addr, .. }) if addr == relay.addr
    ));

    relay.stop().await?;
    Ok(())
}
