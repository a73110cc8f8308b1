use std::net::SocketAddr;

use flume::Sender;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::message::Message;

/// The two coordinator inboxes a reader task feeds.
#[derive(Clone)]
pub struct ReaderHandoff {
    pub messages: Sender<Message>,
    pub removals: Sender<SocketAddr>,
}

/// Reads chunks of at most `buffer_size` bytes and hands each one to the
/// coordinator, waiting until it is taken.
///
/// End of stream and read errors both end the loop with a removal handoff.
/// The task never writes to the connection and never touches the registry.
pub async fn read_loop<R>(
    mut reader: R,
    addr: SocketAddr,
    buffer_size: usize,
    handoff: ReaderHandoff,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; buffer_size];
    loop {
        let read = match reader.read(&mut buf).await {
            Ok(0) => {
                debug!(peer = %addr, "peer closed its side of the connection");
                break;
            }
            Ok(read) => read,
            Err(error) => {
                debug!(peer = %addr, ?error, "read from peer failed");
                break;
            }
        };

        let message = Message::new(&buf[..read], addr);
        if handoff.messages.send_async(message).await.is_err() {
            debug!(peer = %addr, "coordinator stopped; dropping chunk");
            return;
        }
    }

    if handoff.removals.send_async(addr).await.is_err() {
        debug!(peer = %addr, "coordinator stopped before removal handoff");
    }
}
