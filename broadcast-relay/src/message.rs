use std::{borrow::Cow, net::SocketAddr};

/// One chunk as returned by a single read, tagged with the peer it came from.
///
/// The sender's address is only used to keep the chunk from being echoed
/// back to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    data: Vec<u8>,
    from: SocketAddr,
}

impl Message {
    pub fn new(data: impl Into<Vec<u8>>, from: SocketAddr) -> Self {
        Self {
            data: data.into(),
            from,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn from(&self) -> SocketAddr {
        self.from
    }

    /// Payload rendered for logs. Invalid UTF-8 is replaced, not rejected.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}
