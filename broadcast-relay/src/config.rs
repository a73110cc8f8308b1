use std::net::{Ipv4Addr, SocketAddr};

use clap::ValueEnum;

/// Port the relay listens on when nothing else is configured.
pub const DEFAULT_PORT: u16 = 3000;

/// Upper bound on the size of a single relayed chunk.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// What the coordinator does when writing a chunk to a peer fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum WriteFailurePolicy {
    /// Remove the peer and close its connection, as if its read side had failed.
    #[default]
    Drop,
    /// Log the failure and keep the peer registered.
    Log,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub listen: SocketAddr,
    pub read_buffer_size: usize,
    pub on_write_error: WriteFailurePolicy,
}

impl RelayConfig {
    pub fn with_listen(listen: SocketAddr) -> Self {
        Self {
            listen,
            ..Self::default()
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            on_write_error: WriteFailurePolicy::default(),
        }
    }
}
