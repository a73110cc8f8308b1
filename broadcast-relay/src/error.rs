use std::{io, net::SocketAddr};

use thiserror::Error;

/// Failures that stop the relay as a whole.
///
/// Errors on a single connection never show up here: they are logged and
/// end in that peer being removed.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to bind listener on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to read the listener's local address")]
    LocalAddr(#[source] io::Error),

    #[error("coordinator task ended abnormally")]
    CoordinatorPanicked(#[source] tokio::task::JoinError),
}
