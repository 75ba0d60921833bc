use pending_query_actor::PendingError;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("sending to {to} failed: {source}")]
    Send {
        to: SocketAddr,
        source: std::io::Error,
    },

    #[error("encoding cached answer failed: {0}")]
    Encode(#[from] dns::EncodeError),

    #[error(transparent)]
    Pending(#[from] PendingError),
}
