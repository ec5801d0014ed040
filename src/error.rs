use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The node's TLS certificate could not be loaded
    #[error("could not load certificate {path}: {source}")]
    Certificate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The configured macaroon could not be loaded
    #[error("could not load macaroon {path}: {source}")]
    Macaroon {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid rpc endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
    #[error("rpc error: {0}")]
    Rpc(#[from] tonic::Status),
    #[error("invalid pubkey {0}")]
    InvalidPubkey(String),
    #[error("unknown address type: {0}")]
    UnknownAddressType(String),
    /// The node completed SendPaymentSync but reported a payment error
    #[error("payment failed: {0}")]
    Payment(String),
    #[error("timed out after {1:?} waiting for {0}")]
    Timeout(String, Duration),
    #[error("cancelled while waiting for {0}")]
    Cancelled(String),
}

impl Error {
    /// Whether a retry policy may run the failed operation again.
    ///
    /// Only failures that can clear up on their own (node still starting,
    /// peer not yet confirmed, ...) are retryable. Configuration mistakes
    /// and failed payments are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Rpc(_))
    }
}
