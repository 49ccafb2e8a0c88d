use std::time::Duration;
use thiserror::Error;

use sealbox_core::error::{
    DecodeError, EngineError, ExpiredSecret, KdfError, PayloadError,
};

/// Failure of the request/response protocol itself, as opposed to a
/// cryptographic failure inside the worker.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No response within the configured duration. Terminal for this call;
    /// the caller may re-issue a fresh request.
    #[error("request timed out after {after:?}")]
    Timeout { after: Duration },

    /// The worker was shut down while the request was outstanding.
    #[error("crypto worker terminated")]
    Terminated,

    /// The worker died or misbehaved. The next call respawns it.
    #[error("crypto worker failed: {0}")]
    WorkerFailed(String),
}

/// Everything an `encrypt` or `decrypt` call can fail with.
///
/// All failures are terminal for the single call; nothing is retried
/// automatically.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Kdf(#[from] KdfError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Expired(#[from] ExpiredSecret),

    #[error("message is {size} bytes, maximum is {max}")]
    SizeLimitExceeded { size: usize, max: usize },

    #[error("message must not be empty")]
    EmptyMessage,

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}
