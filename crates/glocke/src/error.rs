use thiserror::Error;

/// Errors that can occur in the glocke messaging layer.
#[derive(Debug, Error)]
pub enum GlockeError {
    #[error("event encoding failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("event decoding failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("zeromq error: {0}")]
    Zmq(#[from] zeromq::ZmqError),

    #[error("bad bus endpoint: {0}")]
    Endpoint(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("publish of '{topic}' failed after {attempts} attempts: {last_error}")]
    PublishFailed {
        topic: String,
        attempts: u32,
        last_error: String,
    },
}

impl GlockeError {
    /// Whether retrying the operation can plausibly succeed. Socket and
    /// transport hiccups heal; a bad endpoint or an event that cannot
    /// be encoded never will, and [`PublishFailed`](Self::PublishFailed)
    /// means the retry budget is already spent.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Zmq(_) | Self::Transport(_))
    }
}
