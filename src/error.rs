/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// Non-success HTTP status code with raw response body.
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// A retryable status was still returned when the retry budget ran out.
    #[error("giving up on {url} after {attempts} attempts: last status {status}")]
    RetriesExhausted {
        status: u16,
        url: String,
        attempts: usize,
    },
    /// No connection adapter is mounted for the URL.
    #[error("no connection adapter mounted for '{0}'")]
    NoAdapter(String),
    /// Retry policy construction was rejected.
    #[error("invalid retry policy: {0}")]
    InvalidPolicy(String),
    /// Request options were used where they do not apply.
    #[error("invalid request options: {0}")]
    InvalidOptions(String),
    /// Reading TLS material from disk failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// Response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl Error {
    /// Returns `true` for connection-level failures that may succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Transport(err) => {
                err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
            }
            _ => false,
        }
    }
}
