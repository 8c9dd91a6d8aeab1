use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the gateway.
///
/// Partial sub-fetch failures are deliberately not represented here: they
/// are logged and absorbed into default slots before a result crosses any
/// public boundary.
#[derive(Debug, Error)]
pub enum Error {
    /// A required credential or endpoint is absent for the requested tier.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An upstream call failed: timeout, non-2xx, malformed JSON, or an
    /// RPC error envelope.
    #[error("transport error: {0}")]
    Transport(String),

    /// The registry has no implementation for the requested chain.
    #[error("unsupported chain: {0}")]
    UnsupportedChain(String),
}

impl Error {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Error::Transport(err.to_string())
    }
}
