use thiserror::Error;

/// Errors surfaced to whoever builds or drives the client.
///
/// Transport failures are deliberately absent: they are absorbed by the
/// reconnect loop and never reach callers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The configured origin is not a parseable absolute URL.
    #[error("invalid origin '{origin}': {reason}")]
    InvalidOrigin { origin: String, reason: String },
    /// The origin scheme has no streaming equivalent.
    #[error("unsupported origin scheme '{0}' (expected http, https, ws or wss)")]
    UnsupportedScheme(String),
    /// Backoff parameters that would shrink or overflow the delay.
    #[error("invalid backoff configuration: {0}")]
    InvalidBackoff(String),
    /// The client task has stopped and no longer accepts commands.
    #[error("client is no longer running")]
    Closed,
}
