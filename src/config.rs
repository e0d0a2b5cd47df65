//! Client configuration and endpoint derivation.

use std::time::Duration;

use url::Url;

use crate::backoff::BackoffPolicy;
use crate::error::ClientError;

/// Fixed path of the event stream on the overlay server.
pub const SUBSCRIBE_PATH: &str = "/api/subscribe";
/// Sound played alongside the new-follower notification.
pub const DEFAULT_FOLLOWER_SOUND: &str = "/public/doorbell.webm";
/// Delay between the first snapshot and lifting notification suppression.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);
/// Interval of the presentation clock.
pub const DEFAULT_CLOCK_TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Network origin of the hosting dashboard, e.g. `http://localhost:3000`.
    pub origin: String,
    pub backoff: BackoffPolicy,
    pub settle_delay: Duration,
    pub clock_tick: Duration,
    pub follower_sound: String,
    /// Ask the server to replay stored events after the first open.
    pub replay_on_connect: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:3000".to_string(),
            backoff: BackoffPolicy::default(),
            settle_delay: DEFAULT_SETTLE_DELAY,
            clock_tick: DEFAULT_CLOCK_TICK,
            follower_sound: DEFAULT_FOLLOWER_SOUND.to_string(),
            replay_on_connect: false,
        }
    }
}

impl ClientConfig {
    pub fn with_origin(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            ..Self::default()
        }
    }

    /// Stream endpoint derived from the origin: scheme upgraded to its
    /// WebSocket equivalent, path replaced with [`SUBSCRIBE_PATH`].
    pub fn endpoint(&self) -> Result<Url, ClientError> {
        stream_endpoint(&self.origin)
    }
}

pub fn stream_endpoint(origin: &str) -> Result<Url, ClientError> {
    let mut url = Url::parse(origin.trim()).map_err(|e| ClientError::InvalidOrigin {
        origin: origin.to_string(),
        reason: e.to_string(),
    })?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(ClientError::UnsupportedScheme(other.to_string())),
    };

    // http(s) and ws(s) are all special schemes, so the switch cannot be refused.
    url.set_scheme(scheme)
        .map_err(|_| ClientError::UnsupportedScheme(url.scheme().to_string()))?;
    url.set_path(SUBSCRIBE_PATH);
    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}
