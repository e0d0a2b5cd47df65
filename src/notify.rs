//! Side-effect boundary towards the presentation layer.
//!
//! The core never renders anything itself. It hands [`Notification`]s,
//! sound references and reload requests to a [`Frontend`], fire-and-forget.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

/// Toast style used when the server does not name one.
pub const DEFAULT_VARIANT: &str = "primary";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub text: String,
    pub variant: String,
    /// True when the event is a server-side replay of a stored event.
    pub replay: bool,
    /// Original event time for replayed events.
    pub time: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn new(title: impl Into<String>, text: impl Into<String>, variant: Option<&str>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            variant: variant
                .filter(|v| !v.is_empty())
                .unwrap_or(DEFAULT_VARIANT)
                .to_string(),
            replay: false,
            time: None,
        }
    }

    pub fn replayed(mut self, replay: bool, time: Option<DateTime<Utc>>) -> Self {
        self.replay = replay;
        self.time = time;
        self
    }
}

/// Presentation collaborator. None of these calls may report failure back.
pub trait Frontend: Send {
    fn show_alert(&self, notification: &Notification);

    fn play_sound(&self, url: &str);

    /// Irreversible client restart after a server upgrade.
    fn reload(&self);
}

/// Frontend for headless runs: every effect becomes a log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFrontend;

impl Frontend for LogFrontend {
    fn show_alert(&self, notification: &Notification) {
        info!(
            variant = %notification.variant,
            replay = notification.replay,
            "🔔 {}: {}",
            notification.title,
            notification.text
        );
    }

    fn play_sound(&self, url: &str) {
        info!(url, "🔊 Playing sound");
    }

    fn reload(&self) {
        warn!("♻️ Server version changed, reloading client");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_defaults_to_primary() {
        assert_eq!(Notification::new("T", "X", None).variant, "primary");
        assert_eq!(Notification::new("T", "X", Some("")).variant, "primary");
        assert_eq!(Notification::new("T", "X", Some("danger")).variant, "danger");
    }
}
