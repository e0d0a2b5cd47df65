//! Read-only model published to the presentation layer.

use chrono::{DateTime, Local};

use crate::connection::{ConnectionPhase, ConnectionState};
use crate::store::Snapshot;

/// Status icons the presentation layer should display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    /// The stream is down; data on screen may be stale.
    Offline,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub connection: ConnectionState,
    pub phase: ConnectionPhase,
    pub snapshot: Option<Snapshot>,
    pub suppressed: bool,
    pub version: Option<String>,
    /// Last clock tick.
    pub now: DateTime<Local>,
}

impl DashboardView {
    pub fn indicators(&self) -> Vec<Indicator> {
        let mut indicators = Vec::new();
        if !self.connection.available {
            indicators.push(Indicator::Offline);
        }
        indicators
    }

    pub fn next_followers(&self) -> Option<i64> {
        self.snapshot.as_ref()?.next_followers_milestone()
    }

    pub fn next_subs(&self) -> Option<i64> {
        self.snapshot.as_ref()?.next_subs_milestone()
    }

    pub fn clock_label(&self) -> String {
        self.now.format("%H:%M:%S").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use std::time::Duration;

    fn view(available: bool, snapshot: Option<Snapshot>) -> DashboardView {
        DashboardView {
            connection: ConnectionState {
                available,
                backoff: Duration::from_millis(100),
            },
            phase: if available {
                ConnectionPhase::Open
            } else {
                ConnectionPhase::Disconnected
            },
            snapshot,
            suppressed: false,
            version: None,
            now: Local.with_ymd_and_hms(2024, 3, 1, 9, 5, 7).unwrap(),
        }
    }

    #[test]
    fn test_offline_indicator_follows_availability() {
        assert_eq!(view(false, None).indicators(), vec![Indicator::Offline]);
        assert!(view(true, None).indicators().is_empty());
    }

    #[test]
    fn test_milestones_need_a_snapshot() {
        assert_eq!(view(true, None).next_followers(), None);

        let snap = Snapshot::new(json!({
            "followers": { "count": 49, "last": "alice" },
            "subs": { "count": 12 },
        }));
        let v = view(true, Some(snap));
        assert_eq!(v.next_followers(), Some(50));
        assert_eq!(v.next_subs(), Some(15));
    }

    #[test]
    fn test_clock_label() {
        assert_eq!(view(true, None).clock_label(), "09:05:07");
    }
}
