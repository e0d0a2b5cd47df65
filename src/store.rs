//! Latest server snapshot plus the follower transition rule.
//!
//! The server pushes the whole store on every change; the client never
//! merges fields. The previous snapshot only lives long enough to decide
//! whether the last-follower identifier moved.

use serde_json::Value;

/// Follower milestones are shown in steps of this size.
pub const FOLLOWER_MILESTONE_STEP: u32 = 25;
/// Subscriber milestones are shown in steps of this size.
pub const SUBSCRIBER_MILESTONE_STEP: u32 = 5;

/// Opaque server-defined snapshot with typed access to the fields the
/// client relies on. Everything else passes through untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot(Value);

impl Snapshot {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn followers_count(&self) -> Option<f64> {
        self.0.pointer("/followers/count").and_then(Value::as_f64)
    }

    /// Identifier of the most recent follower; `None` when absent or empty.
    pub fn followers_last(&self) -> Option<&str> {
        self.0
            .pointer("/followers/last")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
    }

    pub fn subs_count(&self) -> Option<f64> {
        self.0.pointer("/subs/count").and_then(Value::as_f64)
    }

    pub fn next_followers_milestone(&self) -> Option<i64> {
        self.followers_count()
            .and_then(|count| next_milestone(count, FOLLOWER_MILESTONE_STEP))
    }

    pub fn next_subs_milestone(&self) -> Option<i64> {
        self.subs_count()
            .and_then(|count| next_milestone(count, SUBSCRIBER_MILESTONE_STEP))
    }
}

/// Smallest multiple of `step` strictly above `count`.
pub fn next_milestone(count: f64, step: u32) -> Option<i64> {
    if !count.is_finite() || step == 0 {
        return None;
    }
    let step = f64::from(step);
    Some((((count + 1.0) / step).ceil() * step) as i64)
}

/// Outcome of replacing the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reconciliation {
    /// Set when a new-follower notification must fire.
    pub new_follower: Option<String>,
    /// True when suppression is still active after this replacement.
    pub suppressed: bool,
}

#[derive(Debug)]
pub struct StateStore {
    snapshot: Option<Snapshot>,
    suppressed: bool,
}

impl Default for StateStore {
    fn default() -> Self {
        Self {
            snapshot: None,
            suppressed: true,
        }
    }
}

impl StateStore {
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    /// Replace the snapshot wholesale and run the follower comparison.
    pub fn replace(&mut self, next: Snapshot) -> Reconciliation {
        let previous = self.snapshot.replace(next);

        let current_last = self.snapshot.as_ref().and_then(Snapshot::followers_last);
        let previous_last = previous.as_ref().and_then(Snapshot::followers_last);

        let new_follower = match current_last {
            _ if self.suppressed => None,
            Some(last) if previous_last != Some(last) => Some(last.to_string()),
            _ => None,
        };

        Reconciliation {
            new_follower,
            suppressed: self.suppressed,
        }
    }

    /// End the initial-load window. Returns false if it had already ended.
    pub fn lift_suppression(&mut self) -> bool {
        std::mem::replace(&mut self.suppressed, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(last: Option<&str>, followers: i64, subs: i64) -> Snapshot {
        Snapshot::new(json!({
            "followers": { "count": followers, "last": last, "seen": [] },
            "subs": { "count": subs, "last": null, "recent": [] },
            "donations": { "last_donator": null, "last_amount": 0 },
        }))
    }

    #[test]
    fn test_first_snapshot_never_notifies() {
        let mut store = StateStore::default();
        let outcome = store.replace(snapshot(Some("alice"), 10, 1));
        assert_eq!(outcome.new_follower, None);
        assert!(outcome.suppressed);
    }

    #[test]
    fn test_changed_follower_notifies_after_suppression_lifts() {
        let mut store = StateStore::default();
        store.replace(snapshot(Some("alice"), 10, 1));
        assert!(store.lift_suppression());

        let outcome = store.replace(snapshot(Some("bob"), 11, 1));
        assert_eq!(outcome.new_follower.as_deref(), Some("bob"));
        assert!(!outcome.suppressed);
    }

    #[test]
    fn test_same_follower_does_not_notify() {
        let mut store = StateStore::default();
        store.replace(snapshot(Some("alice"), 10, 1));
        store.lift_suppression();

        assert_eq!(store.replace(snapshot(Some("alice"), 10, 2)).new_follower, None);
    }

    #[test]
    fn test_empty_follower_does_not_notify() {
        let mut store = StateStore::default();
        store.replace(snapshot(Some("alice"), 10, 1));
        store.lift_suppression();

        assert_eq!(store.replace(snapshot(None, 10, 1)).new_follower, None);
        assert_eq!(store.replace(snapshot(Some(""), 10, 1)).new_follower, None);
        // Coming back from "no follower" is still a change.
        assert_eq!(
            store.replace(snapshot(Some("alice"), 10, 1)).new_follower.as_deref(),
            Some("alice")
        );
    }

    #[test]
    fn test_changes_during_suppression_are_swallowed() {
        let mut store = StateStore::default();
        store.replace(snapshot(Some("alice"), 10, 1));
        assert_eq!(store.replace(snapshot(Some("bob"), 11, 1)).new_follower, None);

        store.lift_suppression();
        assert!(!store.lift_suppression());
        assert_eq!(store.replace(snapshot(Some("bob"), 11, 1)).new_follower, None);
    }

    #[test]
    fn test_milestones() {
        assert_eq!(next_milestone(0.0, 25), Some(25));
        assert_eq!(next_milestone(24.0, 25), Some(25));
        assert_eq!(next_milestone(25.0, 25), Some(50));
        assert_eq!(next_milestone(4.0, 5), Some(5));
        assert_eq!(next_milestone(5.0, 5), Some(10));
        assert_eq!(next_milestone(f64::NAN, 5), None);

        let snap = snapshot(Some("alice"), 137, 9);
        assert_eq!(snap.next_followers_milestone(), Some(150));
        assert_eq!(snap.next_subs_milestone(), Some(10));
    }

    #[test]
    fn test_missing_counts_yield_no_milestone() {
        let snap = Snapshot::new(json!({ "followers": { "count": "many" } }));
        assert_eq!(snap.next_followers_milestone(), None);
        assert_eq!(snap.next_subs_milestone(), None);
        assert_eq!(snap.followers_last(), None);
    }
}
