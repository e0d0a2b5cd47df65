//! Routes parsed stream messages to state changes and side effects.
//!
//! The dispatcher never performs I/O. It returns [`Effect`]s in the order
//! they must be executed, which keeps every rule testable without a
//! socket or a clock.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::notify::Notification;
use crate::protocol::{AlertPayload, Envelope, Message, RaidPayload};
use crate::store::{Snapshot, StateStore};
use crate::version::{VersionChange, VersionWatch};

pub const RAID_TITLE: &str = "Incoming raid";
pub const FOLLOWER_TITLE: &str = "New Follower";
pub const FOLLOWER_VARIANT: &str = "success";

/// Side effect requested by a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Notify(Notification),
    PlaySound(String),
    /// Lift notification suppression once this delay has elapsed.
    ScheduleSettle(Duration),
    /// Server upgraded; the client must restart from scratch.
    Reload,
}

#[derive(Debug)]
pub struct Dispatcher {
    store: StateStore,
    version: VersionWatch,
    settle_delay: Duration,
    follower_sound: String,
}

impl Dispatcher {
    pub fn new(settle_delay: Duration, follower_sound: impl Into<String>) -> Self {
        Self {
            store: StateStore::default(),
            version: VersionWatch::default(),
            settle_delay,
            follower_sound: follower_sound.into(),
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn version(&self) -> Option<&str> {
        self.version.current()
    }

    /// Handle one text frame. Malformed input is logged and yields no effects.
    pub fn dispatch(&mut self, frame: &str) -> Vec<Effect> {
        let envelope = match Envelope::parse(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, frame = %truncate(frame, 200), "Dropping unparseable frame");
                return Vec::new();
            }
        };

        let mut effects = Vec::new();

        if let Some(token) = envelope.version() {
            if let VersionChange::Upgraded { from, to } = self.version.observe(&token) {
                info!(%from, %to, "Server version changed");
                effects.push(Effect::Reload);
            }
        }

        match envelope.message() {
            Ok(Message::Alert(alert)) => self.on_alert(&envelope, alert, &mut effects),
            Ok(Message::Raid(raid)) => self.on_raid(&envelope, &raid, &mut effects),
            Ok(Message::Store(snapshot)) => self.on_store(snapshot, &mut effects),
            Ok(Message::Unknown(kind)) => {
                debug!(kind = %kind, "Unhandled message type");
            }
            Err(e) => {
                warn!(kind = %envelope.kind, error = %e, "Dropping malformed payload");
            }
        }

        effects
    }

    /// The settle timer fired.
    pub fn lift_suppression(&mut self) {
        if self.store.lift_suppression() {
            debug!("Initial load settled, follower notifications enabled");
        }
    }

    fn on_alert(&self, envelope: &Envelope, alert: AlertPayload, effects: &mut Vec<Effect>) {
        let notification = Notification::new(alert.title, alert.text, alert.variant.as_deref())
            .replayed(envelope.replay, envelope.time);
        effects.push(Effect::Notify(notification));

        if let Some(sound) = alert.sound.filter(|s| !s.is_empty()) {
            effects.push(Effect::PlaySound(sound));
        }
    }

    fn on_raid(&self, envelope: &Envelope, raid: &RaidPayload, effects: &mut Vec<Effect>) {
        let viewers = raid
            .viewer_count
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "0".to_string());
        let text = format!("{} just raided with {} raiders", raid.from, viewers);

        effects.push(Effect::Notify(
            Notification::new(RAID_TITLE, text, None).replayed(envelope.replay, envelope.time),
        ));
    }

    fn on_store(&mut self, snapshot: Snapshot, effects: &mut Vec<Effect>) {
        let outcome = self.store.replace(snapshot);

        if let Some(follower) = outcome.new_follower {
            effects.push(Effect::Notify(Notification::new(
                FOLLOWER_TITLE,
                format!("{follower} just followed"),
                Some(FOLLOWER_VARIANT),
            )));
            effects.push(Effect::PlaySound(self.follower_sound.clone()));
        }

        if outcome.suppressed {
            effects.push(Effect::ScheduleSettle(self.settle_delay));
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
