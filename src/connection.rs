//! Stream connection lifecycle.
//!
//! Tracks the single live connection as an explicit state machine
//! (Disconnected -> Connecting -> Open -> Disconnected ...) and decides
//! when the next attempt happens. I/O lives in the client driver; this
//! type only owns the bookkeeping.
//!
//! Every attempt gets a generation number. Events and retry timers from a
//! superseded generation are ignored, so a torn-down connection can never
//! schedule a second, competing reconnect.

use std::fmt;
use std::time::Duration;

use tracing::{debug, info};

use crate::backoff::BackoffPolicy;

// =============================================================================
// STATE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// No connection; a reconnect may be pending.
    Disconnected,
    /// Attempt in flight, waiting for the transport to open or close.
    Connecting,
    /// Receiving frames.
    Open,
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "DISCONNECTED"),
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Open => write!(f, "OPEN"),
        }
    }
}

/// Connectivity as seen by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionState {
    pub available: bool,
    /// Delay that was (or will be) waited before the next attempt.
    pub backoff: Duration,
}

/// Why the phase changed, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionReason {
    Started,
    Restarted,
    Opened,
    Closed,
}

impl fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::Restarted => write!(f, "restarted"),
            Self::Opened => write!(f, "opened"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Handle for one connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub generation: u64,
    /// True when a previous connection or attempt was torn down.
    pub replaced: bool,
}

/// Reconnect the driver must schedule after a close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retry {
    pub generation: u64,
    pub delay: Duration,
}

// =============================================================================
// MANAGER
// =============================================================================

#[derive(Debug)]
pub struct ConnectionManager {
    policy: BackoffPolicy,
    phase: ConnectionPhase,
    state: ConnectionState,
    generation: u64,
    pending_retry: Option<u64>,
}

impl ConnectionManager {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            phase: ConnectionPhase::Disconnected,
            state: ConnectionState {
                available: false,
                backoff: policy.reset(),
            },
            generation: 0,
            pending_retry: None,
        }
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Begin a new attempt, discarding any existing connection and any
    /// reconnect that was still waiting.
    pub fn start(&mut self) -> Attempt {
        let replaced = self.phase != ConnectionPhase::Disconnected;
        if let Some(stale) = self.pending_retry.take() {
            debug!(generation = stale, "pending reconnect superseded");
        }

        self.generation += 1;
        self.state.available = false;
        let reason = if replaced {
            TransitionReason::Restarted
        } else {
            TransitionReason::Started
        };
        self.transition(ConnectionPhase::Connecting, reason);

        Attempt {
            generation: self.generation,
            replaced,
        }
    }

    /// Transport reported a successful open. Returns false for stale attempts.
    pub fn on_open(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.phase != ConnectionPhase::Connecting {
            debug!(generation, current = self.generation, "ignoring stale open");
            return false;
        }

        self.state.available = true;
        self.state.backoff = self.policy.reset();
        self.transition(ConnectionPhase::Open, TransitionReason::Opened);
        true
    }

    /// Transport reported a close or an error. Returns the reconnect to
    /// schedule, or `None` when the event belongs to a superseded attempt.
    pub fn on_close(&mut self, generation: u64) -> Option<Retry> {
        if generation != self.generation || self.phase == ConnectionPhase::Disconnected {
            debug!(generation, current = self.generation, "ignoring stale close");
            return None;
        }

        self.state.available = false;
        self.state.backoff = self.policy.next(self.state.backoff);
        self.pending_retry = Some(generation);
        self.transition(ConnectionPhase::Disconnected, TransitionReason::Closed);

        Some(Retry {
            generation,
            delay: self.state.backoff,
        })
    }

    /// A reconnect timer fired. True if it is still the live one and the
    /// driver should call [`ConnectionManager::start`].
    pub fn retry_due(&mut self, generation: u64) -> bool {
        if self.pending_retry == Some(generation) {
            self.pending_retry = None;
            true
        } else {
            debug!(generation, "dropping superseded reconnect timer");
            false
        }
    }

    fn transition(&mut self, next: ConnectionPhase, reason: TransitionReason) {
        let previous = std::mem::replace(&mut self.phase, next);
        info!(
            from = %previous,
            to = %next,
            reason = %reason,
            generation = self.generation,
            backoff_ms = self.state.backoff.as_millis() as u64,
            "connection_transition"
        );
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new(BackoffPolicy::default())
    }
}
