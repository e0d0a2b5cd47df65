//! Overlay Client Library
//!
//! Resilient event-stream client for the stream overlay dashboard: keeps one
//! WebSocket to the overlay server alive, reconciles the pushed state
//! snapshot, and turns discrete events into notifications for whatever
//! frontend hosts it.

pub mod backoff;
pub mod client;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod notify;
pub mod protocol;
pub mod store;
pub mod transport;
pub mod version;
pub mod view;

pub use backoff::BackoffPolicy;
pub use client::{ClientCommand, ClientHandle, OverlayClient, RunOutcome};
pub use config::ClientConfig;
pub use connection::{ConnectionManager, ConnectionPhase, ConnectionState};
pub use dispatcher::{Dispatcher, Effect};
pub use error::ClientError;
pub use notify::{Frontend, LogFrontend, Notification};
pub use store::{Snapshot, StateStore};
pub use transport::{Connection, Frame, Transport, WsTransport};
pub use view::{DashboardView, Indicator};
