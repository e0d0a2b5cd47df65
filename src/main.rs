//! Overlay Client
//!
//! Headless host for the overlay stream client: connects to the overlay
//! server, logs every notification, and rebuilds the client whenever the
//! server announces a new version.
//!
//! Usage:
//!   overlay-client --origin https://overlay.example.com
//!
//! Environment:
//!   OVERLAY_ORIGIN - Dashboard origin (default: http://localhost:3000)
//!   OVERLAY_BACKOFF_BASE_MS - First reconnect delay (default: 100)
//!   OVERLAY_BACKOFF_MAX_MS - Reconnect delay cap (default: 10000)
//!   OVERLAY_SETTLE_MS - Initial-load suppression window (default: 100)
//!   OVERLAY_FOLLOWER_SOUND - Sound for new followers
//!   OVERLAY_REPLAY - Request a replay of stored events after connecting

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use overlay_client::backoff::{BackoffPolicy, DEFAULT_MULTIPLIER};
use overlay_client::config::{DEFAULT_CLOCK_TICK, DEFAULT_FOLLOWER_SOUND};
use overlay_client::{
    ClientConfig, DashboardView, Indicator, LogFrontend, OverlayClient, RunOutcome, WsTransport,
};

#[derive(Parser, Debug)]
#[command(name = "overlay-client")]
#[command(about = "Overlay Client - Follow the overlay event stream and surface notifications")]
struct Args {
    /// Origin of the overlay dashboard
    #[arg(long, env = "OVERLAY_ORIGIN", default_value = "http://localhost:3000")]
    origin: String,

    /// First reconnect delay in milliseconds
    #[arg(long, env = "OVERLAY_BACKOFF_BASE_MS", default_value = "100")]
    backoff_base_ms: u64,

    /// Reconnect delay cap in milliseconds
    #[arg(long, env = "OVERLAY_BACKOFF_MAX_MS", default_value = "10000")]
    backoff_max_ms: u64,

    /// Delay after the first snapshot before follower notifications fire
    #[arg(long, env = "OVERLAY_SETTLE_MS", default_value = "100")]
    settle_ms: u64,

    /// Sound played for new followers
    #[arg(long, env = "OVERLAY_FOLLOWER_SOUND", default_value = DEFAULT_FOLLOWER_SOUND)]
    follower_sound: String,

    /// Ask the server to replay stored events after connecting
    #[arg(long, env = "OVERLAY_REPLAY")]
    replay: bool,
}

impl Args {
    fn into_config(self) -> Result<ClientConfig> {
        let backoff = BackoffPolicy::new(
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_millis(self.backoff_max_ms),
            DEFAULT_MULTIPLIER,
        )?;

        let config = ClientConfig {
            origin: self.origin,
            backoff,
            settle_delay: Duration::from_millis(self.settle_ms),
            clock_tick: DEFAULT_CLOCK_TICK,
            follower_sound: self.follower_sound,
            replay_on_connect: self.replay,
        };
        // Fail fast on a bad origin instead of inside the reconnect loop.
        config.endpoint().context("Invalid --origin")?;

        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let config = Args::parse().into_config()?;

    loop {
        let (client, handle) = OverlayClient::new(config.clone(), WsTransport, LogFrontend)?;
        info!(endpoint = %client.endpoint(), "📡 Following overlay stream");

        let watcher = tokio::spawn(log_view_changes(handle.subscribe()));

        let outcome = tokio::select! {
            outcome = client.run() => outcome,
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, shutting down");
                RunOutcome::Shutdown
            }
        };

        watcher.abort();
        drop(handle);

        match outcome {
            RunOutcome::Reload => {
                info!("♻️ Rebuilding client for new server version");
            }
            RunOutcome::Shutdown => break,
        }
    }

    Ok(())
}

/// Log connectivity and milestone changes as the view evolves.
async fn log_view_changes(mut view_rx: watch::Receiver<DashboardView>) {
    let mut offline = None;
    let mut milestones = None;

    while view_rx.changed().await.is_ok() {
        let view = view_rx.borrow_and_update().clone();

        let now_offline = view.indicators().contains(&Indicator::Offline);
        if offline != Some(now_offline) {
            if now_offline {
                warn!(
                    backoff_ms = view.connection.backoff.as_millis() as u64,
                    "⚠️ Overlay stream offline"
                );
            } else {
                info!("🟢 Overlay stream online");
            }
            offline = Some(now_offline);
        }

        let next = (view.next_followers(), view.next_subs());
        if view.snapshot.is_some() && milestones != Some(next) {
            debug!(
                clock = %view.clock_label(),
                next_followers = ?next.0,
                next_subs = ?next.1,
                "Milestones updated"
            );
            milestones = Some(next);
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "overlay_client=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // 1) Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // 2) Also try the crate-root .env when running with --manifest-path from elsewhere
    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}
