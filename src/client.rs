//! Overlay client driver.
//!
//! One task, one `select!` loop. It owns the connection, the dispatcher and
//! every timer (reconnect backoff, suppression settle, clock tick), so all
//! state changes happen sequentially on a single logical thread. Nothing
//! here returns transport errors: a failed attempt or a dropped stream
//! becomes a close, and the close becomes a scheduled reconnect.

use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Local};
use futures_util::future::BoxFuture;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, sleep, timeout, MissedTickBehavior, Sleep};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::connection::ConnectionManager;
use crate::dispatcher::{Dispatcher, Effect};
use crate::error::ClientError;
use crate::notify::Frontend;
use crate::protocol::ClientRequest;
use crate::transport::{Connection, Frame, Transport};
use crate::view::DashboardView;

const COMMAND_BUFFER: usize = 32;
/// Upper bound on any single outbound write made from the driver loop.
const SEND_TIMEOUT: Duration = Duration::from_secs(2);
/// Upper bound on the final close during shutdown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Requests accepted through a [`ClientHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand {
    /// Tear down the current connection (if any) and connect again.
    Restart,
    /// Ask the server to replay its stored events.
    RequestReplay,
    Shutdown,
}

/// Why [`OverlayClient::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum RunOutcome {
    /// A shutdown was requested or every handle was dropped.
    Shutdown,
    /// The server version changed; the host must build a fresh client.
    Reload,
}

/// Cloneable control and observation handle for a running client.
///
/// Dropping every handle stops the client.
#[derive(Clone)]
pub struct ClientHandle {
    command_tx: mpsc::Sender<ClientCommand>,
    view_rx: watch::Receiver<DashboardView>,
}

impl ClientHandle {
    pub async fn restart(&self) -> Result<(), ClientError> {
        self.send(ClientCommand::Restart).await
    }

    /// Queue a replay request; it is sent now if connected, otherwise on the next open.
    pub async fn request_replay(&self) -> Result<(), ClientError> {
        self.send(ClientCommand::RequestReplay).await
    }

    pub async fn shutdown(&self) -> Result<(), ClientError> {
        self.send(ClientCommand::Shutdown).await
    }

    /// Current view snapshot.
    pub fn view(&self) -> DashboardView {
        self.view_rx.borrow().clone()
    }

    /// Receiver notified on every view change.
    pub fn subscribe(&self) -> watch::Receiver<DashboardView> {
        self.view_rx.clone()
    }

    async fn send(&self, command: ClientCommand) -> Result<(), ClientError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| ClientError::Closed)
    }
}

enum Link<C> {
    Idle,
    Connecting {
        generation: u64,
        attempt: BoxFuture<'static, Result<C>>,
    },
    Open {
        generation: u64,
        conn: C,
    },
}

enum LinkEvent<C> {
    Attempted { generation: u64, result: Result<C> },
    Received { generation: u64, frame: Option<Result<Frame>> },
}

enum Step<C> {
    Link(LinkEvent<C>),
    Retry(u64),
    Settle,
    Tick,
    Command(Option<ClientCommand>),
}

pub struct OverlayClient<T: Transport, F: Frontend> {
    config: ClientConfig,
    endpoint: Url,
    transport: Arc<T>,
    frontend: F,
    connection: ConnectionManager,
    dispatcher: Dispatcher,
    view_tx: watch::Sender<DashboardView>,
    command_rx: mpsc::Receiver<ClientCommand>,
    link: Link<T::Connection>,
    retry: Option<(u64, Pin<Box<Sleep>>)>,
    settle: Option<Pin<Box<Sleep>>>,
    replay_pending: bool,
    now: DateTime<Local>,
}

impl<T: Transport, F: Frontend> OverlayClient<T, F> {
    pub fn new(
        config: ClientConfig,
        transport: T,
        frontend: F,
    ) -> Result<(Self, ClientHandle), ClientError> {
        let endpoint = config.endpoint()?;
        let connection = ConnectionManager::new(config.backoff);
        let dispatcher = Dispatcher::new(config.settle_delay, config.follower_sound.clone());
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let now = Local::now();
        let (view_tx, view_rx) = watch::channel(build_view(&connection, &dispatcher, now));

        let client = Self {
            replay_pending: config.replay_on_connect,
            config,
            endpoint,
            transport: Arc::new(transport),
            frontend,
            connection,
            dispatcher,
            view_tx,
            command_rx,
            link: Link::Idle,
            retry: None,
            settle: None,
            now,
        };

        Ok((
            client,
            ClientHandle {
                command_tx,
                view_rx,
            },
        ))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Drive the client until shutdown or a required reload.
    pub async fn run(mut self) -> RunOutcome {
        info!(endpoint = %self.endpoint, "🚀 Overlay client starting");

        let mut clock = interval(self.config.clock_tick);
        clock.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.start();
        self.publish();

        loop {
            let step = tokio::select! {
                event = next_link_event(&mut self.link) => Step::Link(event),
                generation = retry_elapsed(&mut self.retry) => Step::Retry(generation),
                _ = settle_elapsed(&mut self.settle) => Step::Settle,
                _ = clock.tick() => Step::Tick,
                command = self.command_rx.recv() => Step::Command(command),
            };

            let outcome = match step {
                Step::Link(LinkEvent::Attempted { generation, result }) => {
                    self.on_attempt(generation, result).await;
                    None
                }
                Step::Link(LinkEvent::Received { generation, frame }) => {
                    self.on_frame(generation, frame)
                }
                Step::Retry(generation) => {
                    self.retry = None;
                    if self.connection.retry_due(generation) {
                        self.start();
                    }
                    None
                }
                Step::Settle => {
                    self.settle = None;
                    self.dispatcher.lift_suppression();
                    None
                }
                Step::Tick => {
                    self.now = Local::now();
                    None
                }
                Step::Command(Some(ClientCommand::Restart)) => {
                    info!("Restart requested");
                    self.start();
                    None
                }
                Step::Command(Some(ClientCommand::RequestReplay)) => {
                    self.replay_pending = true;
                    self.flush_replay().await;
                    None
                }
                Step::Command(Some(ClientCommand::Shutdown)) | Step::Command(None) => {
                    Some(RunOutcome::Shutdown)
                }
            };

            self.publish();

            if let Some(outcome) = outcome {
                self.teardown().await;
                info!(?outcome, "Overlay client stopped");
                return outcome;
            }
        }
    }

    /// Discard whatever connection exists and begin a new attempt.
    fn start(&mut self) {
        let attempt = self.connection.start();
        self.retry = None;

        if let Link::Open { mut conn, generation } = std::mem::replace(&mut self.link, Link::Idle)
        {
            // The old stream is closed off-loop; a peer that stopped reading
            // must not hold up the new attempt.
            debug!(generation, "Closing replaced connection");
            tokio::spawn(async move {
                conn.close().await;
            });
        }

        let transport = Arc::clone(&self.transport);
        let endpoint = self.endpoint.clone();
        self.link = Link::Connecting {
            generation: attempt.generation,
            attempt: Box::pin(async move { transport.connect(&endpoint).await }),
        };
    }

    async fn on_attempt(&mut self, generation: u64, result: Result<T::Connection>) {
        self.link = Link::Idle;

        match result {
            Ok(conn) => {
                if self.connection.on_open(generation) {
                    self.link = Link::Open { generation, conn };
                    self.flush_replay().await;
                }
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Connection attempt failed");
                self.on_closed(generation);
            }
        }
    }

    fn on_frame(&mut self, generation: u64, frame: Option<Result<Frame>>) -> Option<RunOutcome> {
        match frame {
            Some(Ok(Frame::Text(text))) => {
                let effects = self.dispatcher.dispatch(&text);
                self.apply(effects)
            }
            Some(Ok(Frame::Binary(data))) => {
                warn!("Ignoring unexpected binary frame: {} bytes", data.len());
                None
            }
            Some(Err(e)) => {
                warn!(error = %format!("{e:#}"), "Overlay stream failed");
                self.on_closed(generation);
                None
            }
            None => {
                info!("Overlay stream ended, will reconnect...");
                self.on_closed(generation);
                None
            }
        }
    }

    fn on_closed(&mut self, generation: u64) {
        self.link = Link::Idle;

        if let Some(retry) = self.connection.on_close(generation) {
            warn!("Reconnecting in {:?}...", retry.delay);
            self.retry = Some((retry.generation, Box::pin(sleep(retry.delay))));
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) -> Option<RunOutcome> {
        let mut reload = false;

        for effect in effects {
            match effect {
                Effect::Notify(notification) => self.frontend.show_alert(&notification),
                Effect::PlaySound(url) => self.frontend.play_sound(&url),
                Effect::ScheduleSettle(delay) => {
                    if self.settle.is_none() {
                        self.settle = Some(Box::pin(sleep(delay)));
                    }
                }
                Effect::Reload => reload = true,
            }
        }

        if reload {
            self.frontend.reload();
            return Some(RunOutcome::Reload);
        }
        None
    }

    async fn flush_replay(&mut self) {
        if !self.replay_pending {
            return;
        }
        let Link::Open { conn, .. } = &mut self.link else {
            debug!("Replay request queued until the stream opens");
            return;
        };

        let frame = match ClientRequest::replay().to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Failed to encode replay request");
                return;
            }
        };

        match timeout(SEND_TIMEOUT, conn.send_text(frame)).await {
            Ok(Ok(())) => {
                info!("📼 Requested event replay");
                self.replay_pending = false;
            }
            // The read side reports the broken connection on its own.
            Ok(Err(e)) => warn!(error = %format!("{e:#}"), "Failed to request replay"),
            Err(_) => warn!(timeout = ?SEND_TIMEOUT, "Replay request timed out, will retry on next open"),
        }
    }

    async fn teardown(&mut self) {
        if let Link::Open { mut conn, .. } = std::mem::replace(&mut self.link, Link::Idle) {
            if timeout(CLOSE_TIMEOUT, conn.close()).await.is_err() {
                warn!(timeout = ?CLOSE_TIMEOUT, "Close handshake timed out, dropping connection");
            }
        }
        self.retry = None;
        self.settle = None;
    }

    fn publish(&self) {
        let next = build_view(&self.connection, &self.dispatcher, self.now);
        self.view_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

fn build_view(
    connection: &ConnectionManager,
    dispatcher: &Dispatcher,
    now: DateTime<Local>,
) -> DashboardView {
    DashboardView {
        connection: connection.state(),
        phase: connection.phase(),
        snapshot: dispatcher.store().snapshot().cloned(),
        suppressed: dispatcher.store().is_suppressed(),
        version: dispatcher.version().map(str::to_string),
        now,
    }
}

async fn next_link_event<C: Connection>(link: &mut Link<C>) -> LinkEvent<C> {
    match link {
        Link::Idle => pending().await,
        Link::Connecting {
            generation,
            attempt,
        } => LinkEvent::Attempted {
            generation: *generation,
            result: attempt.as_mut().await,
        },
        Link::Open { generation, conn } => LinkEvent::Received {
            generation: *generation,
            frame: conn.next_frame().await,
        },
    }
}

async fn retry_elapsed(retry: &mut Option<(u64, Pin<Box<Sleep>>)>) -> u64 {
    match retry {
        Some((generation, delay)) => {
            delay.as_mut().await;
            *generation
        }
        None => pending().await,
    }
}

async fn settle_elapsed(settle: &mut Option<Pin<Box<Sleep>>>) {
    match settle {
        Some(delay) => delay.as_mut().await,
        None => pending().await,
    }
}
