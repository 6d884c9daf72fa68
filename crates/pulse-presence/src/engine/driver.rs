//! Async driver: one actor task per running engine.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use pulse_common::ParticipantId;

use crate::clock::{Clock, MonotonicClock, Timestamp};
use crate::protocol::Announcement;
use crate::sink::SinkRegistry;
use crate::store::PresenceStore;
use crate::transport::{ChannelTransport, TransportError};

use super::tracker::PresenceTracker;
use super::types::{EngineConfig, EngineError};

const COMMAND_CAPACITY: usize = 1024;

enum EngineCommand {
    Announcement {
        identity: ParticipantId,
        at: Timestamp,
    },
    Roster(oneshot::Sender<Vec<ParticipantId>>),
    Stop,
}

struct Running {
    local: ParticipantId,
    command_tx: mpsc::Sender<EngineCommand>,
    handle: JoinHandle<PresenceStore>,
}

/// Presence engine with an explicit start/stop lifecycle.
///
/// While running, a background task publishes the local announcement every
/// `announce_interval` (first one interval after start), sweeps stale
/// participants right after, and applies announcements arriving on the
/// presence channel. Events go to the shared [`SinkRegistry`].
pub struct PresenceEngine {
    transport: Arc<dyn ChannelTransport>,
    sinks: Arc<SinkRegistry>,
    clock: Arc<dyn Clock>,
    running: Option<Running>,
    /// Roster left behind by the last run.
    last_roster: PresenceStore,
}

impl PresenceEngine {
    pub fn new(transport: Arc<dyn ChannelTransport>, sinks: Arc<SinkRegistry>) -> Self {
        Self::with_clock(transport, sinks, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(
        transport: Arc<dyn ChannelTransport>,
        sinks: Arc<SinkRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            transport,
            sinks,
            clock,
            running: None,
            last_roster: PresenceStore::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Current time on the engine's clock.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Local identity of the current run.
    pub fn local(&self) -> Option<&ParticipantId> {
        self.running.as_ref().map(|r| &r.local)
    }

    /// Start announcing as `local`. Must be called inside a tokio runtime.
    ///
    /// Every run starts from an empty roster.
    pub fn start(&mut self, local: ParticipantId, config: EngineConfig) -> Result<(), EngineError> {
        if self.running.is_some() {
            return Err(EngineError::AlreadyRunning);
        }
        config.validate()?;

        let inbound = self.transport.subscribe(&config.channel);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let tracker = PresenceTracker::new(local.clone(), &config);
        self.last_roster.clear();

        info!(
            local = %local,
            channel = %config.channel,
            interval_ms = config.announce_interval.as_millis() as u64,
            stale_ms = config.stale_threshold_ms,
            "Presence engine starting"
        );

        let handle = tokio::spawn(run(
            tracker,
            config,
            Arc::clone(&self.transport),
            Arc::clone(&self.sinks),
            Arc::clone(&self.clock),
            command_rx,
            inbound,
        ));

        self.running = Some(Running {
            local,
            command_tx,
            handle,
        });
        Ok(())
    }

    /// Feed an announcement heard at `at` from outside the presence channel.
    ///
    /// A no-op while stopped.
    pub fn on_announcement(&self, identity: ParticipantId, at: Timestamp) {
        let Some(running) = &self.running else {
            debug!(identity = %identity, "Engine stopped, ignoring announcement");
            return;
        };
        match running
            .command_tx
            .try_send(EngineCommand::Announcement { identity, at })
        {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Presence engine backlog full, dropping announcement");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Presence engine task gone, ignoring announcement");
            }
        }
    }

    /// Participants currently believed online (sorted).
    ///
    /// While stopped, this is the roster the last run ended with.
    pub async fn roster(&self) -> Vec<ParticipantId> {
        let Some(running) = &self.running else {
            return self.last_roster.identities();
        };
        let (reply_tx, reply_rx) = oneshot::channel();
        if running
            .command_tx
            .send(EngineCommand::Roster(reply_tx))
            .await
            .is_err()
        {
            return Vec::new();
        }
        reply_rx.await.unwrap_or_default()
    }

    /// Stop the engine and wait for its task to finish.
    ///
    /// Once this returns no further ticks run and no further events are
    /// emitted. The final roster stays available through [`Self::last_roster`].
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        // Ignored if the task already exited; the join below still fences it.
        let _ = running.command_tx.send(EngineCommand::Stop).await;
        match running.handle.await {
            Ok(store) => self.last_roster = store,
            Err(e) => error!(error = %e, "Presence engine task failed"),
        }
        info!(local = %running.local, "Presence engine stopped");
    }

    pub fn last_roster(&self) -> &PresenceStore {
        &self.last_roster
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

async fn run(
    mut tracker: PresenceTracker,
    config: EngineConfig,
    transport: Arc<dyn ChannelTransport>,
    sinks: Arc<SinkRegistry>,
    clock: Arc<dyn Clock>,
    mut commands: mpsc::Receiver<EngineCommand>,
    mut inbound: mpsc::Receiver<serde_json::Value>,
) -> PresenceStore {
    let period = config.announce_interval;
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut inbound_open = true;

    loop {
        // A due tick goes first so a busy inbound queue cannot hold it off.
        tokio::select! {
            biased;

            _ = ticker.tick() => {
                let now = clock.now();
                // Announcements already queued count for this sweep; the
                // snapshot bounds the work.
                for _ in 0..inbound.len() {
                    match inbound.try_recv() {
                        Ok(payload) => apply_inbound(&mut tracker, &sinks, &payload, now),
                        Err(_) => break,
                    }
                }
                tick(&mut tracker, &config.channel, transport.as_ref(), &sinks, now);
            }

            cmd = commands.recv() => match cmd {
                Some(EngineCommand::Announcement { identity, at }) => {
                    observe(&mut tracker, &sinks, &identity, at);
                }
                Some(EngineCommand::Roster(reply)) => {
                    let _ = reply.send(tracker.store().identities());
                }
                Some(EngineCommand::Stop) | None => break,
            },

            payload = inbound.recv(), if inbound_open => match payload {
                Some(payload) => apply_inbound(&mut tracker, &sinks, &payload, clock.now()),
                None => {
                    warn!(channel = %config.channel, "Presence subscription closed");
                    inbound_open = false;
                }
            },
        }
    }

    tracker.into_store()
}

fn apply_inbound(
    tracker: &mut PresenceTracker,
    sinks: &SinkRegistry,
    payload: &serde_json::Value,
    now: Timestamp,
) {
    match Announcement::decode(payload) {
        Ok(announcement) => observe(tracker, sinks, &announcement.user, now),
        Err(e) => warn!(error = %e, payload = %payload, "Dropping malformed announcement"),
    }
}

fn observe(
    tracker: &mut PresenceTracker,
    sinks: &SinkRegistry,
    identity: &ParticipantId,
    at: Timestamp,
) {
    if let Some(event) = tracker.on_announcement(identity, at) {
        info!(identity = %identity, "Participant joined");
        sinks.emit(event);
    }
}

/// Announce, then sweep. A failed announcement never skips the sweep.
fn tick(
    tracker: &mut PresenceTracker,
    channel: &str,
    transport: &dyn ChannelTransport,
    sinks: &SinkRegistry,
    now: Timestamp,
) {
    match tracker.self_announcement().encode() {
        Ok(payload) => match transport.publish(channel, payload) {
            Ok(()) => {}
            Err(TransportError::NotConnected) => {
                debug!("Not connected, skipping announcement");
            }
            Err(e) => warn!(error = %e, "Failed to publish announcement"),
        },
        Err(e) => warn!(error = %e, "Failed to encode announcement"),
    }

    let departures = tracker.sweep(now);
    if !departures.is_empty() {
        debug!(count = departures.len(), now, "Swept stale participants");
    }
    for event in departures {
        info!(?event, "Participant left");
        sinks.emit(event);
    }
}
