//! Connect lifecycle of the feed shown in one grid slot.
//!
//! ```text
//! Idle -> Loading -> Connected
//!                 -> Failed --retry--> Loading
//! any  -> Stopped
//! ```
//!
//! Every start issues a fresh generation tag. A completion is honored only
//! while the session is still `Loading` under that same generation, so a
//! completion that races with `stop()` or with a newer start is dropped.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry::metrics::{
    WALL_ACTIVE_SESSIONS, WALL_CONNECT_ATTEMPTS, WALL_CONNECT_DURATION, WALL_STALE_COMPLETIONS,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::quality::StreamSettings;
use crate::transport::{MediaTransport, StreamConnectFailure, Telemetry};

pub type Generation = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Loading,
    Connected { telemetry: Telemetry },
    Failed { error: String },
    Stopped,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Loading | SessionState::Connected { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SessionState::Failed { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Loading => "loading",
            SessionState::Connected { .. } => "connected",
            SessionState::Failed { .. } => "failed",
            SessionState::Stopped => "stopped",
        }
    }
}

#[derive(Debug)]
pub struct ConnectOutcome {
    pub slot: usize,
    pub generation: Generation,
    pub result: Result<Telemetry, StreamConnectFailure>,
    pub elapsed: Duration,
}

/// Delivered back to the wall from connect tasks and retry timers.
#[derive(Debug)]
pub enum SessionEvent {
    Completed(ConnectOutcome),
    RetryDue { slot: usize, generation: Generation },
}

impl SessionEvent {
    pub fn slot(&self) -> usize {
        match self {
            SessionEvent::Completed(outcome) => outcome.slot,
            SessionEvent::RetryDue { slot, .. } => *slot,
        }
    }
}

/// Automatic retry after a failed connect. `max_retries == 0` leaves every
/// retry to the operator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_start_ms: u64,
    pub backoff_max_ms: u64,
}

impl RetryPolicy {
    pub fn manual_only() -> Self {
        Self {
            max_retries: 0,
            backoff_start_ms: 500,
            backoff_max_ms: 10_000,
        }
    }

    /// Whether another automatic attempt is allowed after `failures` consecutive failures.
    pub fn allows(&self, failures: u32) -> bool {
        failures > 0 && failures <= self.max_retries
    }

    /// Delay before the automatic attempt following failure number `failures`.
    pub fn backoff(&self, failures: u32) -> Duration {
        let shift = failures.saturating_sub(1).min(20);
        let ms = self
            .backoff_start_ms
            .saturating_mul(1u64 << shift)
            .min(self.backoff_max_ms);
        Duration::from_millis(ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::manual_only()
    }
}

/// Spawns connect attempts and retry timers, reporting back on one channel.
#[derive(Clone)]
pub struct Connector {
    transport: Arc<dyn MediaTransport>,
    events: mpsc::UnboundedSender<SessionEvent>,
    generations: Arc<AtomicU64>,
}

impl Connector {
    pub fn new(transport: Arc<dyn MediaTransport>) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let connector = Self {
            transport,
            events,
            generations: Arc::new(AtomicU64::new(0)),
        };
        (connector, rx)
    }

    pub fn transport(&self) -> &Arc<dyn MediaTransport> {
        &self.transport
    }

    fn next_generation(&self) -> Generation {
        self.generations.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn spawn_connect(&self, slot: usize, generation: Generation, url: String) -> JoinHandle<()> {
        let transport = Arc::clone(&self.transport);
        let events = self.events.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let result = transport.connect(&url).await;
            let outcome = ConnectOutcome {
                slot,
                generation,
                result,
                elapsed: started.elapsed(),
            };
            // receiver gone means the wall itself was dropped
            let _ = events.send(SessionEvent::Completed(outcome));
        })
    }

    fn spawn_retry_timer(&self, slot: usize, generation: Generation, delay: Duration) -> JoinHandle<()> {
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(SessionEvent::RetryDue { slot, generation });
        })
    }
}

/// One slot's stream. Replaced, never rebound, when the slot's camera or the
/// wall quality changes.
pub struct StreamSession {
    slot: usize,
    camera_id: String,
    settings: StreamSettings,
    generation: Generation,
    state: SessionState,
    failures: u32,
    url: Option<String>,
    task: Option<JoinHandle<()>>,
}

impl StreamSession {
    pub fn new(slot: usize, camera_id: impl Into<String>, settings: StreamSettings) -> Self {
        WALL_ACTIVE_SESSIONS.inc();
        Self {
            slot,
            camera_id: camera_id.into(),
            settings,
            generation: 0,
            state: SessionState::Idle,
            failures: 0,
            url: None,
            task: None,
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    pub fn settings(&self) -> StreamSettings {
        self.settings
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn telemetry(&self) -> Option<&Telemetry> {
        match &self.state {
            SessionState::Connected { telemetry } => Some(telemetry),
            _ => None,
        }
    }

    /// Consecutive failed attempts since the last success or manual retry.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// URL of the most recent connect attempt.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Idle/Failed -> Loading. Returns false from any other state.
    pub fn start(&mut self, connector: &Connector) -> bool {
        if !matches!(self.state, SessionState::Idle | SessionState::Failed { .. }) {
            debug!(slot = self.slot, state = self.state.name(), "start ignored");
            return false;
        }

        self.abort_task();
        let generation = connector.next_generation();
        let url = connector
            .transport()
            .build_stream_url(&self.camera_id, self.settings);

        info!(
            slot = self.slot,
            camera_id = %self.camera_id,
            generation,
            quality = %self.settings.quality,
            bitrate_kbps = self.settings.bitrate_kbps,
            "connecting stream"
        );

        self.generation = generation;
        self.state = SessionState::Loading;
        self.task = Some(connector.spawn_connect(self.slot, generation, url.clone()));
        self.url = Some(url);
        true
    }

    /// Operator retry. Only valid from Failed; resets the automatic retry budget.
    pub fn retry(&mut self, connector: &Connector) -> bool {
        if !self.state.is_failed() {
            return false;
        }
        self.failures = 0;
        self.start(connector)
    }

    /// Tear down. No completion is honored afterwards.
    pub fn stop(&mut self) {
        if self.state == SessionState::Stopped {
            return;
        }
        self.abort_task();
        debug!(
            slot = self.slot,
            camera_id = %self.camera_id,
            generation = self.generation,
            from = self.state.name(),
            "stream session stopped"
        );
        self.state = SessionState::Stopped;
    }

    /// Apply a connect completion. Returns false if it was stale and discarded.
    pub fn complete(&mut self, outcome: ConnectOutcome) -> bool {
        if outcome.generation != self.generation || self.state != SessionState::Loading {
            debug!(
                slot = self.slot,
                generation = outcome.generation,
                current = self.generation,
                state = self.state.name(),
                "discarding stale connect completion"
            );
            WALL_STALE_COMPLETIONS.inc();
            return false;
        }

        self.task = None;
        WALL_CONNECT_DURATION.observe(outcome.elapsed.as_secs_f64());

        match outcome.result {
            Ok(telemetry) => {
                WALL_CONNECT_ATTEMPTS.with_label_values(&["connected"]).inc();
                info!(
                    slot = self.slot,
                    camera_id = %self.camera_id,
                    generation = self.generation,
                    resolution = %telemetry.resolution,
                    latency_ms = telemetry.latency_ms,
                    "stream connected"
                );
                self.failures = 0;
                self.state = SessionState::Connected { telemetry };
            }
            Err(failure) => {
                WALL_CONNECT_ATTEMPTS.with_label_values(&["failed"]).inc();
                self.failures += 1;
                warn!(
                    slot = self.slot,
                    camera_id = %self.camera_id,
                    generation = self.generation,
                    failures = self.failures,
                    error = %failure.detail,
                    "stream connect failed"
                );
                self.state = SessionState::Failed {
                    error: failure.detail,
                };
            }
        }
        true
    }

    /// Arm an automatic retry if the policy still allows one. Returns the delay.
    pub fn schedule_retry(&mut self, connector: &Connector, policy: &RetryPolicy) -> Option<Duration> {
        if !self.state.is_failed() || !policy.allows(self.failures) {
            return None;
        }
        let delay = policy.backoff(self.failures);
        self.abort_task();
        self.task = Some(connector.spawn_retry_timer(self.slot, self.generation, delay));
        Some(delay)
    }

    /// Fire an armed automatic retry. Stale timers are ignored.
    pub fn retry_due(&mut self, generation: Generation, connector: &Connector) -> bool {
        if generation != self.generation || !self.state.is_failed() {
            debug!(slot = self.slot, generation, "discarding stale retry timer");
            return false;
        }
        self.task = None;
        self.start(connector)
    }

    fn abort_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.abort_task();
        WALL_ACTIVE_SESSIONS.dec();
    }
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("slot", &self.slot)
            .field("camera_id", &self.camera_id)
            .field("settings", &self.settings)
            .field("generation", &self.generation)
            .field("state", &self.state)
            .field("failures", &self.failures)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::QualityPreset;
    use crate::testing::{telemetry, ScriptedTransport};

    fn settings() -> StreamSettings {
        StreamSettings {
            quality: QualityPreset::Hd720,
            bitrate_kbps: 2048,
        }
    }

    fn connector() -> (Arc<ScriptedTransport>, Connector, mpsc::UnboundedReceiver<SessionEvent>) {
        let transport = Arc::new(ScriptedTransport::new());
        let (connector, rx) = Connector::new(transport.clone());
        (transport, connector, rx)
    }

    async fn next_outcome(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> ConnectOutcome {
        match rx.recv().await {
            Some(SessionEvent::Completed(outcome)) => outcome,
            other => panic!("expected completion, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn start_then_connect() {
        let (transport, connector, mut rx) = connector();
        let mut session = StreamSession::new(0, "A", settings());
        assert_eq!(session.state(), &SessionState::Idle);

        assert!(session.start(&connector));
        assert_eq!(session.state(), &SessionState::Loading);
        assert_eq!(
            session.url(),
            Some("scripted://A?quality=720p&bitrate=2048")
        );

        tokio::task::yield_now().await;
        assert!(transport.succeed("A"));
        let outcome = next_outcome(&mut rx).await;
        assert_eq!(outcome.generation, session.generation());
        assert!(session.complete(outcome));
        assert_eq!(session.telemetry(), Some(&telemetry("1280x720")));

        // already connected
        assert!(!session.start(&connector));
    }

    #[tokio::test]
    async fn failure_is_state_not_error() {
        let (transport, connector, mut rx) = connector();
        let mut session = StreamSession::new(3, "B", settings());
        session.start(&connector);

        tokio::task::yield_now().await;
        transport.fail("B", "gateway timeout");
        assert!(session.complete(next_outcome(&mut rx).await));
        assert_eq!(
            session.state(),
            &SessionState::Failed {
                error: "gateway timeout".into()
            }
        );
        assert_eq!(session.failures(), 1);
        assert!(session.telemetry().is_none());
    }

    #[tokio::test]
    async fn stop_discards_late_completion() {
        let (transport, connector, mut rx) = connector();
        let mut session = StreamSession::new(0, "A", settings());
        session.start(&connector);
        let generation = session.generation();

        session.stop();
        assert_eq!(session.state(), &SessionState::Stopped);

        let late = ConnectOutcome {
            slot: 0,
            generation,
            result: Ok(telemetry("1920x1080")),
            elapsed: Duration::from_millis(900),
        };
        assert!(!session.complete(late));
        assert_eq!(session.state(), &SessionState::Stopped);

        // the aborted attempt never reports back
        tokio::task::yield_now().await;
        transport.succeed("A");
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn retry_only_from_failed_and_uses_new_generation() {
        let (transport, connector, mut rx) = connector();
        let mut session = StreamSession::new(1, "C", settings());
        assert!(!session.retry(&connector));

        session.start(&connector);
        let first = session.generation();
        assert!(!session.retry(&connector));

        tokio::task::yield_now().await;
        transport.fail("C", "refused");
        session.complete(next_outcome(&mut rx).await);

        assert!(session.retry(&connector));
        assert_eq!(session.state(), &SessionState::Loading);
        assert!(session.generation() > first);
        assert_eq!(session.failures(), 0);

        let stale = ConnectOutcome {
            slot: 1,
            generation: first,
            result: Ok(telemetry("640x480")),
            elapsed: Duration::ZERO,
        };
        assert!(!session.complete(stale));
        assert_eq!(session.state(), &SessionState::Loading);
    }

    #[tokio::test]
    async fn automatic_retry_respects_budget() {
        let (transport, connector, mut rx) = connector();
        let policy = RetryPolicy {
            max_retries: 1,
            backoff_start_ms: 1,
            backoff_max_ms: 5,
        };
        let mut session = StreamSession::new(0, "D", settings());
        session.start(&connector);

        tokio::task::yield_now().await;
        transport.fail("D", "first");
        session.complete(next_outcome(&mut rx).await);
        assert_eq!(
            session.schedule_retry(&connector, &policy),
            Some(Duration::from_millis(1))
        );

        match rx.recv().await {
            Some(SessionEvent::RetryDue { generation, .. }) => {
                assert!(session.retry_due(generation, &connector));
            }
            other => panic!("expected retry timer, got {:?}", other),
        }
        assert_eq!(session.state(), &SessionState::Loading);

        tokio::task::yield_now().await;
        transport.fail("D", "second");
        session.complete(next_outcome(&mut rx).await);
        assert_eq!(session.failures(), 2);
        assert_eq!(session.schedule_retry(&connector, &policy), None);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            backoff_start_ms: 500,
            backoff_max_ms: 3_000,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2_000));
        assert_eq!(policy.backoff(4), Duration::from_millis(3_000));
        assert_eq!(policy.backoff(60), Duration::from_millis(3_000));
        assert!(!RetryPolicy::manual_only().allows(1));
    }
}
