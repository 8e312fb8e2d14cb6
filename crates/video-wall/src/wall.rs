//! Grid layout manager: keeps the slot assignment consistent with the layout,
//! the camera directory and operator edits, and owns one stream session per
//! occupied slot.
//!
//! All mutation goes through `VideoWall`. Change notifications are published
//! after the mutation completes, in ascending slot order.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use telemetry::metrics::{WALL_GRID_SIZE, WALL_SLOT_CHANGES, WALL_STALE_COMPLETIONS};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use common::Camera;

use crate::error::WallError;
use crate::grid::GridSize;
use crate::picker;
use crate::quality::{BitrateLevel, QualityPolicy, QualityPreset};
use crate::session::{Connector, RetryPolicy, SessionEvent, SessionState, StreamSession};
use crate::transport::{MediaTransport, Telemetry};

pub type SharedWall = Arc<Mutex<VideoWall>>;

/// What to do with a slot whose camera disappeared from the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StalePolicy {
    /// Keep showing it; the slot is flagged stale (status unknown).
    #[default]
    Keep,
    /// Clear the slot on the refresh that dropped the camera.
    Clear,
}

impl FromStr for StalePolicy {
    type Err = WallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keep" => Ok(StalePolicy::Keep),
            "clear" => Ok(StalePolicy::Clear),
            _ => Err(WallError::invalid("stale policy", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WallOptions {
    pub layout: GridSize,
    pub quality: QualityPolicy,
    pub retry: RetryPolicy,
    pub stale_policy: StalePolicy,
    pub event_capacity: usize,
}

impl Default for WallOptions {
    fn default() -> Self {
        Self {
            layout: GridSize::Quad,
            quality: QualityPolicy::default(),
            retry: RetryPolicy::manual_only(),
            stale_policy: StalePolicy::Keep,
            event_capacity: 256,
        }
    }
}

/// Render state of one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SlotView {
    Empty,
    Loading {
        camera: Camera,
        stale: bool,
    },
    Connected {
        camera: Camera,
        stale: bool,
        telemetry: Telemetry,
    },
    Failed {
        camera: Camera,
        stale: bool,
        error: String,
    },
}

impl SlotView {
    pub fn camera_id(&self) -> Option<&str> {
        match self {
            SlotView::Empty => None,
            SlotView::Loading { camera, .. }
            | SlotView::Connected { camera, .. }
            | SlotView::Failed { camera, .. } => Some(&camera.id),
        }
    }

    pub fn is_stale(&self) -> bool {
        match self {
            SlotView::Empty => false,
            SlotView::Loading { stale, .. }
            | SlotView::Connected { stale, .. }
            | SlotView::Failed { stale, .. } => *stale,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WallSnapshot {
    pub size: usize,
    pub rows: usize,
    pub cols: usize,
    pub quality: QualityPreset,
    pub bitrate_kbps: u32,
    pub bitrate_level: BitrateLevel,
    pub slots: Vec<SlotView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WallEvent {
    LayoutChanged {
        size: usize,
        rows: usize,
        cols: usize,
    },
    SlotChanged {
        index: usize,
        old_camera_id: Option<String>,
        new_camera_id: Option<String>,
    },
    SessionUpdated {
        index: usize,
        view: SlotView,
    },
    QualityChanged {
        preset: QualityPreset,
        bitrate_kbps: u32,
    },
    DirectoryRefreshed {
        cameras: usize,
        stale_slots: Vec<usize>,
    },
}

#[derive(Default)]
struct Slot {
    camera: Option<Camera>,
    session: Option<StreamSession>,
}

impl Slot {
    fn camera_id(&self) -> Option<&str> {
        self.camera.as_ref().map(|c| c.id.as_str())
    }
}

pub struct VideoWall {
    layout: GridSize,
    directory: Vec<Camera>,
    seeded: bool,
    slots: Vec<Slot>,
    quality: QualityPolicy,
    retry: RetryPolicy,
    stale_policy: StalePolicy,
    connector: Connector,
    events: broadcast::Sender<WallEvent>,
}

impl VideoWall {
    /// Build an empty wall. Session completions arrive on the returned
    /// receiver and must be fed back through [`VideoWall::handle_session_event`].
    pub fn new(
        options: WallOptions,
        transport: Arc<dyn MediaTransport>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (connector, session_events) = Connector::new(transport);
        let (events, _) = broadcast::channel(options.event_capacity.max(1));

        let mut slots = Vec::with_capacity(options.layout.slots());
        slots.resize_with(options.layout.slots(), Slot::default);
        WALL_GRID_SIZE.set(options.layout.slots() as i64);

        let wall = Self {
            layout: options.layout,
            directory: Vec::new(),
            seeded: false,
            slots,
            quality: options.quality,
            retry: options.retry,
            stale_policy: options.stale_policy,
            connector,
            events,
        };
        (wall, session_events)
    }

    pub fn into_shared(self) -> SharedWall {
        Arc::new(Mutex::new(self))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WallEvent> {
        self.events.subscribe()
    }

    pub fn layout(&self) -> GridSize {
        self.layout
    }

    pub fn quality(&self) -> &QualityPolicy {
        &self.quality
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn stale_policy(&self) -> StalePolicy {
        self.stale_policy
    }

    pub fn directory(&self) -> &[Camera] {
        &self.directory
    }

    /// Camera id per slot, row-major.
    pub fn assignment(&self) -> Vec<Option<&str>> {
        self.slots.iter().map(Slot::camera_id).collect()
    }

    pub fn camera_at(&self, index: usize) -> Option<&Camera> {
        self.slots.get(index).and_then(|s| s.camera.as_ref())
    }

    pub fn session(&self, index: usize) -> Option<&StreamSession> {
        self.slots.get(index).and_then(|s| s.session.as_ref())
    }

    pub fn slot_of(&self, camera_id: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.camera_id() == Some(camera_id))
    }

    // ------------------------------------------------------------------
    // Layout
    // ------------------------------------------------------------------

    /// Resize the grid to `size` slots (1, 4, 9 or 16).
    ///
    /// Shrinking drops trailing slots and their sessions. Growing pads the new
    /// slots with online cameras not yet on the wall, in directory order.
    /// Retained slots are never touched.
    pub fn set_grid_size(&mut self, size: usize) -> Result<(), WallError> {
        let layout = GridSize::try_from(size)?;
        if layout == self.layout {
            return Ok(());
        }

        let old_len = self.slots.len();
        let new_len = layout.slots();
        let mut dropped = Vec::new();

        if new_len < old_len {
            for (offset, mut slot) in self.slots.drain(new_len..).enumerate() {
                if let Some(mut session) = slot.session.take() {
                    session.stop();
                }
                if let Some(camera) = slot.camera.take() {
                    dropped.push((new_len + offset, camera.id));
                }
            }
        } else {
            self.slots.resize_with(new_len, Slot::default);
        }

        info!(from = old_len, to = new_len, layout = %layout.label(), "grid layout changed");
        self.layout = layout;
        WALL_GRID_SIZE.set(new_len as i64);
        self.publish(WallEvent::LayoutChanged {
            size: new_len,
            rows: layout.rows(),
            cols: layout.cols(),
        });

        for (index, camera_id) in dropped {
            WALL_SLOT_CHANGES.inc();
            self.publish(WallEvent::SlotChanged {
                index,
                old_camera_id: Some(camera_id),
                new_camera_id: None,
            });
        }

        for index in old_len..new_len {
            match self.next_unassigned_online() {
                Some(camera) => self.bind(index, camera),
                None => break,
            }
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Directory
    // ------------------------------------------------------------------

    /// Replace the known cameras. Returns the slots whose camera is no longer
    /// listed. With [`StalePolicy::Keep`] those slots stay assigned and are
    /// reported stale; with [`StalePolicy::Clear`] they are emptied.
    ///
    /// The first non-empty directory seeds every empty slot.
    pub fn refresh_directory(&mut self, cameras: Vec<Camera>) -> Vec<usize> {
        let was_stale: Vec<bool> = (0..self.slots.len())
            .map(|index| self.is_slot_stale(index))
            .collect();

        let mut seen = HashSet::new();
        self.directory = cameras
            .into_iter()
            .filter(|camera| seen.insert(camera.id.clone()))
            .collect();

        let mut stale = Vec::new();
        let mut updated = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(assigned) = slot.camera.as_mut() else {
                continue;
            };
            match self.directory.iter().find(|c| c.id == assigned.id) {
                Some(current) => {
                    if *assigned != *current || was_stale[index] {
                        *assigned = current.clone();
                        updated.push(index);
                    }
                }
                None => {
                    stale.push(index);
                    if !was_stale[index] {
                        updated.push(index);
                    }
                }
            }
        }

        let seeding = !self.seeded && !self.directory.is_empty();
        if seeding {
            self.seeded = true;
        }

        debug!(
            cameras = self.directory.len(),
            stale = stale.len(),
            seeding,
            "directory refreshed"
        );
        self.publish(WallEvent::DirectoryRefreshed {
            cameras: self.directory.len(),
            stale_slots: stale.clone(),
        });

        for index in 0..self.slots.len() {
            if stale.contains(&index) {
                match self.stale_policy {
                    StalePolicy::Keep => {
                        warn!(slot = index, camera_id = ?self.slots[index].camera_id(), "assigned camera missing from directory");
                    }
                    StalePolicy::Clear => {
                        info!(slot = index, camera_id = ?self.slots[index].camera_id(), "clearing slot for camera missing from directory");
                        self.unbind(index);
                    }
                }
            }
            // cleared slots were already published by unbind
            if updated.contains(&index) && self.slots[index].camera.is_some() {
                self.publish_view(index);
            }
            if seeding && self.slots[index].camera.is_none() {
                if let Some(camera) = self.next_unassigned_online() {
                    self.bind(index, camera);
                }
            }
        }

        stale
    }

    // ------------------------------------------------------------------
    // Slot edits
    // ------------------------------------------------------------------

    /// Put `camera` into slot `index`, replacing whatever stream was there.
    pub fn assign_slot(&mut self, index: usize, camera: Camera) -> Result<(), WallError> {
        self.check_index(index)?;
        if let Some(other) = self.slot_of(&camera.id) {
            if other == index {
                return Ok(());
            }
            return Err(WallError::DuplicateAssignment {
                camera_id: camera.id,
                slot: other,
            });
        }

        info!(slot = index, camera_id = %camera.id, "assigning camera to slot");
        self.bind(index, camera);
        Ok(())
    }

    /// [`VideoWall::assign_slot`] with the camera resolved from the directory.
    pub fn assign_camera(&mut self, index: usize, camera_id: &str) -> Result<(), WallError> {
        self.check_index(index)?;
        let camera = self
            .directory
            .iter()
            .find(|c| c.id == camera_id)
            .cloned()
            .ok_or_else(|| WallError::UnknownCamera {
                camera_id: camera_id.to_string(),
            })?;
        self.assign_slot(index, camera)
    }

    pub fn clear_slot(&mut self, index: usize) -> Result<(), WallError> {
        self.check_index(index)?;
        if self.unbind(index).is_some() {
            info!(slot = index, "slot cleared");
        }
        Ok(())
    }

    /// Cameras the picker may offer for slot `index`: everything not placed
    /// elsewhere, plus the slot's own camera.
    pub fn candidates_for(&self, index: usize, search_text: &str) -> Result<Vec<Camera>, WallError> {
        self.check_index(index)?;
        let own = self.slots[index].camera_id();
        let assignment = self.assignment();
        let query = picker::query(&self.directory, search_text);
        Ok(query
            .iter()
            .filter(|camera| {
                Some(camera.id.as_str()) == own
                    || !picker::is_assigned(&camera.id, assignment.iter().copied())
            })
            .cloned()
            .collect())
    }

    // ------------------------------------------------------------------
    // Quality
    // ------------------------------------------------------------------

    /// Select a preset by label ("480p", "720p", "1080p"). Resets the bitrate.
    pub fn set_preset(&mut self, preset: &str) -> Result<(), WallError> {
        let preset: QualityPreset = preset.parse()?;
        if self.quality.set_preset(preset) {
            self.on_quality_changed();
        }
        Ok(())
    }

    /// Override the bitrate in kbps without changing the preset label.
    pub fn set_bitrate_override(&mut self, kbps: u32) -> Result<(), WallError> {
        if self.quality.set_bitrate_override(kbps)? {
            self.on_quality_changed();
        }
        Ok(())
    }

    fn on_quality_changed(&mut self) {
        let settings = self.quality.settings();
        info!(
            preset = %settings.quality,
            bitrate_kbps = settings.bitrate_kbps,
            "wall quality changed"
        );
        self.publish(WallEvent::QualityChanged {
            preset: settings.quality,
            bitrate_kbps: settings.bitrate_kbps,
        });

        for index in 0..self.slots.len() {
            let active = self.slots[index]
                .session
                .as_ref()
                .is_some_and(|s| s.state().is_active());
            if active {
                self.restart_slot(index);
            }
        }
    }

    // ------------------------------------------------------------------
    // Stream lifecycle
    // ------------------------------------------------------------------

    /// Operator retry of a failed slot. Returns false if the slot is not failed.
    pub fn retry_slot(&mut self, index: usize) -> Result<bool, WallError> {
        self.check_index(index)?;
        let settings = self.quality.settings();
        let Some(session) = self.slots[index].session.as_mut() else {
            return Ok(false);
        };
        if !session.state().is_failed() {
            return Ok(false);
        }

        if session.settings() == settings {
            session.retry(&self.connector);
            self.publish_view(index);
        } else {
            // quality changed while failed; reconnect with the current settings
            self.restart_slot(index);
        }
        Ok(true)
    }

    /// Replace every occupied slot's session. Returns how many were restarted.
    pub fn restart_all(&mut self) -> usize {
        let mut restarted = 0;
        for index in 0..self.slots.len() {
            if self.slots[index].camera.is_some() {
                self.restart_slot(index);
                restarted += 1;
            }
        }
        info!(restarted, "restarted all streams");
        restarted
    }

    /// Feed a connect completion or retry timer back in. Returns whether it
    /// changed any slot; superseded events are dropped.
    pub fn handle_session_event(&mut self, event: SessionEvent) -> bool {
        let index = event.slot();
        let Some(session) = self.slots.get_mut(index).and_then(|s| s.session.as_mut()) else {
            debug!(slot = index, "session event for vacated slot discarded");
            if matches!(event, SessionEvent::Completed(_)) {
                WALL_STALE_COMPLETIONS.inc();
            }
            return false;
        };

        let applied = match event {
            SessionEvent::Completed(outcome) => {
                let applied = session.complete(outcome);
                if applied {
                    if let Some(delay) = session.schedule_retry(&self.connector, &self.retry) {
                        info!(
                            slot = index,
                            failures = session.failures(),
                            delay_ms = delay.as_millis() as u64,
                            "automatic retry scheduled"
                        );
                    }
                }
                applied
            }
            SessionEvent::RetryDue { generation, .. } => session.retry_due(generation, &self.connector),
        };

        if applied {
            self.publish_view(index);
        }
        applied
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    pub fn slot_view(&self, index: usize) -> Option<SlotView> {
        let slot = self.slots.get(index)?;
        let Some(camera) = slot.camera.as_ref() else {
            return Some(SlotView::Empty);
        };
        let stale = !self.directory.iter().any(|c| c.id == camera.id);
        let camera = camera.clone();

        Some(match slot.session.as_ref().map(StreamSession::state) {
            Some(SessionState::Connected { telemetry }) => SlotView::Connected {
                camera,
                stale,
                telemetry: telemetry.clone(),
            },
            Some(SessionState::Failed { error }) => SlotView::Failed {
                camera,
                stale,
                error: error.clone(),
            },
            _ => SlotView::Loading { camera, stale },
        })
    }

    pub fn snapshot(&self) -> WallSnapshot {
        WallSnapshot {
            size: self.layout.slots(),
            rows: self.layout.rows(),
            cols: self.layout.cols(),
            quality: self.quality.preset(),
            bitrate_kbps: self.quality.bitrate_kbps(),
            bitrate_level: self.quality.bitrate_level(),
            slots: (0..self.slots.len())
                .filter_map(|index| self.slot_view(index))
                .collect(),
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn is_slot_stale(&self, index: usize) -> bool {
        self.slots[index]
            .camera_id()
            .is_some_and(|id| !self.directory.iter().any(|c| c.id == id))
    }

    fn check_index(&self, index: usize) -> Result<(), WallError> {
        if index >= self.slots.len() {
            return Err(WallError::IndexOutOfRange {
                index,
                size: self.slots.len(),
            });
        }
        Ok(())
    }

    fn next_unassigned_online(&self) -> Option<Camera> {
        self.directory
            .iter()
            .find(|camera| camera.is_online() && self.slot_of(&camera.id).is_none())
            .cloned()
    }

    /// Tear down slot `index` and start a fresh session for `camera`.
    fn bind(&mut self, index: usize, camera: Camera) {
        let settings = self.quality.settings();
        let slot = &mut self.slots[index];
        if let Some(mut old) = slot.session.take() {
            old.stop();
        }
        let old_camera_id = slot.camera.take().map(|c| c.id);
        let new_camera_id = camera.id.clone();

        let mut session = StreamSession::new(index, camera.id.clone(), settings);
        session.start(&self.connector);
        slot.camera = Some(camera);
        slot.session = Some(session);

        WALL_SLOT_CHANGES.inc();
        self.publish(WallEvent::SlotChanged {
            index,
            old_camera_id,
            new_camera_id: Some(new_camera_id),
        });
        self.publish_view(index);
    }

    /// Empty slot `index`. Returns the camera id that was there.
    fn unbind(&mut self, index: usize) -> Option<String> {
        let slot = self.slots.get_mut(index)?;
        if let Some(mut session) = slot.session.take() {
            session.stop();
        }
        let old_camera_id = slot.camera.take()?.id;

        WALL_SLOT_CHANGES.inc();
        self.publish(WallEvent::SlotChanged {
            index,
            old_camera_id: Some(old_camera_id.clone()),
            new_camera_id: None,
        });
        self.publish_view(index);
        Some(old_camera_id)
    }

    /// Same camera, fresh session with the current quality.
    fn restart_slot(&mut self, index: usize) {
        let settings = self.quality.settings();
        let slot = &mut self.slots[index];
        let Some(camera_id) = slot.camera.as_ref().map(|c| c.id.clone()) else {
            return;
        };
        if let Some(mut old) = slot.session.take() {
            old.stop();
        }
        let mut session = StreamSession::new(index, camera_id, settings);
        session.start(&self.connector);
        slot.session = Some(session);
        self.publish_view(index);
    }

    fn publish_view(&self, index: usize) {
        if let Some(view) = self.slot_view(index) {
            self.publish(WallEvent::SessionUpdated { index, view });
        }
    }

    fn publish(&self, event: WallEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Drain session completions and retry timers into the shared wall.
pub fn spawn_session_pump(
    wall: SharedWall,
    mut session_events: mpsc::UnboundedReceiver<SessionEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = session_events.recv().await {
            wall.lock().await.handle_session_event(event);
        }
        debug!("session pump stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{offline, online, ScriptedTransport};
    use common::CameraStatus;

    fn wall_with(
        layout: GridSize,
        cameras: Vec<Camera>,
    ) -> (VideoWall, mpsc::UnboundedReceiver<SessionEvent>, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::new());
        let options = WallOptions {
            layout,
            ..WallOptions::default()
        };
        let (mut wall, rx) = VideoWall::new(options, transport.clone());
        wall.refresh_directory(cameras);
        (wall, rx, transport)
    }

    fn drain(rx: &mut broadcast::Receiver<WallEvent>) -> Vec<WallEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn mount_seeds_first_online_cameras() {
        let (wall, _rx, _t) = wall_with(
            GridSize::Quad,
            vec![online("A"), offline("B"), online("C"), online("D"), online("E")],
        );
        assert_eq!(
            wall.assignment(),
            vec![Some("A"), Some("C"), Some("D"), Some("E")]
        );
    }

    #[tokio::test]
    async fn rejects_invalid_grid_size_without_mutation() {
        let (mut wall, _rx, _t) = wall_with(GridSize::Quad, vec![online("A")]);
        let err = wall.set_grid_size(6).unwrap_err();
        assert_eq!(err, WallError::invalid("grid size", 6));
        assert_eq!(wall.layout(), GridSize::Quad);
        assert_eq!(wall.assignment().len(), 4);
    }

    #[tokio::test]
    async fn shrink_notifies_dropped_slots_in_order() {
        let cameras: Vec<Camera> = (0..9).map(|i| online(&format!("c{}", i))).collect();
        let (mut wall, _rx, _t) = wall_with(GridSize::Nine, cameras);
        let mut events = wall.subscribe();

        wall.set_grid_size(4).unwrap();

        let changes: Vec<usize> = drain(&mut events)
            .into_iter()
            .filter_map(|e| match e {
                WallEvent::SlotChanged {
                    index,
                    new_camera_id: None,
                    ..
                } => Some(index),
                _ => None,
            })
            .collect();
        assert_eq!(changes, vec![4, 5, 6, 7, 8]);
    }

    #[tokio::test]
    async fn same_camera_same_slot_is_a_no_op() {
        let (mut wall, _rx, transport) = wall_with(GridSize::Single, vec![online("A")]);
        let generation = wall.session(0).unwrap().generation();
        wall.assign_camera(0, "A").unwrap();
        assert_eq!(wall.session(0).unwrap().generation(), generation);
        tokio::task::yield_now().await;
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn unknown_camera_is_rejected() {
        let (mut wall, _rx, _t) = wall_with(GridSize::Quad, vec![online("A")]);
        assert_eq!(
            wall.assign_camera(1, "Z"),
            Err(WallError::UnknownCamera {
                camera_id: "Z".into()
            })
        );
        assert_eq!(
            wall.assign_camera(4, "A"),
            Err(WallError::IndexOutOfRange { index: 4, size: 4 })
        );
    }

    #[tokio::test]
    async fn clear_policy_empties_stale_slots() {
        let transport = Arc::new(ScriptedTransport::new());
        let options = WallOptions {
            stale_policy: StalePolicy::Clear,
            ..WallOptions::default()
        };
        let (mut wall, _rx) = VideoWall::new(options, transport);
        wall.refresh_directory(vec![online("A"), online("B")]);

        let stale = wall.refresh_directory(vec![online("B")]);
        assert_eq!(stale, vec![0]);
        assert_eq!(wall.assignment(), vec![None, Some("B"), None, None]);
    }

    fn updated_views(rx: &mut broadcast::Receiver<WallEvent>) -> Vec<(usize, SlotView)> {
        drain(rx)
            .into_iter()
            .filter_map(|e| match e {
                WallEvent::SessionUpdated { index, view } => Some((index, view)),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn refresh_publishes_changed_and_stale_slots_only() {
        let (mut wall, _rx, _t) = wall_with(GridSize::Quad, vec![online("A"), online("B")]);
        let mut events = wall.subscribe();
        let renamed = Camera::new("A", "Gate", CameraStatus::Online);

        wall.refresh_directory(vec![renamed.clone(), online("B")]);
        let views = updated_views(&mut events);
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].0, 0);
        assert!(matches!(&views[0].1, SlotView::Loading { camera, stale: false } if camera.name == "Gate"));

        wall.refresh_directory(vec![renamed.clone()]);
        let views = updated_views(&mut events);
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].0, 1);
        assert!(views[0].1.is_stale());

        // nothing changed
        wall.refresh_directory(vec![renamed.clone()]);
        assert!(updated_views(&mut events).is_empty());

        wall.refresh_directory(vec![renamed, online("B")]);
        let views = updated_views(&mut events);
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].0, 1);
        assert!(!views[0].1.is_stale());
    }

    #[tokio::test]
    async fn keep_policy_flags_stale_slots() {
        let (mut wall, _rx, _t) = wall_with(GridSize::Quad, vec![online("A"), online("B")]);
        let stale = wall.refresh_directory(vec![online("B")]);
        assert_eq!(stale, vec![0]);
        assert_eq!(wall.assignment(), vec![Some("A"), Some("B"), None, None]);
        assert!(wall.slot_view(0).unwrap().is_stale());
        assert!(!wall.slot_view(1).unwrap().is_stale());
    }

    #[tokio::test]
    async fn later_refreshes_do_not_refill_cleared_slots() {
        let (mut wall, _rx, _t) = wall_with(GridSize::Quad, vec![online("A"), online("B")]);
        wall.clear_slot(0).unwrap();
        wall.refresh_directory(vec![online("A"), online("B"), online("C")]);
        assert_eq!(wall.assignment(), vec![None, Some("B"), None, None]);
    }

    #[tokio::test]
    async fn candidates_exclude_cameras_placed_elsewhere() {
        let (wall, _rx, _t) = wall_with(
            GridSize::Quad,
            vec![online("A"), online("B"), offline("C")],
        );
        let ids: Vec<String> = wall
            .candidates_for(0, "")
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["A", "C"]);

        let ids: Vec<String> = wall
            .candidates_for(2, "camera")
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["C"]);
    }

    #[tokio::test]
    async fn snapshot_reports_layout_and_quality() {
        let (mut wall, _rx, _t) = wall_with(GridSize::Nine, vec![online("A")]);
        wall.set_bitrate_override(6000).unwrap();
        let snapshot = wall.snapshot();
        assert_eq!((snapshot.rows, snapshot.cols, snapshot.size), (3, 3, 9));
        assert_eq!(snapshot.quality, QualityPreset::Hd720);
        assert_eq!(snapshot.bitrate_kbps, 6000);
        assert_eq!(snapshot.bitrate_level, BitrateLevel::High);
        assert_eq!(snapshot.slots.len(), 9);
        assert!(matches!(snapshot.slots[0], SlotView::Loading { .. }));
        assert_eq!(snapshot.slots[1], SlotView::Empty);
    }
}
