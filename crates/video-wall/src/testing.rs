//! Test doubles for driving the wall deterministically.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::oneshot;

use common::{Camera, CameraStatus};

use crate::quality::StreamSettings;
use crate::transport::{query_param, MediaTransport, StreamConnectFailure, Telemetry};

type ConnectResult = Result<Telemetry, StreamConnectFailure>;

struct PendingConnect {
    camera_id: String,
    url: String,
    reply: oneshot::Sender<ConnectResult>,
}

/// Transport whose connect attempts stay pending until the test resolves them.
#[derive(Default)]
pub struct ScriptedTransport {
    pending: Mutex<Vec<PendingConnect>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, Vec<PendingConnect>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of connect attempts started so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// URLs of attempts that are still waiting, oldest first.
    pub fn pending_urls(&self) -> Vec<String> {
        self.pending().iter().map(|p| p.url.clone()).collect()
    }

    /// Resolve the oldest pending attempt for `camera_id`. Returns false if none is waiting
    /// or the attempt was already cancelled.
    pub fn resolve(&self, camera_id: &str, result: ConnectResult) -> bool {
        let pending = {
            let mut pending = self.pending();
            match pending.iter().position(|p| p.camera_id == camera_id) {
                Some(pos) => pending.remove(pos),
                None => return false,
            }
        };
        pending.reply.send(result).is_ok()
    }

    pub fn succeed(&self, camera_id: &str) -> bool {
        self.resolve(camera_id, Ok(telemetry("1280x720")))
    }

    pub fn fail(&self, camera_id: &str, detail: &str) -> bool {
        self.resolve(camera_id, Err(StreamConnectFailure::new(detail)))
    }
}

#[async_trait]
impl MediaTransport for ScriptedTransport {
    fn build_stream_url(&self, camera_id: &str, settings: StreamSettings) -> String {
        format!(
            "scripted://{}?quality={}&bitrate={}",
            camera_id,
            settings.quality.label(),
            settings.bitrate_kbps
        )
    }

    async fn connect(&self, url: &str) -> ConnectResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let camera_id = url
            .trim_start_matches("scripted://")
            .split('?')
            .next()
            .unwrap_or_default()
            .to_string();
        let (reply, wait) = oneshot::channel();
        self.pending().push(PendingConnect {
            camera_id,
            url: url.to_string(),
            reply,
        });
        wait.await
            .unwrap_or_else(|_| Err(StreamConnectFailure::new("scripted attempt dropped")))
    }
}

pub fn telemetry(resolution: &str) -> Telemetry {
    Telemetry {
        bitrate_kbps: 2000,
        framerate: 25,
        resolution: resolution.to_string(),
        latency_ms: 80,
    }
}

/// Bitrate the scripted transport was asked for in `url`.
pub fn requested_bitrate(url: &str) -> Option<u32> {
    query_param(url, "bitrate").and_then(|v| v.parse().ok())
}

pub fn online(id: &str) -> Camera {
    Camera::new(id, format!("Camera {}", id), CameraStatus::Online)
}

pub fn offline(id: &str) -> Camera {
    Camera::new(id, format!("Camera {}", id), CameraStatus::Offline)
}
