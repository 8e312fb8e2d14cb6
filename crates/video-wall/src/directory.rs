use anyhow::{Context, Result};
use async_trait::async_trait;
use common::{validation, Camera, CameraPage, CameraStatus};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::wall::SharedWall;

/// Camera inventory collaborator. Must be idempotent and safe to poll.
#[async_trait]
pub trait CameraDirectory: Send + Sync {
    async fn list_cameras(&self, status: Option<CameraStatus>) -> Result<Vec<Camera>>;
}

/// Reads the camera inventory API (`GET /api/cameras?status=...`).
pub struct HttpCameraDirectory {
    client: Client,
    base_url: String,
}

impl HttpCameraDirectory {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl CameraDirectory for HttpCameraDirectory {
    async fn list_cameras(&self, status: Option<CameraStatus>) -> Result<Vec<Camera>> {
        let url = format!("{}/api/cameras", self.base_url);
        let mut request = self.client.get(&url);
        if let Some(status) = status {
            request = request.query(&[("status", status.as_str())]);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("camera directory unavailable at {}", url))?
            .error_for_status()
            .context("camera directory rejected listing")?;

        let page: CameraPage = response
            .json()
            .await
            .context("failed to parse camera listing")?;
        Ok(page.content)
    }
}

/// In-memory directory, for demos and tests.
#[derive(Default)]
pub struct StaticDirectory {
    cameras: RwLock<Vec<Camera>>,
}

impl StaticDirectory {
    pub fn new(cameras: Vec<Camera>) -> Self {
        Self {
            cameras: RwLock::new(cameras),
        }
    }

    pub async fn replace(&self, cameras: Vec<Camera>) {
        *self.cameras.write().await = cameras;
    }
}

#[async_trait]
impl CameraDirectory for StaticDirectory {
    async fn list_cameras(&self, status: Option<CameraStatus>) -> Result<Vec<Camera>> {
        let cameras = self.cameras.read().await;
        Ok(cameras
            .iter()
            .filter(|c| status.map_or(true, |s| c.status == s))
            .cloned()
            .collect())
    }
}

/// Drop entries whose id cannot go into a stream URL or that have no usable name.
fn addressable(cameras: Vec<Camera>) -> Vec<Camera> {
    cameras
        .into_iter()
        .filter(|camera| {
            match validation::validate_id(&camera.id, "camera id")
                .and_then(|_| validation::validate_name(&camera.name, "camera name"))
            {
                Ok(()) => true,
                Err(e) => {
                    warn!(camera_id = %camera.id, "ignoring directory entry: {}", e);
                    false
                }
            }
        })
        .collect()
}

/// Periodically pulls the directory into the wall. The only writer of the
/// wall's directory snapshot.
pub struct DirectoryPoller {
    directory: Arc<dyn CameraDirectory>,
    wall: SharedWall,
    interval: Duration,
    status_filter: Option<CameraStatus>,
}

impl DirectoryPoller {
    pub fn new(
        directory: Arc<dyn CameraDirectory>,
        wall: SharedWall,
        interval: Duration,
        status_filter: Option<CameraStatus>,
    ) -> Self {
        Self {
            directory,
            wall,
            interval,
            status_filter,
        }
    }

    /// Run one refresh. Returns the number of cameras accepted.
    pub async fn refresh_once(&self) -> Result<usize> {
        let cameras = addressable(self.directory.list_cameras(self.status_filter).await?);
        let count = cameras.len();
        self.wall.lock().await.refresh_directory(cameras);
        Ok(count)
    }

    /// Start the refresh loop
    pub async fn run(self) {
        info!(interval_secs = self.interval.as_secs(), "directory poller started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.refresh_once().await {
                Ok(0) => warn!("camera directory returned no cameras"),
                Ok(_) => {}
                Err(e) => error!("directory refresh failed: {:#}", e),
            }
        }
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
