use anyhow::Result;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::{TransportKind, WallConfig};
use crate::directory::{CameraDirectory, DirectoryPoller, HttpCameraDirectory};
use crate::transport::{HttpMediaTransport, MediaTransport, SimulatedTransport};
use crate::wall::{spawn_session_pump, SharedWall, VideoWall};

#[derive(Clone)]
pub struct AppState {
    pub config: WallConfig,
    pub wall: SharedWall,
    pub directory: Arc<dyn CameraDirectory>,
}

impl AppState {
    pub async fn new(config: WallConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let directory: Arc<dyn CameraDirectory> = Arc::new(HttpCameraDirectory::new(
            http_client,
            config.camera_directory_url.clone(),
        ));

        let transport: Arc<dyn MediaTransport> = match config.transport {
            TransportKind::Http => Arc::new(HttpMediaTransport::new(
                config.stream_gateway_url.clone(),
                config.connect_timeout,
            )?),
            TransportKind::Simulated { failure_rate } => {
                Arc::new(SimulatedTransport::new(Duration::from_secs(1), failure_rate))
            }
        };

        Ok(Self::from_parts(config, directory, transport))
    }

    /// Wire a wall around the given collaborators and start its session pump.
    /// Must be called inside a Tokio runtime.
    pub fn from_parts(
        config: WallConfig,
        directory: Arc<dyn CameraDirectory>,
        transport: Arc<dyn MediaTransport>,
    ) -> Self {
        let (wall, session_events) = VideoWall::new(config.wall_options(), transport);
        let wall = wall.into_shared();
        spawn_session_pump(wall.clone(), session_events);

        Self {
            config,
            wall,
            directory,
        }
    }

    /// Polls the full inventory; padding itself only picks online cameras.
    pub fn poller(&self) -> DirectoryPoller {
        DirectoryPoller::new(
            Arc::clone(&self.directory),
            self.wall.clone(),
            self.config.directory_refresh,
            None,
        )
    }

    pub fn spawn_poller(&self) -> JoinHandle<()> {
        self.poller().spawn()
    }
}
