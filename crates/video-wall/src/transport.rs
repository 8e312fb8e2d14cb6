use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::quality::{QualityPreset, StreamSettings};

/// Live figures reported for a connected stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Telemetry {
    pub bitrate_kbps: u32,
    pub framerate: u32,
    pub resolution: String,
    pub latency_ms: u32,
}

/// A connect attempt that did not produce a stream. Recoverable; kept in session state.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("stream connect failed: {detail}")]
pub struct StreamConnectFailure {
    pub detail: String,
}

impl StreamConnectFailure {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// Media delivery collaborator: turns a camera + settings into a playable feed.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    fn build_stream_url(&self, camera_id: &str, settings: StreamSettings) -> String;

    /// Resolves once the feed is playing or has definitively failed.
    /// Dropping the returned future cancels the attempt.
    async fn connect(&self, url: &str) -> Result<Telemetry, StreamConnectFailure>;
}

fn stream_path(camera_id: &str, settings: StreamSettings) -> String {
    format!(
        "/api/stream/{}?quality={}&bitrate={}",
        camera_id,
        settings.quality.label(),
        settings.bitrate_kbps
    )
}

/// Value of `key` in the query string of `url`.
pub(crate) fn query_param<'a>(url: &'a str, key: &str) -> Option<&'a str> {
    let (_, query) = url.split_once('?')?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

/// Talks to the stream gateway over HTTP. The gateway answers the stream URL
/// with the negotiated telemetry once the feed is up.
pub struct HttpMediaTransport {
    client: Client,
    base_url: String,
}

impl HttpMediaTransport {
    pub fn new(base_url: impl Into<String>, connect_timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(connect_timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl MediaTransport for HttpMediaTransport {
    fn build_stream_url(&self, camera_id: &str, settings: StreamSettings) -> String {
        format!("{}{}", self.base_url, stream_path(camera_id, settings))
    }

    async fn connect(&self, url: &str) -> Result<Telemetry, StreamConnectFailure> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StreamConnectFailure::new(format!("stream gateway unavailable: {}", e)))?;

        if !response.status().is_success() {
            return Err(StreamConnectFailure::new(format!(
                "stream gateway returned {}",
                response.status()
            )));
        }

        response
            .json::<Telemetry>()
            .await
            .map_err(|e| StreamConnectFailure::new(format!("malformed stream telemetry: {}", e)))
    }
}

/// Stand-in for a real gateway: waits, then reports plausible figures.
/// `failure_rate` in [0, 1] controls how often an attempt fails.
pub struct SimulatedTransport {
    delay: Duration,
    failure_rate: f64,
}

impl SimulatedTransport {
    pub fn new(delay: Duration, failure_rate: f64) -> Self {
        let failure_rate = if failure_rate.is_nan() {
            0.0
        } else {
            failure_rate.clamp(0.0, 1.0)
        };
        Self { delay, failure_rate }
    }
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 0.0)
    }
}

#[async_trait]
impl MediaTransport for SimulatedTransport {
    fn build_stream_url(&self, camera_id: &str, settings: StreamSettings) -> String {
        format!("sim://{}", stream_path(camera_id, settings))
    }

    async fn connect(&self, url: &str) -> Result<Telemetry, StreamConnectFailure> {
        tokio::time::sleep(self.delay).await;

        let resolution = query_param(url, "quality")
            .and_then(|q| q.parse::<QualityPreset>().ok())
            .unwrap_or(QualityPreset::Hd720)
            .resolution();

        let mut rng = rand::thread_rng();
        if rng.gen_bool(self.failure_rate) {
            debug!(url, "simulated connect failure");
            return Err(StreamConnectFailure::new("Failed to load video stream"));
        }

        Ok(Telemetry {
            bitrate_kbps: rng.gen_range(1000..4000),
            framerate: 25,
            resolution: resolution.to_string(),
            latency_ms: rng.gen_range(50..150),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(quality: QualityPreset, bitrate_kbps: u32) -> StreamSettings {
        StreamSettings {
            quality,
            bitrate_kbps,
        }
    }

    #[test]
    fn http_urls_carry_quality_and_bitrate() {
        let transport = HttpMediaTransport::with_client(Client::new(), "http://gw:8084/");
        assert_eq!(
            transport.build_stream_url("cam-3", settings(QualityPreset::FullHd1080, 3000)),
            "http://gw:8084/api/stream/cam-3?quality=1080p&bitrate=3000"
        );
    }

    #[test]
    fn query_param_lookup() {
        let url = "sim:///api/stream/a?quality=480p&bitrate=1024";
        assert_eq!(query_param(url, "quality"), Some("480p"));
        assert_eq!(query_param(url, "bitrate"), Some("1024"));
        assert_eq!(query_param(url, "fps"), None);
        assert_eq!(query_param("no-query", "quality"), None);
    }

    #[tokio::test]
    async fn simulated_reports_resolution_for_requested_quality() {
        let transport = SimulatedTransport::new(Duration::ZERO, 0.0);
        let url = transport.build_stream_url("cam-1", settings(QualityPreset::Sd480, 1024));
        let telemetry = transport.connect(&url).await.unwrap();
        assert_eq!(telemetry.resolution, "640x480");
        assert_eq!(telemetry.framerate, 25);
        assert!((1000..4000).contains(&telemetry.bitrate_kbps));
        assert!((50..150).contains(&telemetry.latency_ms));
    }

    #[tokio::test]
    async fn simulated_failure_rate_one_always_fails() {
        let transport = SimulatedTransport::new(Duration::ZERO, 7.0);
        let url = transport.build_stream_url("cam-1", settings(QualityPreset::Hd720, 2048));
        let err = transport.connect(&url).await.unwrap_err();
        assert_eq!(err.detail, "Failed to load video stream");
    }

    #[tokio::test]
    async fn simulated_nan_failure_rate_never_fails() {
        let transport = SimulatedTransport::new(Duration::ZERO, f64::NAN);
        let url = transport.build_stream_url("cam-1", settings(QualityPreset::Hd720, 2048));
        let handle = tokio::spawn(async move { transport.connect(&url).await });
        let telemetry = handle.await.unwrap().unwrap();
        assert_eq!(telemetry.resolution, "1280x720");
    }
}
