use anyhow::{anyhow, Context, Result};
use common::validation;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::grid::GridSize;
use crate::quality::{QualityPolicy, QualityPreset};
use crate::session::RetryPolicy;
use crate::wall::{StalePolicy, WallOptions};

#[derive(Clone, Debug, PartialEq)]
pub enum TransportKind {
    /// Built-in stand-in that fakes connects; no gateway required
    Simulated { failure_rate: f64 },
    /// Real stream gateway over HTTP
    Http,
}

#[derive(Clone, Debug)]
pub struct WallConfig {
    pub bind_addr: SocketAddr,
    pub camera_directory_url: String,
    pub stream_gateway_url: String,
    pub transport: TransportKind,
    pub default_layout: GridSize,
    pub default_quality: QualityPreset,
    pub directory_refresh: Duration,
    pub stale_policy: StalePolicy,
    pub retry: RetryPolicy,
    pub connect_timeout: Duration,
}

impl WallConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let num = |key: &str, default: u64| -> Result<u64> {
            match lookup(key) {
                Some(v) => v
                    .trim()
                    .parse::<u64>()
                    .with_context(|| format!("invalid {}: '{}'", key, v)),
                None => Ok(default),
            }
        };

        let bind = get("VIDEO_WALL_ADDR", "0.0.0.0:8091");
        let bind_addr: SocketAddr = bind.parse().context("invalid VIDEO_WALL_ADDR")?;

        let camera_directory_url = get("CAMERA_DIRECTORY_URL", "http://localhost:8087");
        validation::validate_uri(&camera_directory_url, "CAMERA_DIRECTORY_URL")?;

        let stream_gateway_url = get("STREAM_GATEWAY_URL", "http://localhost:8084");
        validation::validate_uri(&stream_gateway_url, "STREAM_GATEWAY_URL")?;

        let transport = match get("WALL_TRANSPORT", "simulated").to_lowercase().as_str() {
            "http" => TransportKind::Http,
            "simulated" => {
                let failure_rate = match lookup("SIMULATED_FAILURE_RATE") {
                    Some(v) => v
                        .trim()
                        .parse::<f64>()
                        .with_context(|| format!("invalid SIMULATED_FAILURE_RATE: '{}'", v))?,
                    None => 0.0,
                };
                if !failure_rate.is_finite() {
                    return Err(anyhow!("invalid SIMULATED_FAILURE_RATE: '{}'", failure_rate));
                }
                validation::validate_range(failure_rate, 0.0, 1.0, "SIMULATED_FAILURE_RATE")?;
                TransportKind::Simulated { failure_rate }
            }
            other => return Err(anyhow!("invalid WALL_TRANSPORT: '{}' (expected simulated or http)", other)),
        };

        let default_layout: GridSize = get("WALL_DEFAULT_LAYOUT", "4")
            .parse()
            .context("invalid WALL_DEFAULT_LAYOUT")?;
        let default_quality: QualityPreset = get("WALL_DEFAULT_QUALITY", "720p")
            .parse()
            .context("invalid WALL_DEFAULT_QUALITY")?;
        let stale_policy: StalePolicy = get("WALL_STALE_POLICY", "keep")
            .parse()
            .context("invalid WALL_STALE_POLICY")?;

        let refresh_secs = num("DIRECTORY_REFRESH_SECS", 30)?;
        validation::validate_duration_secs(refresh_secs, "DIRECTORY_REFRESH_SECS")?;

        let connect_timeout_secs = num("CONNECT_TIMEOUT_SECS", 10)?;
        validation::validate_duration_secs(connect_timeout_secs, "CONNECT_TIMEOUT_SECS")?;

        let max_retries = num("RESTART_MAX_RETRIES", 0)?;
        let backoff_start_ms = num("RESTART_BACKOFF_MS_START", 500)?;
        let backoff_max_ms = num("RESTART_BACKOFF_MS_MAX", 10_000)?;

        Ok(Self {
            bind_addr,
            camera_directory_url,
            stream_gateway_url,
            transport,
            default_layout,
            default_quality,
            directory_refresh: Duration::from_secs(refresh_secs),
            stale_policy,
            retry: RetryPolicy {
                max_retries: u32::try_from(max_retries).context("RESTART_MAX_RETRIES too large")?,
                backoff_start_ms,
                backoff_max_ms: backoff_max_ms.max(backoff_start_ms),
            },
            connect_timeout: Duration::from_secs(connect_timeout_secs),
        })
    }

    pub fn wall_options(&self) -> WallOptions {
        WallOptions {
            layout: self.default_layout,
            quality: QualityPolicy::new(self.default_quality),
            retry: self.retry.clone(),
            stale_policy: self.stale_policy,
            ..WallOptions::default()
        }
    }
}
