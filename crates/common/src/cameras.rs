use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Connection state reported by the camera directory. Only `Online` cameras
/// are eligible for automatic placement.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum CameraStatus {
  Online,
  Offline,
  Connecting,
  Error,
  Maintenance,
  /// Missing or unrecognised in the directory payload
  #[default]
  #[serde(other)]
  Unknown,
}

impl CameraStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      CameraStatus::Online => "ONLINE",
      CameraStatus::Offline => "OFFLINE",
      CameraStatus::Connecting => "CONNECTING",
      CameraStatus::Error => "ERROR",
      CameraStatus::Maintenance => "MAINTENANCE",
      CameraStatus::Unknown => "UNKNOWN",
    }
  }
}

impl fmt::Display for CameraStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for CameraStatus {
  type Err = anyhow::Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_uppercase().as_str() {
      "ONLINE" => Ok(CameraStatus::Online),
      "OFFLINE" => Ok(CameraStatus::Offline),
      "CONNECTING" => Ok(CameraStatus::Connecting),
      "ERROR" => Ok(CameraStatus::Error),
      "MAINTENANCE" => Ok(CameraStatus::Maintenance),
      other => Err(anyhow::anyhow!("unknown camera status '{}'", other)),
    }
  }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum CameraProtocol {
  Rtsp,
  Onvif,
  Gb28181,
  Rtmp,
  WebRtc,
  Http,
  #[serde(other)]
  Other,
}

/// Inventory ids are numeric in some deployments; the wall keys on strings.
fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum RawId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
  }

  Ok(match RawId::deserialize(deserializer)? {
    RawId::Text(id) => id,
    RawId::Signed(id) => id.to_string(),
    RawId::Unsigned(id) => id.to_string(),
  })
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Default + Deserialize<'de>,
{
  Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Camera as observed from the directory. Read-only to the wall.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
  #[serde(deserialize_with = "id_from_string_or_number")]
  pub id: String,
  pub name: String,
  #[serde(default, deserialize_with = "null_as_default")]
  pub location: String,
  #[serde(default, deserialize_with = "null_as_default")]
  pub status: CameraStatus,
  #[serde(default)]
  pub resolution: Option<String>,
  #[serde(default)]
  pub protocol: Option<CameraProtocol>,
}

impl Camera {
  pub fn new(id: impl Into<String>, name: impl Into<String>, status: CameraStatus) -> Self {
    Self {
      id: id.into(),
      name: name.into(),
      location: String::new(),
      status,
      resolution: None,
      protocol: None,
    }
  }

  pub fn with_location(mut self, location: impl Into<String>) -> Self {
    self.location = location.into();
    self
  }

  pub fn is_online(&self) -> bool {
    self.status == CameraStatus::Online
  }
}

/// Paged listing envelope returned by the camera inventory API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraPage {
  pub content: Vec<Camera>,
  #[serde(default)]
  pub total_elements: Option<u64>,
}
