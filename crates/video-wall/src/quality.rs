//! Wall-wide stream quality: one preset label plus the effective bitrate.
//!
//! Selecting a preset always resets the bitrate to that preset's canonical
//! value. A bitrate override keeps the preset label, so the two may diverge.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::WallError;

pub const MIN_BITRATE_KBPS: u32 = 512;
pub const MAX_BITRATE_KBPS: u32 = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualityPreset {
    #[serde(rename = "480p")]
    Sd480,
    #[serde(rename = "720p")]
    Hd720,
    #[serde(rename = "1080p")]
    FullHd1080,
}

impl QualityPreset {
    pub const ALL: [QualityPreset; 3] = [
        QualityPreset::Sd480,
        QualityPreset::Hd720,
        QualityPreset::FullHd1080,
    ];

    pub fn label(self) -> &'static str {
        match self {
            QualityPreset::Sd480 => "480p",
            QualityPreset::Hd720 => "720p",
            QualityPreset::FullHd1080 => "1080p",
        }
    }

    pub fn canonical_bitrate_kbps(self) -> u32 {
        match self {
            QualityPreset::Sd480 => 1024,
            QualityPreset::Hd720 => 2048,
            QualityPreset::FullHd1080 => 4096,
        }
    }

    pub fn resolution(self) -> &'static str {
        match self {
            QualityPreset::Sd480 => "640x480",
            QualityPreset::Hd720 => "1280x720",
            QualityPreset::FullHd1080 => "1920x1080",
        }
    }
}

impl FromStr for QualityPreset {
    type Err = WallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        QualityPreset::ALL
            .into_iter()
            .find(|preset| preset.label() == wanted)
            .ok_or_else(|| WallError::invalid("quality preset", s))
    }
}

impl fmt::Display for QualityPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Coarse bitrate band shown next to the bitrate slider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BitrateLevel {
    Low,
    Medium,
    High,
}

impl BitrateLevel {
    pub fn classify(kbps: u32) -> Self {
        match kbps {
            0..=1499 => BitrateLevel::Low,
            1500..=2999 => BitrateLevel::Medium,
            _ => BitrateLevel::High,
        }
    }
}

/// The `(quality, bitrate)` pair a stream session is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamSettings {
    pub quality: QualityPreset,
    pub bitrate_kbps: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityPolicy {
    preset: QualityPreset,
    bitrate_kbps: u32,
}

impl QualityPolicy {
    pub fn new(preset: QualityPreset) -> Self {
        Self {
            preset,
            bitrate_kbps: preset.canonical_bitrate_kbps(),
        }
    }

    pub fn preset(&self) -> QualityPreset {
        self.preset
    }

    pub fn bitrate_kbps(&self) -> u32 {
        self.bitrate_kbps
    }

    pub fn bitrate_level(&self) -> BitrateLevel {
        BitrateLevel::classify(self.bitrate_kbps)
    }

    /// True once an override moved the bitrate off the preset's canonical value.
    pub fn is_overridden(&self) -> bool {
        self.bitrate_kbps != self.preset.canonical_bitrate_kbps()
    }

    pub fn settings(&self) -> StreamSettings {
        StreamSettings {
            quality: self.preset,
            bitrate_kbps: self.bitrate_kbps,
        }
    }

    /// Returns whether the effective settings changed.
    pub fn set_preset(&mut self, preset: QualityPreset) -> bool {
        let before = self.settings();
        self.preset = preset;
        self.bitrate_kbps = preset.canonical_bitrate_kbps();
        before != self.settings()
    }

    /// Returns whether the effective settings changed.
    pub fn set_bitrate_override(&mut self, kbps: u32) -> Result<bool, WallError> {
        if !(MIN_BITRATE_KBPS..=MAX_BITRATE_KBPS).contains(&kbps) {
            return Err(WallError::OutOfRange {
                field: "bitrate",
                value: kbps,
                min: MIN_BITRATE_KBPS,
                max: MAX_BITRATE_KBPS,
            });
        }
        let changed = self.bitrate_kbps != kbps;
        self.bitrate_kbps = kbps;
        Ok(changed)
    }
}

impl Default for QualityPolicy {
    fn default() -> Self {
        Self::new(QualityPreset::Hd720)
    }
}
