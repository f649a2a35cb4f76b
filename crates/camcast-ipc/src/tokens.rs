//! String tokens accepted by the session's configuration setters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Named base configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Preset {
    /// 720p portrait at standard-channel bitrates.
    #[default]
    StandardPortrait,

    /// 720p landscape at standard-channel bitrates.
    StandardLandscape,

    /// 480p portrait at basic-channel bitrates.
    BasicPortrait,

    /// 480p landscape at basic-channel bitrates.
    BasicLandscape,
}

impl Preset {
    /// Every recognized preset.
    pub const ALL: [Preset; 4] = [
        Self::StandardPortrait,
        Self::StandardLandscape,
        Self::BasicPortrait,
        Self::BasicLandscape,
    ];

    /// Returns the token for this preset.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StandardPortrait => "standardPortrait",
            Self::StandardLandscape => "standardLandscape",
            Self::BasicPortrait => "basicPortrait",
            Self::BasicLandscape => "basicLandscape",
        }
    }

    /// Returns true for the portrait presets.
    pub fn is_portrait(self) -> bool {
        matches!(self, Self::StandardPortrait | Self::BasicPortrait)
    }
}

impl FromStr for Preset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standardPortrait" => Ok(Self::StandardPortrait),
            "standardLandscape" => Ok(Self::StandardLandscape),
            "basicPortrait" => Ok(Self::BasicPortrait),
            "basicLandscape" => Ok(Self::BasicLandscape),
            _ => Err(ConfigError::UnknownPreset(s.to_string())),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    #[default]
    Error,
}

impl LogLevel {
    /// Returns the token for this level.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            _ => Err(ConfigError::unknown("log level", s)),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scaling policy for previews and mixer slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AspectMode {
    /// Letterbox inside the target.
    Fit,

    /// Crop to cover the target.
    Fill,

    /// Stretch without preserving aspect.
    #[default]
    None,
}

impl AspectMode {
    /// Returns the token for this mode.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fit => "fit",
            Self::Fill => "fill",
            Self::None => "none",
        }
    }
}

impl FromStr for AspectMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fit" => Ok(Self::Fit),
            "fill" => Ok(Self::Fill),
            "none" => Ok(Self::None),
            _ => Err(ConfigError::unknown("aspect mode", s)),
        }
    }
}

impl fmt::Display for AspectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Adaptive bitrate tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AutoBitrateProfile {
    #[default]
    Conservative,
    FastIncrease,
}

impl AutoBitrateProfile {
    /// Returns the token for this profile.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::FastIncrease => "fastIncrease",
        }
    }
}

impl FromStr for AutoBitrateProfile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "conservative" => Ok(Self::Conservative),
            "fastIncrease" => Ok(Self::FastIncrease),
            _ => Err(ConfigError::unknown("automatic bitrate profile", s)),
        }
    }
}

impl fmt::Display for AutoBitrateProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audio encoder quality/complexity tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AudioQuality {
    Minimum,
    Low,
    #[default]
    Medium,
    High,
    Maximum,
}

impl AudioQuality {
    /// Returns the token for this quality.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minimum => "minimum",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Maximum => "maximum",
        }
    }
}

impl FromStr for AudioQuality {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minimum" => Ok(Self::Minimum),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "maximum" => Ok(Self::Maximum),
            _ => Err(ConfigError::unknown("audio quality", s)),
        }
    }
}

impl fmt::Display for AudioQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
