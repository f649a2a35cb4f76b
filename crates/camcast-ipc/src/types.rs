//! Common types shared between the caller, the session and the engine.

use serde::{Deserialize, Serialize};

use crate::tokens::{AspectMode, AudioQuality, AutoBitrateProfile, LogLevel, Preset};

/// Name of the fixed camera slot.
pub const CAMERA_SLOT: &str = "camera";

/// Paint order of the camera slot.
pub const CAMERA_SLOT_Z_INDEX: i32 = 1;

/// Paint order of every overlay slot.
pub const OVERLAY_SLOT_Z_INDEX: i32 = 2;

/// Pixel dimensions. Width and height always travel together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// 2D position offset in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    /// The canvas origin.
    pub const ORIGIN: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Returns true when neither coordinate is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Video encoder parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConfig {
    /// Output canvas size.
    pub size: Size,

    /// Initial bitrate in bits per second.
    pub initial_bitrate: u32,

    /// Lower bound for adaptive bitrate.
    pub min_bitrate: u32,

    /// Upper bound for adaptive bitrate.
    pub max_bitrate: u32,

    /// Target frames per second.
    pub target_frame_rate: u32,

    /// Keyframe interval in seconds.
    pub keyframe_interval: u32,

    /// Whether B-frames are emitted.
    pub use_b_frames: bool,

    /// Whether adaptive bitrate is enabled.
    pub use_auto_bitrate: bool,

    /// Adaptive bitrate tuning.
    pub auto_bitrate_profile: AutoBitrateProfile,

    /// Whether the canvas keeps an alpha channel for overlays.
    pub transparency_enabled: bool,
}

/// Audio encoder parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioConfig {
    /// Bitrate in bits per second.
    pub bitrate: u32,

    /// Channel count (1 or 2).
    pub channels: u8,

    /// Encoder quality tier.
    pub quality: AudioQuality,
}

/// Immutable configuration handed to the engine when a session is built.
///
/// Snapshots have value semantics: deriving a new configuration goes through
/// [`ConfigSnapshot::changing`] or [`ConfigSnapshot::try_changing`], which
/// leave the original untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSnapshot {
    pub video: VideoConfig,
    pub audio: AudioConfig,
    pub log_level: LogLevel,
    pub mixer_slots: Vec<MixerSlot>,
}

impl ConfigSnapshot {
    /// Derive a new snapshot by applying `change` to a copy of this one.
    pub fn changing(&self, change: impl FnOnce(&mut Self)) -> Self {
        let mut next = self.clone();
        change(&mut next);
        next
    }

    /// Fallible variant of [`ConfigSnapshot::changing`].
    pub fn try_changing<E>(
        &self,
        change: impl FnOnce(&mut Self) -> Result<(), E>,
    ) -> Result<Self, E> {
        let mut next = self.clone();
        change(&mut next)?;
        Ok(next)
    }

    /// Look up a mixer slot by name.
    pub fn slot(&self, name: &str) -> Option<&MixerSlot> {
        self.mixer_slots.iter().find(|slot| slot.name == name)
    }
}

/// A named compositing region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixerSlot {
    /// Unique slot name.
    pub name: String,

    /// Paint order, lower first.
    pub z_index: i32,

    /// Scaling policy for the bound video input.
    pub aspect: AspectMode,

    /// Device type the slot prefers for video.
    pub preferred_video_input: DeviceType,

    /// Device type the slot prefers for audio.
    pub preferred_audio_input: DeviceType,

    /// Pixel size; `None` covers the whole canvas.
    pub size: Option<Size>,

    /// Offset from the canvas origin.
    pub position: Vec2,
}

impl MixerSlot {
    /// The fixed slot fed by the camera and microphone.
    pub fn camera() -> Self {
        Self {
            name: CAMERA_SLOT.to_string(),
            z_index: CAMERA_SLOT_Z_INDEX,
            aspect: AspectMode::Fill,
            preferred_video_input: DeviceType::Camera,
            preferred_audio_input: DeviceType::Microphone,
            size: None,
            position: Vec2::ORIGIN,
        }
    }

    /// An image overlay slot painted above the camera.
    pub fn overlay(name: impl Into<String>, size: Size, position: Vec2) -> Self {
        Self {
            name: name.into(),
            z_index: OVERLAY_SLOT_Z_INDEX,
            aspect: AspectMode::Fit,
            preferred_video_input: DeviceType::UserImage,
            preferred_audio_input: DeviceType::Unknown,
            size: Some(size),
            position,
        }
    }

    /// Returns true for the fixed camera slot.
    pub fn is_camera(&self) -> bool {
        self.name == CAMERA_SLOT
    }
}

// Slot positions are finite: the overlay reconciler skips any other entry.
impl Eq for MixerSlot {}

/// Kind of input device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceType {
    Camera,
    Microphone,
    /// Image surface supplied by the application.
    UserImage,
    /// Audio buffers supplied by the application.
    UserAudio,
    Unknown,
}

impl DeviceType {
    /// Returns true if the device produces video.
    pub fn is_video(self) -> bool {
        matches!(self, Self::Camera | Self::UserImage)
    }

    /// Returns true if the device produces audio.
    pub fn is_audio(self) -> bool {
        matches!(self, Self::Microphone | Self::UserAudio)
    }
}

/// Physical placement of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DevicePosition {
    Front,
    Back,
    External,
    Unknown,
}

/// Description of an available (not yet attached) input device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    /// Unique device identifier.
    pub urn: String,

    /// Display name.
    pub friendly_name: String,

    /// Kind of device.
    pub device_type: DeviceType,

    /// Physical placement.
    pub position: DevicePosition,
}

impl DeviceDescriptor {
    pub fn new(urn: impl Into<String>, device_type: DeviceType, position: DevicePosition) -> Self {
        let urn = urn.into();
        Self {
            friendly_name: urn.clone(),
            urn,
            device_type,
            position,
        }
    }

    /// Returns true for a back-facing camera.
    pub fn is_back_camera(&self) -> bool {
        self.device_type == DeviceType::Camera && self.position == DevicePosition::Back
    }
}

/// Diagnostic copy of a device binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingInfo {
    pub urn: String,
    pub device_type: DeviceType,
    pub slot: String,
}

/// One entry of the declarative overlay list.
///
/// `name` and `uri` are optional on the wire; entries lacking either are
/// skipped during reconciliation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OverlayDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Image source (`http://`, `https://` or `file://`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    /// Explicit slot size; defaults to the image's natural size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,

    /// Explicit slot position; defaults to the origin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec2>,
}

impl OverlayDescriptor {
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            uri: Some(uri.into()),
            size: None,
            position: None,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = Some(Size::new(width, height));
        self
    }

    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = Some(Vec2::new(x, y));
        self
    }

    /// Returns `(name, uri)` when both are present and non-empty.
    pub fn source(&self) -> Option<(&str, &str)> {
        let name = self.name.as_deref().filter(|name| !name.is_empty())?;
        let uri = self.uri.as_deref().filter(|uri| !uri.is_empty())?;
        Some((name, uri))
    }
}

/// Video override map. Present fields replace the base value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Initial bitrate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_frame_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyframe_interval: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_b_frames: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_auto_bitrate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_bitrate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_bitrate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_bitrate_profile: Option<AutoBitrateProfile>,
}

/// Audio override map. Present fields replace the base value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<AudioQuality>,
}

/// Every value a caller may set before the session is initialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Base configuration.
    pub preset: Preset,

    /// Log level baked into the configuration snapshot.
    pub log_level: Option<LogLevel>,

    /// Log level pushed into the engine session once it exists.
    pub session_log_level: LogLevel,

    pub video: Option<VideoOverrides>,
    pub audio: Option<AudioOverrides>,

    /// Microphone muted on attach.
    pub muted: bool,

    /// Zoom factor applied once the camera is attached.
    pub zoom: Option<f32>,

    pub preview_aspect_mode: AspectMode,
    pub preview_mirrored: bool,

    /// Overlays reconciled at initialization.
    pub overlays: Option<Vec<OverlayDescriptor>>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            preset: Preset::default(),
            log_level: None,
            session_log_level: LogLevel::Error,
            video: None,
            audio: None,
            muted: false,
            zoom: None,
            preview_aspect_mode: AspectMode::None,
            preview_mirrored: false,
            overlays: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_changing_leaves_original_untouched() {
        let original = ConfigSnapshot {
            video: VideoConfig {
                size: Size::new(720, 1280),
                initial_bitrate: 2_100_000,
                min_bitrate: 300_000,
                max_bitrate: 6_000_000,
                target_frame_rate: 30,
                keyframe_interval: 2,
                use_b_frames: true,
                use_auto_bitrate: true,
                auto_bitrate_profile: AutoBitrateProfile::Conservative,
                transparency_enabled: false,
            },
            audio: AudioConfig {
                bitrate: 96_000,
                channels: 2,
                quality: AudioQuality::Medium,
            },
            log_level: LogLevel::Error,
            mixer_slots: Vec::new(),
        };

        let derived = original.changing(|config| config.video.initial_bitrate = 1_000_000);

        assert_eq!(original.video.initial_bitrate, 2_100_000);
        assert_eq!(derived.video.initial_bitrate, 1_000_000);
        assert_eq!(derived.audio, original.audio);
    }

    #[test]
    fn test_overlay_descriptor_parses_partial_entries() {
        let entries: Vec<OverlayDescriptor> = serde_json::from_str(
            r#"[
                {"name": "logo", "uri": "http://x/logo.png", "size": {"width": 64, "height": 32}},
                {"uri": "http://x/nameless.png"},
                {"name": "corner", "uri": "file:///tmp/c.png", "position": {"x": 10.0, "y": 20.5}}
            ]"#,
        )
        .unwrap();

        assert_eq!(entries[0].source(), Some(("logo", "http://x/logo.png")));
        assert_eq!(entries[0].size, Some(Size::new(64, 32)));
        assert_eq!(entries[1].source(), None);
        assert_eq!(entries[2].position, Some(Vec2::new(10.0, 20.5)));
    }

    #[test]
    fn test_empty_name_counts_as_missing() {
        let descriptor = OverlayDescriptor::new("", "http://x/a.png");
        assert_eq!(descriptor.source(), None);
    }

    #[test]
    fn test_video_overrides_use_camel_case_keys() {
        let overrides: VideoOverrides = serde_json::from_str(
            r#"{"bitrate": 2000000, "isBFrames": false, "autoBitrateProfile": "fastIncrease"}"#,
        )
        .unwrap();

        assert_eq!(
            overrides,
            VideoOverrides {
                bitrate: Some(2_000_000),
                is_b_frames: Some(false),
                auto_bitrate_profile: Some(AutoBitrateProfile::FastIncrease),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_video_overrides_reject_unknown_profile_token() {
        let parsed = serde_json::from_str::<VideoOverrides>(r#"{"autoBitrateProfile": "turbo"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_settings_default_from_empty_object() {
        let settings: SessionSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, SessionSettings::default());
        assert_eq!(settings.session_log_level, LogLevel::Error);
    }

    #[test]
    fn test_slot_constructors() {
        let camera = MixerSlot::camera();
        assert!(camera.is_camera());
        assert_eq!(camera.z_index, CAMERA_SLOT_Z_INDEX);

        let overlay = MixerSlot::overlay("logo", Size::new(10, 10), Vec2::ORIGIN);
        assert!(!overlay.is_camera());
        assert_eq!(overlay.aspect, AspectMode::Fit);
        assert_eq!(overlay.preferred_video_input, DeviceType::UserImage);
        assert_eq!(overlay.preferred_audio_input, DeviceType::Unknown);
        assert!(overlay.z_index > camera.z_index);
    }
}
