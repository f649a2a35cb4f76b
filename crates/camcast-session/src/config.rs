//! Configuration composition from presets and overrides.
//!
//! Every function here is pure: snapshots go in, new snapshots come out.

use std::ops::RangeInclusive;

use camcast_ipc::{
    AspectMode, AudioConfig, AudioOverrides, AudioQuality, AutoBitrateProfile, ConfigError,
    ConfigResult, ConfigSnapshot, LogLevel, MixerSlot, Preset, SessionSettings, Size, VideoConfig,
    VideoOverrides,
};

/// Accepted video bitrates in bits per second.
pub const VIDEO_BITRATE_RANGE: RangeInclusive<u32> = 100_000..=8_500_000;

/// Accepted target frame rates.
pub const FRAME_RATE_RANGE: RangeInclusive<u32> = 10..=60;

/// Accepted keyframe intervals in seconds.
pub const KEYFRAME_INTERVAL_RANGE: RangeInclusive<u32> = 1..=5;

/// Accepted audio bitrates in bits per second.
pub const AUDIO_BITRATE_RANGE: RangeInclusive<u32> = 64_000..=160_000;

/// Accepted audio channel counts.
pub const AUDIO_CHANNEL_RANGE: RangeInclusive<u8> = 1..=2;

/// Resolve a preset token into its base snapshot.
pub fn resolve_preset(name: &str) -> ConfigResult<ConfigSnapshot> {
    Ok(preset_snapshot(name.parse()?))
}

/// Base snapshot of a preset. The mixer slot list is empty.
pub fn preset_snapshot(preset: Preset) -> ConfigSnapshot {
    let (width, height, initial_bitrate, max_bitrate) = match preset {
        Preset::StandardPortrait => (720, 1280, 2_100_000, 8_500_000),
        Preset::StandardLandscape => (1280, 720, 2_100_000, 8_500_000),
        Preset::BasicPortrait => (480, 852, 1_000_000, 1_500_000),
        Preset::BasicLandscape => (852, 480, 1_000_000, 1_500_000),
    };

    ConfigSnapshot {
        video: VideoConfig {
            size: Size::new(width, height),
            initial_bitrate,
            min_bitrate: 300_000,
            max_bitrate,
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
    }
}

pub fn resolve_log_level(token: &str) -> ConfigResult<LogLevel> {
    token.parse()
}

pub fn resolve_aspect_mode(token: &str) -> ConfigResult<AspectMode> {
    token.parse()
}

pub fn resolve_auto_bitrate_profile(token: &str) -> ConfigResult<AutoBitrateProfile> {
    token.parse()
}

pub fn resolve_audio_quality(token: &str) -> ConfigResult<AudioQuality> {
    token.parse()
}

/// Check a video override map without applying it.
pub fn validate_video_overrides(overrides: &VideoOverrides) -> ConfigResult<()> {
    if overrides.width.is_some() != overrides.height.is_some() {
        return Err(ConfigError::InvalidConfig(
            "The `width` and `height` are interrelated and thus can not be used separately."
                .to_string(),
        ));
    }
    if let (Some(width), Some(height)) = (overrides.width, overrides.height) {
        if width == 0 || height == 0 {
            return Err(ConfigError::InvalidConfig(format!(
                "Video size must be non-zero, got {width}x{height}"
            )));
        }
    }

    check_range("bitrate", overrides.bitrate, &VIDEO_BITRATE_RANGE)?;
    check_range("minBitrate", overrides.min_bitrate, &VIDEO_BITRATE_RANGE)?;
    check_range("maxBitrate", overrides.max_bitrate, &VIDEO_BITRATE_RANGE)?;
    check_range("targetFrameRate", overrides.target_frame_rate, &FRAME_RATE_RANGE)?;
    check_range("keyframeInterval", overrides.keyframe_interval, &KEYFRAME_INTERVAL_RANGE)?;
    Ok(())
}

/// Check an audio override map without applying it.
pub fn validate_audio_overrides(overrides: &AudioOverrides) -> ConfigResult<()> {
    check_range("audio bitrate", overrides.bitrate, &AUDIO_BITRATE_RANGE)?;
    check_range("channels", overrides.channels, &AUDIO_CHANNEL_RANGE)?;
    Ok(())
}

/// Derive a snapshot with the present video overrides applied.
pub fn apply_video_overrides(
    snapshot: &ConfigSnapshot,
    overrides: &VideoOverrides,
) -> ConfigResult<ConfigSnapshot> {
    validate_video_overrides(overrides)?;

    snapshot.try_changing(|config| {
        let video = &mut config.video;
        if let (Some(width), Some(height)) = (overrides.width, overrides.height) {
            video.size = Size::new(width, height);
        }
        if let Some(bitrate) = overrides.bitrate {
            video.initial_bitrate = bitrate;
        }
        if let Some(fps) = overrides.target_frame_rate {
            video.target_frame_rate = fps;
        }
        if let Some(interval) = overrides.keyframe_interval {
            video.keyframe_interval = interval;
        }
        if let Some(b_frames) = overrides.is_b_frames {
            video.use_b_frames = b_frames;
        }
        if let Some(auto) = overrides.is_auto_bitrate {
            video.use_auto_bitrate = auto;
        }
        if let Some(max) = overrides.max_bitrate {
            video.max_bitrate = max;
        }
        if let Some(min) = overrides.min_bitrate {
            video.min_bitrate = min;
        }
        if let Some(profile) = overrides.auto_bitrate_profile {
            video.auto_bitrate_profile = profile;
        }
        Ok::<(), ConfigError>(())
    })
}

/// Derive a snapshot with the present audio overrides applied.
pub fn apply_audio_overrides(
    snapshot: &ConfigSnapshot,
    overrides: &AudioOverrides,
) -> ConfigResult<ConfigSnapshot> {
    validate_audio_overrides(overrides)?;

    Ok(snapshot.changing(|config| {
        let audio = &mut config.audio;
        if let Some(bitrate) = overrides.bitrate {
            audio.bitrate = bitrate;
        }
        if let Some(channels) = overrides.channels {
            audio.channels = channels;
        }
        if let Some(quality) = overrides.quality {
            audio.quality = quality;
        }
    }))
}

/// Layer `newer` over `base`. Keys present in `newer` win.
pub fn merge_video_overrides(base: &VideoOverrides, newer: &VideoOverrides) -> VideoOverrides {
    VideoOverrides {
        width: newer.width.or(base.width),
        height: newer.height.or(base.height),
        bitrate: newer.bitrate.or(base.bitrate),
        target_frame_rate: newer.target_frame_rate.or(base.target_frame_rate),
        keyframe_interval: newer.keyframe_interval.or(base.keyframe_interval),
        is_b_frames: newer.is_b_frames.or(base.is_b_frames),
        is_auto_bitrate: newer.is_auto_bitrate.or(base.is_auto_bitrate),
        max_bitrate: newer.max_bitrate.or(base.max_bitrate),
        min_bitrate: newer.min_bitrate.or(base.min_bitrate),
        auto_bitrate_profile: newer.auto_bitrate_profile.or(base.auto_bitrate_profile),
    }
}

/// Layer `newer` over `base`. Keys present in `newer` win.
pub fn merge_audio_overrides(base: &AudioOverrides, newer: &AudioOverrides) -> AudioOverrides {
    AudioOverrides {
        bitrate: newer.bitrate.or(base.bitrate),
        channels: newer.channels.or(base.channels),
        quality: newer.quality.or(base.quality),
    }
}

/// Build the snapshot a session is constructed with.
///
/// Order: preset, configuration log level, video overrides, audio overrides,
/// then transparency and the mixer slot list.
pub fn compose(settings: &SessionSettings, slots: &[MixerSlot]) -> ConfigResult<ConfigSnapshot> {
    let mut snapshot = preset_snapshot(settings.preset);

    if let Some(level) = settings.log_level {
        snapshot = snapshot.changing(|config| config.log_level = level);
    }
    if let Some(ref video) = settings.video {
        snapshot = apply_video_overrides(&snapshot, video)?;
    }
    if let Some(ref audio) = settings.audio {
        snapshot = apply_audio_overrides(&snapshot, audio)?;
    }

    Ok(snapshot.changing(|config| {
        config.video.transparency_enabled = true;
        config.mixer_slots = slots.to_vec();
    }))
}

fn check_range<T>(key: &str, value: Option<T>, range: &RangeInclusive<T>) -> ConfigResult<()>
where
    T: PartialOrd + std::fmt::Display,
{
    match value {
        Some(value) if !range.contains(&value) => Err(ConfigError::InvalidConfig(format!(
            "`{key}` must be within {}..={}, got {value}",
            range.start(),
            range.end()
        ))),
        _ => Ok(()),
    }
}
