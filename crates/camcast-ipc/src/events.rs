//! Canonical events delivered to the registered session listener.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events that the session delivers to its listener.
///
/// Each variant serializes as `{"name": ..., "payload": {...}}` with the
/// payload schema fixed per event name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "payload")]
pub enum SessionEvent {
    /// Engine reported an error. Forwarded verbatim.
    #[serde(rename = "onError")]
    Error(ErrorPayload),

    /// Engine connection state changed.
    #[serde(rename = "onStateChanged")]
    StateChanged(StateChangedPayload),

    /// Microphone level metering.
    #[serde(rename = "onAudioStats")]
    AudioStats(AudioStatsPayload),

    /// Network and quality statistics.
    #[serde(rename = "onTransmissionStatisticsChanged")]
    TransmissionStatisticsChanged(TransmissionStatisticsPayload),

    /// Scalar broadcast quality, superseded by `onTransmissionStatisticsChanged`.
    #[serde(rename = "onQualityChanged")]
    QualityChanged(QualityPayload),

    /// Scalar network health, superseded by `onTransmissionStatisticsChanged`.
    #[serde(rename = "onNetworkHealthChanged")]
    NetworkHealthChanged(NetworkHealthPayload),
}

impl SessionEvent {
    /// Returns the canonical event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Error(_) => "onError",
            Self::StateChanged(_) => "onStateChanged",
            Self::AudioStats(_) => "onAudioStats",
            Self::TransmissionStatisticsChanged(_) => "onTransmissionStatisticsChanged",
            Self::QualityChanged(_) => "onQualityChanged",
            Self::NetworkHealthChanged(_) => "onNetworkHealthChanged",
        }
    }

    /// Returns the payload as a JSON object.
    pub fn payload(&self) -> Value {
        let payload = match self {
            Self::Error(p) => serde_json::to_value(p),
            Self::StateChanged(p) => serde_json::to_value(p),
            Self::AudioStats(p) => serde_json::to_value(p),
            Self::TransmissionStatisticsChanged(p) => serde_json::to_value(p),
            Self::QualityChanged(p) => serde_json::to_value(p),
            Self::NetworkHealthChanged(p) => serde_json::to_value(p),
        };
        payload.unwrap_or_default()
    }
}

/// Payload of `onError`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub code: i32,
    pub detail: String,
    pub source: String,
    pub is_fatal: bool,
    #[serde(rename = "type")]
    pub error_type: String,
    pub session_id: String,
}

/// Payload of `onStateChanged`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChangedPayload {
    pub state_status: String,

    /// Present only when the new state is `CONNECTED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<StateMetadata>,
}

/// Metadata attached to a `CONNECTED` state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMetadata {
    pub session_id: String,
}

/// Payload of `onAudioStats`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioStatsPayload {
    pub peak: f64,
    pub rms: f64,
}

/// Payload of `onTransmissionStatisticsChanged`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransmissionStatisticsPayload {
    /// Round trip time in milliseconds.
    pub rtt: f64,
    pub measured_bitrate: f64,
    pub recommended_bitrate: f64,
    pub network_health: String,
    pub broadcast_quality: String,
}

/// Payload of `onQualityChanged`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityPayload {
    pub quality: f64,
}

/// Payload of `onNetworkHealthChanged`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkHealthPayload {
    pub network_health: f64,
}
