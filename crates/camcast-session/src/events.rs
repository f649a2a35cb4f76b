//! Engine callback normalization.

use std::sync::Arc;

use crossbeam_channel::Sender;
use parking_lot::RwLock;
use tracing::{trace, warn};

use camcast_device::{BroadcastState, EngineError, SessionListener, TransmissionStatistics};
use camcast_ipc::{
    AudioStatsPayload, ErrorPayload, NetworkHealthPayload, QualityPayload, SessionEvent,
    StateChangedPayload, StateMetadata, TransmissionStatisticsPayload,
};

/// Receiver of canonical session events.
///
/// Called from engine threads. Implementations must not block.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: SessionEvent);
}

impl<F> EventListener for F
where
    F: Fn(SessionEvent) + Send + Sync,
{
    fn on_event(&self, event: SessionEvent) {
        self(event)
    }
}

/// Forwards events into a channel, dropping them when it is full.
pub struct ChannelListener(pub Sender<SessionEvent>);

impl EventListener for ChannelListener {
    fn on_event(&self, event: SessionEvent) {
        if let Err(e) = self.0.try_send(event) {
            warn!("Failed to send event: {}", e);
        }
    }
}

/// Maps engine callbacks to [`SessionEvent`]s for the registered listener.
#[derive(Default)]
pub struct EventNormalizer {
    listener: RwLock<Option<Arc<dyn EventListener>>>,
    session_id: RwLock<Option<String>>,
}

impl EventNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap the registered listener. `None` drops subsequent events.
    pub fn set_listener(&self, listener: Option<Arc<dyn EventListener>>) {
        *self.listener.write() = listener;
    }

    pub fn has_listener(&self) -> bool {
        self.listener.read().is_some()
    }

    /// Record the identifier of the current transmission.
    pub fn set_session_id(&self, session_id: Option<String>) {
        *self.session_id.write() = session_id;
    }

    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    fn deliver(&self, event: SessionEvent) {
        // Clone out so the listener may call back into the session.
        let listener = self.listener.read().clone();
        match listener {
            Some(listener) => listener.on_event(event),
            None => trace!(event = event.name(), "No listener, dropping event"),
        }
    }
}

impl SessionListener for EventNormalizer {
    fn on_error(&self, error: EngineError) {
        self.deliver(SessionEvent::Error(ErrorPayload {
            code: error.code,
            detail: error.detail,
            source: error.source,
            is_fatal: error.is_fatal,
            error_type: error.error_type,
            session_id: self.session_id().unwrap_or_default(),
        }));
    }

    fn on_state_changed(&self, state: BroadcastState) {
        let metadata = match state {
            BroadcastState::Connected => Some(StateMetadata {
                session_id: self.session_id().unwrap_or_default(),
            }),
            _ => None,
        };

        self.deliver(SessionEvent::StateChanged(StateChangedPayload {
            state_status: state.name().to_string(),
            metadata,
        }));
    }

    fn on_audio_stats(&self, peak: f64, rms: f64) {
        self.deliver(SessionEvent::AudioStats(AudioStatsPayload { peak, rms }));
    }

    fn on_transmission_stats_changed(&self, stats: TransmissionStatistics) {
        self.deliver(SessionEvent::TransmissionStatisticsChanged(
            TransmissionStatisticsPayload {
                rtt: stats.round_trip_time,
                measured_bitrate: stats.measured_bitrate,
                recommended_bitrate: stats.recommended_bitrate,
                network_health: stats.network_health.name().to_string(),
                broadcast_quality: stats.broadcast_quality.name().to_string(),
            },
        ));
    }

    fn on_broadcast_quality_changed(&self, quality: f64) {
        self.deliver(SessionEvent::QualityChanged(QualityPayload { quality }));
    }

    fn on_network_health_changed(&self, health: f64) {
        self.deliver(SessionEvent::NetworkHealthChanged(NetworkHealthPayload {
            network_health: health,
        }));
    }
}
