//! Event capture for assertions.

use std::sync::Arc;

use parking_lot::Mutex;

use camcast_ipc::SessionEvent;

/// Records every event delivered through [`RecordingListener::callback`].
#[derive(Debug, Clone, Default)]
pub struct RecordingListener {
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// A closure to register as the session's event listener.
    pub fn callback(&self) -> impl Fn(SessionEvent) + Send + Sync + 'static {
        let events = Arc::clone(&self.events);
        move |event| events.lock().push(event)
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().clone()
    }

    /// Names of the recorded events, in delivery order.
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(SessionEvent::name).collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}
