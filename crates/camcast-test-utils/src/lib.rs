//! Test utilities for camcast.
//!
//! In-memory stand-ins for the media engine and the image loader, plus
//! helpers for observing events and logs.
//!
//! - `engine` - [`FakeEngine`] and the [`FakeSession`]s it builds
//! - `device` - [`FakeDevice`], one type answering every capability view
//! - `loader` - [`StaticImageLoader`] serving images from a table
//! - `listener` - [`RecordingListener`] capturing delivered events

pub mod device;
pub mod engine;
pub mod listener;
pub mod loader;

pub use device::FakeDevice;
pub use engine::{FakeEngine, FakePreview, FakeSession, BACK_CAMERA_URN, MICROPHONE_URN};
pub use listener::RecordingListener;
pub use loader::StaticImageLoader;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install a test log subscriber once. `RUST_LOG` overrides the default
/// filter.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "camcast_session=debug,camcast_device=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
