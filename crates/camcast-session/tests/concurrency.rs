//! Setters called from several threads and from listeners running on the
//! device queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use camcast_device::{BroadcastEngine, RasterImage};
use camcast_ipc::{DeviceType, OverlayDescriptor, SessionEvent, CAMERA_SLOT};
use camcast_session::{BroadcastOrchestrator, DEVICE_QUEUE_THREAD_NAME};
use camcast_test_utils::{init_tracing, FakeEngine, StaticImageLoader, MICROPHONE_URN};

const LOGO_URI: &str = "https://cdn.example.com/logo.png";
const BADGE_URI: &str = "file:///tmp/badge.png";
const TIMEOUT: Duration = Duration::from_secs(5);

fn setup() -> (Arc<BroadcastOrchestrator>, Arc<FakeEngine>) {
    init_tracing();
    let engine = FakeEngine::with_default_devices();
    let loader = StaticImageLoader::new()
        .with_image(LOGO_URI, RasterImage::transparent(200, 100))
        .with_image(BADGE_URI, RasterImage::transparent(64, 64));
    let orchestrator = BroadcastOrchestrator::new(
        Arc::clone(&engine) as Arc<dyn BroadcastEngine>,
        Arc::new(loader),
    );
    (Arc::new(orchestrator), engine)
}

fn logo() -> OverlayDescriptor {
    OverlayDescriptor::new("logo", LOGO_URI)
}

fn badge() -> OverlayDescriptor {
    OverlayDescriptor::new("badge", BADGE_URI).with_position(20.0, 40.0)
}

fn slot_names(orchestrator: &BroadcastOrchestrator) -> Vec<String> {
    orchestrator.slots().into_iter().map(|slot| slot.name).collect()
}

fn microphone_gain(engine: &FakeEngine) -> f32 {
    engine.session().unwrap().device(MICROPHONE_URN).unwrap().gain()
}

fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    done()
}

/// Listener that mutes and installs the logo the first time it is called.
fn mute_and_add_logo(
    orchestrator: &Arc<BroadcastOrchestrator>,
    seen: Arc<Mutex<Vec<(Option<String>, bool)>>>,
) -> impl Fn(SessionEvent) + Send + Sync + 'static {
    let orchestrator: Weak<BroadcastOrchestrator> = Arc::downgrade(orchestrator);
    let fired = AtomicBool::new(false);
    move |_event| {
        if fired.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(orchestrator) = orchestrator.upgrade() else {
            return;
        };
        let thread = thread::current().name().map(str::to_string);
        let muted = orchestrator.set_muted(true).is_ok();
        let listed = orchestrator.set_overlay_list(vec![logo()]).is_ok();
        seen.lock().push((thread, muted && listed));
    }
}

#[test]
fn test_setters_from_listener_during_initialize() {
    let (orchestrator, engine) = setup();
    engine.raise_stats_on_attach(true);
    let seen = Arc::new(Mutex::new(Vec::new()));
    orchestrator.set_event_listener(Some(Arc::new(mute_and_add_logo(
        &orchestrator,
        Arc::clone(&seen),
    ))));

    let (done_tx, done_rx) = crossbeam_channel::bounded(1);
    let worker = Arc::clone(&orchestrator);
    let handle = thread::spawn(move || {
        let _ = done_tx.send(worker.initialize());
    });
    let initialized = done_rx
        .recv_timeout(TIMEOUT)
        .expect("initialize blocked by a listener calling setters");
    handle.join().unwrap();

    initialized.unwrap();
    assert_eq!(
        *seen.lock(),
        vec![(Some(DEVICE_QUEUE_THREAD_NAME.to_string()), true)]
    );
    assert_eq!(microphone_gain(&engine), 0.0);
    assert_eq!(slot_names(&orchestrator), vec![CAMERA_SLOT, "logo"]);
    orchestrator.set_event_listener(None);
}

#[test]
fn test_setters_from_listener_on_device_queue() {
    let (orchestrator, engine) = setup();
    orchestrator.initialize().unwrap();
    engine.raise_stats_on_attach(true);
    let seen = Arc::new(Mutex::new(Vec::new()));
    orchestrator.set_event_listener(Some(Arc::new(mute_and_add_logo(
        &orchestrator,
        Arc::clone(&seen),
    ))));

    // Creating the badge image source calls the listener on the device queue.
    orchestrator.set_overlay_list(vec![badge()]).unwrap();

    let settled = wait_until(|| {
        slot_names(&orchestrator) == [CAMERA_SLOT, "logo"] && microphone_gain(&engine) == 0.0
    });
    assert!(settled, "slots: {:?}", slot_names(&orchestrator));
    assert_eq!(
        *seen.lock(),
        vec![(Some(DEVICE_QUEUE_THREAD_NAME.to_string()), true)]
    );
    let overlay_urns = engine.session().unwrap().bound_urns("logo");
    assert_eq!(overlay_urns.len(), 1);
    assert!(engine.session().unwrap().bound_urns("badge").is_empty());
    orchestrator.set_event_listener(None);
}

#[test]
fn test_setters_from_several_threads_keep_bindings_consistent() {
    let (orchestrator, engine) = setup();
    orchestrator.initialize().unwrap();
    let lists = vec![vec![logo()], vec![logo(), badge()], vec![badge()], Vec::new()];

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let orchestrator = Arc::clone(&orchestrator);
            let lists = lists.clone();
            thread::spawn(move || {
                for i in 0..20 {
                    orchestrator.set_muted((t + i) % 2 == 0).unwrap();
                    orchestrator.set_zoom(1.5).unwrap();
                    orchestrator
                        .set_overlay_list(lists[(t + i) % lists.len()].clone())
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let settings = orchestrator.settings();
    let bindings = orchestrator.bindings();
    let slots = slot_names(&orchestrator);

    let cached: Vec<String> = settings
        .overlays
        .unwrap_or_default()
        .into_iter()
        .filter_map(|overlay| overlay.name)
        .collect();
    assert_eq!(slots[0], CAMERA_SLOT);
    assert_eq!(slots[1..], cached[..]);

    let camera_types: Vec<_> = bindings
        .iter()
        .filter(|b| b.slot == CAMERA_SLOT)
        .map(|b| b.device_type)
        .collect();
    assert_eq!(camera_types, vec![DeviceType::Camera, DeviceType::Microphone]);
    for name in &slots[1..] {
        let bound = bindings.iter().filter(|b| &b.slot == name).count();
        assert_eq!(bound, 1, "overlay slot {name}");
    }
    assert!(bindings.iter().all(|b| slots.contains(&b.slot)), "{bindings:?}");

    let session = engine.session().unwrap();
    assert_eq!(session.attached_urns().len(), bindings.len());
    let history = session.camera_slot_history();
    assert!(history.iter().all(|&count| count <= 1), "{history:?}");
    let expected_gain = if settings.muted { 0.0 } else { 1.0 };
    assert_eq!(microphone_gain(&engine), expected_gain);
}
