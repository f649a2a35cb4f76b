//! Overlay list handling through the orchestrator.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use camcast_device::{BroadcastEngine, RasterImage};
use camcast_ipc::{MixerSlot, OverlayDescriptor, Size, Vec2, CAMERA_SLOT};
use camcast_session::{BroadcastOrchestrator, ReconcileOutcome};
use camcast_test_utils::{init_tracing, FakeEngine, StaticImageLoader};

const LOGO_URI: &str = "https://cdn.example.com/logo.png";
const BADGE_URI: &str = "file:///tmp/badge.png";

fn setup() -> (BroadcastOrchestrator, Arc<FakeEngine>, Arc<StaticImageLoader>) {
    init_tracing();
    let engine = FakeEngine::with_default_devices();
    let loader = Arc::new(
        StaticImageLoader::new()
            .with_image(LOGO_URI, RasterImage::transparent(200, 100))
            .with_image(BADGE_URI, RasterImage::transparent(64, 64)),
    );
    let orchestrator = BroadcastOrchestrator::new(
        Arc::clone(&engine) as Arc<dyn BroadcastEngine>,
        Arc::clone(&loader) as _,
    );
    (orchestrator, engine, loader)
}

fn slot_names(orchestrator: &BroadcastOrchestrator) -> Vec<String> {
    orchestrator.slots().into_iter().map(|slot| slot.name).collect()
}

#[test]
fn test_overlay_list_cached_until_initialize() {
    let (orchestrator, engine, loader) = setup();

    let outcome = orchestrator
        .set_overlay_list(vec![OverlayDescriptor::new("logo", LOGO_URI)])
        .unwrap();
    assert_eq!(outcome, None);
    assert!(loader.loads().is_empty());

    orchestrator.initialize().unwrap();

    assert_eq!(
        orchestrator.slots(),
        vec![
            MixerSlot::camera(),
            MixerSlot::overlay("logo", Size::new(200, 100), Vec2::ORIGIN),
        ]
    );
    let session = engine.session().unwrap();
    assert_eq!(session.bound_urns("logo"), vec!["image:1".to_string()]);
    assert_eq!(session.device("image:1").unwrap().draw_count(), 1);
    assert_eq!(loader.loads(), vec![LOGO_URI.to_string()]);
}

#[test]
fn test_empty_list_removes_every_overlay() {
    let (orchestrator, engine, _loader) = setup();
    orchestrator.initialize().unwrap();
    orchestrator
        .set_overlay_list(vec![
            OverlayDescriptor::new("logo", LOGO_URI),
            OverlayDescriptor::new("badge", BADGE_URI).with_position(20.0, 40.0),
        ])
        .unwrap();
    assert_eq!(slot_names(&orchestrator), vec![CAMERA_SLOT, "logo", "badge"]);

    let outcome = orchestrator.set_overlay_list(Vec::new()).unwrap();

    assert_eq!(outcome, Some(ReconcileOutcome::default()));
    assert_eq!(slot_names(&orchestrator), vec![CAMERA_SLOT]);
    let session = engine.session().unwrap();
    assert_eq!(session.slot_names(), vec![CAMERA_SLOT.to_string()]);
    assert_eq!(session.bound_urns(CAMERA_SLOT).len(), 2);
}

#[test]
fn test_reconcile_is_idempotent() {
    let (orchestrator, _engine, _loader) = setup();
    orchestrator.initialize().unwrap();
    let desired = vec![
        OverlayDescriptor::new("logo", LOGO_URI).with_size(100, 50),
        OverlayDescriptor::new("badge", BADGE_URI),
    ];

    orchestrator.set_overlay_list(desired.clone()).unwrap();
    let first = orchestrator.slots();
    orchestrator.set_overlay_list(desired).unwrap();

    assert_eq!(orchestrator.slots(), first);
    assert_eq!(first[1].size, Some(Size::new(100, 50)));
}

#[test]
fn test_failed_image_keeps_earlier_overlays() {
    let (orchestrator, _engine, _loader) = setup();
    orchestrator.initialize().unwrap();

    let outcome = orchestrator
        .set_overlay_list(vec![
            OverlayDescriptor::new("logo", LOGO_URI),
            OverlayDescriptor::new("missing", "https://cdn.example.com/404.png"),
            OverlayDescriptor::new("badge", BADGE_URI),
        ])
        .unwrap()
        .unwrap();

    assert_eq!(outcome.created, vec!["logo".to_string()]);
    assert_eq!(outcome.failed.as_deref(), Some("missing"));
    assert_eq!(slot_names(&orchestrator), vec![CAMERA_SLOT, "logo"]);
}

#[test]
fn test_incomplete_entries_skipped() {
    let (orchestrator, _engine, _loader) = setup();
    orchestrator.initialize().unwrap();

    let outcome = orchestrator
        .set_overlay_list(vec![
            OverlayDescriptor {
                name: Some("nameless".into()),
                ..Default::default()
            },
            OverlayDescriptor {
                uri: Some(LOGO_URI.into()),
                ..Default::default()
            },
            OverlayDescriptor::new("badge", BADGE_URI),
        ])
        .unwrap()
        .unwrap();

    assert_eq!(outcome.skipped, 2);
    assert_eq!(outcome.created, vec!["badge".to_string()]);
}

#[test]
fn test_overlays_released_on_deinitialize() {
    let (orchestrator, engine, _loader) = setup();
    orchestrator.initialize().unwrap();
    orchestrator
        .set_overlay_list(vec![OverlayDescriptor::new("logo", LOGO_URI)])
        .unwrap();
    let session = engine.session().unwrap();

    orchestrator.deinitialize();

    assert!(session.attached_urns().is_empty());
    assert!(orchestrator.slots().is_empty());
}

#[test]
fn test_latest_list_rebuilt_after_reinitialize() {
    let (orchestrator, engine, _loader) = setup();
    orchestrator.initialize().unwrap();
    orchestrator
        .set_overlay_list(vec![OverlayDescriptor::new("badge", BADGE_URI)])
        .unwrap();
    orchestrator.deinitialize();

    orchestrator.initialize().unwrap();

    assert_eq!(slot_names(&orchestrator), vec![CAMERA_SLOT, "badge"]);
    assert_eq!(engine.session().unwrap().bound_urns("badge").len(), 1);
}
