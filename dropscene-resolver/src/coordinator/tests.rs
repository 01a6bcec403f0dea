use std::time::Duration;

use super::*;
use crate::entry::memory::{MemoryDirectory, MemoryEntry, MemoryFile};
use crate::manifest::ReferenceKind;

const MANIFEST: &str = r#"{
    "asset": { "version": "2.0" },
    "buffers": [{ "uri": "scene.bin", "byteLength": 4 }],
    "images": [{ "uri": "textures/tex.png" }]
}"#;

fn scene_drop() -> Vec<MemoryEntry> {
    vec![
        MemoryDirectory::new(
            "scene",
            vec![
                MemoryFile::untyped("scene.gltf", MANIFEST).into(),
                MemoryFile::untyped("scene.bin", vec![0, 1, 2, 3]).into(),
                MemoryDirectory::new("textures", vec![MemoryFile::new("tex.png", "image/png", vec![0x89]).into()]).into(),
            ],
        )
        .into(),
    ]
}

fn package(name: &str) -> MemoryEntry {
    MemoryFile::untyped(name, b"glTF\x02\x00\x00\x00".to_vec()).into()
}

/// Records what it was handed instead of parsing anything.
#[derive(Default)]
struct RecordingParser {
    manifests: usize,
    packages: Vec<String>,
}

impl SceneParser for RecordingParser {
    type Output = String;

    fn parse_manifest(&mut self, scene: &ResolvedScene) -> Result<String, ResolverError> {
        self.manifests += 1;
        scene.to_json()
    }

    fn parse_package(&mut self, package: &ResourceHandle) -> Result<String, ResolverError> {
        self.packages.push(package.name().to_string());
        Ok(package.uri().to_string())
    }
}

#[tokio::test]
async fn starts_idle() {
    let coordinator = ResolutionCoordinator::default();
    assert_eq!(
        coordinator.phase(),
        PhaseUpdate {
            generation: 0,
            phase: Phase::Idle
        }
    );
    assert_eq!(coordinator.current_generation(), 0);
}

#[test_log::test(tokio::test)]
async fn resolves_a_scene_directory() {
    let coordinator = ResolutionCoordinator::default();
    let mut phases = coordinator.subscribe();

    let resolution = coordinator
        .resolve::<MemoryDirectory>(scene_drop())
        .await
        .unwrap();

    assert_eq!(resolution.generation, 1);
    assert_eq!(resolution.phase(), Phase::Ready);
    assert!(resolution.report.is_clean());
    assert_eq!(
        resolution.trail,
        [
            Phase::Idle,
            Phase::Walking,
            Phase::Materializing,
            Phase::Rewriting,
            Phase::Ready
        ]
    );

    assert!(phases.has_changed().unwrap());
    assert_eq!(
        *phases.borrow_and_update(),
        PhaseUpdate {
            generation: 1,
            phase: Phase::Ready
        }
    );

    let ResolutionOutcome::Scene(scene) = &resolution.outcome else {
        panic!("expected a scene, got {:?}", resolution.outcome);
    };
    assert!(scene.is_fully_resolved());
    assert_eq!(scene.resources().buffer_count(), 1);
    assert_eq!(scene.resources().image_count(), 1);

    let buffer_uri = scene.manifest().uri(ReferenceKind::Buffer, 0).unwrap();
    assert!(buffer_uri.starts_with("blob:dropscene/1/"));
    assert_eq!(scene.resource(buffer_uri).unwrap().bytes(), &[0, 1, 2, 3]);
}

#[tokio::test]
async fn delivers_to_the_parser() {
    let coordinator = ResolutionCoordinator::default();
    let mut parser = RecordingParser::default();

    let scene = coordinator
        .resolve::<MemoryDirectory>(scene_drop())
        .await
        .unwrap();
    let json = coordinator.deliver(&scene, &mut parser).unwrap().unwrap();
    assert!(json.contains("blob:dropscene/1/"));
    assert_eq!(parser.manifests, 1);

    let glb = coordinator
        .resolve::<MemoryDirectory>(vec![package("model.glb")])
        .await
        .unwrap();
    assert_eq!(glb.phase(), Phase::PackageReady);
    let uri = coordinator.deliver(&glb, &mut parser).unwrap().unwrap();
    assert!(uri.starts_with("blob:dropscene/2/"));
    assert_eq!(parser.packages, ["model.glb"]);
}

#[tokio::test]
async fn stale_resolutions_are_never_delivered() {
    let coordinator = ResolutionCoordinator::default();
    let mut parser = RecordingParser::default();

    let first = coordinator
        .resolve::<MemoryDirectory>(scene_drop())
        .await
        .unwrap();
    let second = coordinator
        .resolve::<MemoryDirectory>(vec![package("model.glb")])
        .await
        .unwrap();

    let err = coordinator.deliver(&first, &mut parser).unwrap_err();
    assert!(matches!(
        err,
        ResolverError::Superseded {
            generation: 1,
            current: 2
        }
    ));
    assert_eq!(parser.manifests, 0);

    assert!(coordinator.deliver(&second, &mut parser).unwrap().is_some());
}

#[test_log::test(tokio::test(start_paused = true))]
async fn newer_drop_supersedes_one_in_flight() {
    let coordinator = ResolutionCoordinator::default();
    let slow: Vec<MemoryEntry> = vec![
        MemoryFile::untyped("old.glb", b"glTF".to_vec())
            .with_read_delay(Duration::from_secs(5))
            .into(),
    ];
    let fast = vec![package("new.glb")];

    let (old, new) = tokio::join!(coordinator.resolve::<MemoryDirectory>(slow), async {
        // let the first drop get going before the second one arrives
        tokio::task::yield_now().await;
        coordinator.resolve::<MemoryDirectory>(fast).await
    });

    assert!(matches!(
        old,
        Err(ResolverError::Superseded {
            generation: 1,
            current: 2
        })
    ));

    let new = new.unwrap();
    assert_eq!(new.generation, 2);
    let ResolutionOutcome::Package(package) = &new.outcome else {
        panic!("expected a package, got {:?}", new.outcome);
    };
    assert_eq!(package.name(), "new.glb");

    assert_eq!(
        coordinator.phase(),
        PhaseUpdate {
            generation: 2,
            phase: Phase::PackageReady
        }
    );
}

#[tokio::test]
async fn stale_transition_publishes_nothing() {
    let coordinator = ResolutionCoordinator::default();
    coordinator
        .resolve::<MemoryDirectory>(vec![package("model.glb")])
        .await
        .unwrap();
    let mut phases = coordinator.subscribe();

    // a newer drop has been counted, but not published anything yet
    coordinator.generation.fetch_add(1, Ordering::SeqCst);

    let mut trail = Vec::new();
    let err = coordinator
        .transition(1, Phase::Walking, &mut trail)
        .unwrap_err();
    assert!(matches!(
        err,
        ResolverError::Superseded {
            generation: 1,
            current: 2
        }
    ));
    assert!(trail.is_empty());
    assert!(!phases.has_changed().unwrap());
    assert_eq!(
        coordinator.phase(),
        PhaseUpdate {
            generation: 1,
            phase: Phase::PackageReady
        }
    );

    coordinator.transition(2, Phase::Idle, &mut trail).unwrap();
    assert_eq!(trail, [Phase::Idle]);
    assert_eq!(coordinator.phase().generation, 2);
}

#[tokio::test]
async fn manifest_is_preferred_over_packages() {
    let coordinator = ResolutionCoordinator::default();
    let mut payload = scene_drop();
    payload.push(package("model.glb"));
    payload.push(MemoryFile::untyped("z_other.gltf", r#"{"asset":{"version":"2.0"}}"#).into());

    let resolution = coordinator
        .resolve::<MemoryDirectory>(payload)
        .await
        .unwrap();

    assert_eq!(resolution.phase(), Phase::Ready);
    assert_eq!(resolution.report.skipped_roots, ["z_other.gltf", "model.glb"]);
}

#[tokio::test]
async fn first_package_by_name_wins() {
    let coordinator = ResolutionCoordinator::default();
    let resolution = coordinator
        .resolve::<MemoryDirectory>(vec![package("b.glb"), package("a.glb")])
        .await
        .unwrap();

    let ResolutionOutcome::Package(chosen) = &resolution.outcome else {
        panic!("expected a package");
    };
    assert_eq!(chosen.name(), "a.glb");
    assert_eq!(resolution.report.skipped_roots, ["b.glb"]);
}

#[test_log::test(tokio::test)]
async fn malformed_manifest_is_a_failure_not_an_error() {
    let coordinator = ResolutionCoordinator::default();
    let resolution = coordinator
        .resolve::<MemoryDirectory>(vec![
            MemoryDirectory::new("broken", vec![MemoryFile::untyped("scene.gltf", "{ not json").into()]).into(),
        ])
        .await
        .unwrap();

    assert!(matches!(resolution.outcome, ResolutionOutcome::NothingToLoad));
    assert_eq!(coordinator.phase().phase, Phase::NothingToLoad);

    let failures = &resolution.report.materialization_failures;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].path, "broken/scene.gltf");
    assert_eq!(failures[0].role, ResourceRole::Manifest);

    let mut parser = RecordingParser::default();
    assert!(coordinator.deliver(&resolution, &mut parser).unwrap().is_none());
}

#[tokio::test]
async fn malformed_manifest_falls_back_to_the_next_one() {
    let coordinator = ResolutionCoordinator::default();
    let resolution = coordinator
        .resolve::<MemoryDirectory>(vec![
            MemoryFile::untyped("a.gltf", "[").into(),
            MemoryFile::untyped("b.gltf", r#"{"asset":{"version":"2.0"}}"#).into(),
        ])
        .await
        .unwrap();

    assert_eq!(resolution.phase(), Phase::Ready);
    assert_eq!(resolution.report.materialization_failures.len(), 1);
    assert!(resolution.report.skipped_roots.is_empty());
}

#[tokio::test]
async fn empty_drop_has_nothing_to_load() {
    let coordinator = ResolutionCoordinator::default();
    let resolution = coordinator
        .resolve::<MemoryDirectory>(vec![MemoryFile::new("notes.txt", "text/plain", "hi").into()])
        .await
        .unwrap();

    assert_eq!(resolution.phase(), Phase::NothingToLoad);
    assert_eq!(resolution.report.ignored, ["notes.txt"]);
    assert!(resolution.report.is_clean());
}
