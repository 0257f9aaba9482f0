//! Build completion and dependent Integration notification

mod fixtures;

use fixtures::*;
use kit_api::{Artifact, Build, BuildPhase, IntegrationPhase, Kit, KitPhase};
use kit_operator::notify::NotifyError;
use kit_operator::store::{FailureConfig, Operation, Store};
use kit_operator::{ActionError, InMemoryStore, ReconcileContext};

/// A BuildRunning Kit whose Build finished in `phase`.
fn finished_build(store: &InMemoryStore, name: &str, phase: BuildPhase) -> Kit {
    let kit = create_kit_in_phase(store, name, KitPhase::BuildRunning);
    let mut build = Build::new(NAMESPACE, name);
    build.status.phase = phase;
    if phase == BuildPhase::Succeeded {
        build.status.image = Some("img:1".to_string());
        build.status.public_image = Some("public/img:1".to_string());
        build.status.base_image = Some("eclipse-temurin:17-jre".to_string());
        build.status.artifacts = vec![Artifact::new(
            "a",
            "/tmp/artifacts/a.jar",
            "dependencies/a.jar",
        )];
    }
    store.create(&build).unwrap();
    kit
}

#[test]
fn test_succeeded_build_makes_kit_ready() {
    let store = kubernetes_store();
    finished_build(&store, "kit-a", BuildPhase::Succeeded);
    create_integration(&store, "it-1", "kit-a");

    reconciler(&store)
        .reconcile(&ReconcileContext::new(), &key("kit-a"))
        .unwrap();

    let kit = kit(&store, "kit-a");
    assert_eq!(kit.status.phase, KitPhase::Ready);
    assert_eq!(kit.status.image.as_deref(), Some("img:1"));
    assert_eq!(kit.status.public_image.as_deref(), Some("public/img:1"));
    assert_eq!(kit.status.base_image.as_deref(), Some("eclipse-temurin:17-jre"));
    assert_eq!(kit.status.artifacts.len(), 1);
    assert_eq!(kit.status.artifacts[0].id, "a");
    assert_eq!(kit.status.artifacts[0].target, "dependencies/a.jar");
    assert!(kit.status.artifacts[0].location.is_empty());
    assert_eq!(integration_phase(&store, "it-1"), IntegrationPhase::ResolvingKit);
}

#[test]
fn test_only_exact_kit_name_is_notified() {
    let store = kubernetes_store();
    finished_build(&store, "kit-a", BuildPhase::Succeeded);
    create_integration(&store, "exact", "kit-a");
    create_integration(&store, "prefix", "kit");
    create_integration(&store, "longer", "kit-ab");
    store
        .create(&kit_api::Integration::new(NAMESPACE, "unbound"))
        .unwrap();

    reconciler(&store)
        .reconcile(&ReconcileContext::new(), &key("kit-a"))
        .unwrap();

    assert_eq!(integration_phase(&store, "exact"), IntegrationPhase::ResolvingKit);
    assert_eq!(integration_phase(&store, "prefix"), IntegrationPhase::BuildingKit);
    assert_eq!(integration_phase(&store, "longer"), IntegrationPhase::BuildingKit);
    assert_eq!(integration_phase(&store, "unbound"), IntegrationPhase::None);
}

#[test]
fn test_notification_failure_is_reported_after_ready() {
    let store = kubernetes_store();
    finished_build(&store, "kit-a", BuildPhase::Succeeded);
    for name in ["it-1", "it-2", "it-3"] {
        create_integration(&store, name, "kit-a");
    }
    store.inject_failure(
        Operation::UpdateStatus,
        "Integration",
        FailureConfig::error("unavailable").with_skip(1),
    );

    let err = reconciler(&store)
        .reconcile(&ReconcileContext::new(), &key("kit-a"))
        .unwrap_err();

    match &err {
        ActionError::Notify(NotifyError::Update { failed, updated, .. }) => {
            assert_eq!(failed, "it-2");
            assert_eq!(updated, &vec!["it-1".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.exit_code(), 50);
    // Ready is written before the walk starts
    assert_eq!(kit(&store, "kit-a").status.phase, KitPhase::Ready);
    assert_eq!(integration_phase(&store, "it-1"), IntegrationPhase::ResolvingKit);
    assert_eq!(integration_phase(&store, "it-2"), IntegrationPhase::BuildingKit);
    assert_eq!(integration_phase(&store, "it-3"), IntegrationPhase::BuildingKit);
}

#[test]
fn test_concurrent_phase_change_blocks_ready() {
    let store = kubernetes_store();
    let observed = finished_build(&store, "kit-a", BuildPhase::Succeeded);
    create_integration(&store, "it-1", "kit-a");

    // Another writer moves the Kit after this pass read it
    let mut moved = observed.clone();
    moved.status.phase = KitPhase::Error;
    store.update_status(&moved).unwrap();
    store.clear_journal();

    let err = reconciler(&store)
        .handle(&ReconcileContext::new(), &observed)
        .unwrap_err();

    match err {
        ActionError::PhaseConflict { expected, found, .. } => {
            assert_eq!(expected, KitPhase::BuildRunning);
            assert_eq!(found, KitPhase::Error);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(kit(&store, "kit-a").status.phase, KitPhase::Error);
    assert_eq!(integration_phase(&store, "it-1"), IntegrationPhase::BuildingKit);
    assert!(store.journal().is_empty());
}

#[test]
fn test_failed_build_records_failure() {
    let store = kubernetes_store();
    finished_build(&store, "kit-a", BuildPhase::Error);
    create_integration(&store, "it-1", "kit-a");

    reconciler(&store)
        .reconcile(&ReconcileContext::new(), &key("kit-a"))
        .unwrap();

    let kit = kit(&store, "kit-a");
    assert_eq!(kit.status.phase, KitPhase::Error);
    let failure = kit.status.failure.unwrap();
    assert_eq!(failure.reason, "build Error");
    assert!(kit.status.image.is_none());
    assert_eq!(integration_phase(&store, "it-1"), IntegrationPhase::BuildingKit);
}

#[test]
fn test_build_error_message_becomes_failure_reason() {
    let store = kubernetes_store();
    finished_build(&store, "kit-a", BuildPhase::Interrupted);
    let mut build: Build = store.get(&key("kit-a")).unwrap();
    build.status.error = Some("pod evicted".to_string());
    store.update_status(&build).unwrap();

    reconciler(&store)
        .reconcile(&ReconcileContext::new(), &key("kit-a"))
        .unwrap();

    let kit = kit(&store, "kit-a");
    assert_eq!(kit.status.phase, KitPhase::Error);
    assert_eq!(kit.status.failure.unwrap().reason, "pod evicted");
}

#[test]
fn test_running_build_leaves_kit_alone() {
    let store = kubernetes_store();
    finished_build(&store, "kit-a", BuildPhase::Running);
    store.clear_journal();

    reconciler(&store)
        .reconcile(&ReconcileContext::new(), &key("kit-a"))
        .unwrap();

    assert_eq!(kit(&store, "kit-a").status.phase, KitPhase::BuildRunning);
    assert!(store.journal().is_empty());
}

#[test]
fn test_unrecognised_build_phase_leaves_kit_alone() {
    let store = kubernetes_store();
    create_kit_in_phase(&store, "kit-a", KitPhase::BuildRunning);
    create_integration(&store, "it-1", "kit-a");
    let build: Build = serde_json::from_value(serde_json::json!({
        "metadata": {"namespace": NAMESPACE, "name": "kit-a"},
        "status": {"phase": "Cancelled"}
    }))
    .unwrap();
    store.create(&build).unwrap();
    store.clear_journal();

    reconciler(&store)
        .reconcile(&ReconcileContext::new(), &key("kit-a"))
        .unwrap();

    assert_eq!(kit(&store, "kit-a").status.phase, KitPhase::BuildRunning);
    assert_eq!(integration_phase(&store, "it-1"), IntegrationPhase::BuildingKit);
    assert!(store.journal().is_empty());
}

#[test]
fn test_missing_build_while_running_is_an_error() {
    let store = kubernetes_store();
    create_kit_in_phase(&store, "kit-a", KitPhase::BuildRunning);

    let err = reconciler(&store)
        .reconcile(&ReconcileContext::new(), &key("kit-a"))
        .unwrap_err();

    assert!(matches!(err, ActionError::Store(ref e) if e.is_not_found()));
}
