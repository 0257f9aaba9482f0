//! Reconciling a snapshot file the way `kitctl reconcile` does

mod fixtures;

use std::sync::Arc;

use fixtures::*;
use kit_api::{ClusterType, IntegrationPhase, Kit, KitPhase, Platform, PlatformPhase};
use kit_operator::{
    BuildSimulator, CatalogComposer, Controller, ControllerConfig, KitReconciler,
    ReconcileContext, Snapshot,
};
use tempfile::TempDir;

#[test]
fn test_snapshot_reconciles_to_ready_and_round_trips() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");

    let snapshot = Snapshot {
        platforms: vec![Platform::new(NAMESPACE, "platform")
            .with_cluster(ClusterType::Kubernetes)
            .with_phase(PlatformPhase::Ready)],
        kits: vec![Kit::new(NAMESPACE, "kit-a").with_dependencies(["camel:log"])],
        builds: Vec::new(),
        integrations: vec![kit_api::Integration::new(NAMESPACE, "it-1")
            .bound_to("kit-a", IntegrationPhase::BuildingKit)],
    };
    snapshot.save(&path).unwrap();

    let store = Arc::new(Snapshot::load(&path).unwrap().into_store().unwrap());
    let controller = Controller::new(
        KitReconciler::new(Arc::clone(&store), CatalogComposer::default(), OPERATOR_VERSION),
        ControllerConfig::default(),
    );
    let simulator = BuildSimulator::new();
    let report = controller
        .run_until_settled(&ReconcileContext::new(), NAMESPACE, |s| {
            simulator.advance_all(s, NAMESPACE).unwrap() > 0
        })
        .unwrap();
    assert_eq!(report.phases.get("kit-a"), Some(&KitPhase::Ready));

    Snapshot::capture(&store).unwrap().save(&path).unwrap();
    let saved = Snapshot::load(&path).unwrap();

    assert_eq!(saved.kits.len(), 1);
    assert_eq!(saved.kits[0].status.phase, KitPhase::Ready);
    assert_eq!(saved.builds.len(), 1);
    assert_eq!(
        saved.builds[0].metadata.controller().map(|o| o.uid.as_str()),
        Some(saved.kits[0].metadata.uid.as_str())
    );
    assert_eq!(saved.integrations[0].status.phase, IntegrationPhase::ResolvingKit);
}

#[test]
fn test_resumed_snapshot_keeps_existing_build() {
    let store = kubernetes_store();
    create_kit(&store, "kit-a", &[]);
    let ctx = ReconcileContext::new();
    let reconciler = reconciler(&store);
    reconciler.reconcile(&ctx, &key("kit-a")).unwrap();
    reconciler.reconcile(&ctx, &key("kit-a")).unwrap();
    let before = builds(&store);
    assert_eq!(before.len(), 1);

    // Restart from a saved snapshot: the in-flight Build is not resubmitted
    let restored = Arc::new(Snapshot::capture(&store).unwrap().into_store().unwrap());
    fixtures::reconciler(&restored).reconcile(&ctx, &key("kit-a")).unwrap();

    let after = builds(&restored);
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].metadata.uid, before[0].metadata.uid);
}
