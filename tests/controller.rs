//! Controller loop driven end to end with the simulated build engine

mod fixtures;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use fixtures::*;
use kit_api::{BuildPhase, IntegrationPhase, KitPhase, Platform};
use kit_operator::store::{FailureConfig, Operation, Store};
use kit_operator::{
    ActionError, BuildSimulator, Controller, ControllerConfig, InMemoryStore, Outcome,
    ReconcileContext,
};

fn controller(store: &Arc<InMemoryStore>, config: ControllerConfig) -> Controller<InMemoryStore, kit_operator::CatalogComposer> {
    Controller::new(reconciler(store), config)
}

fn fast_config() -> ControllerConfig {
    ControllerConfig {
        max_retries: 3,
        retry_backoff: Duration::from_millis(1),
        retry_backoff_max: Duration::from_millis(5),
        max_concurrent: 4,
        max_passes: 20,
    }
}

fn settle(
    store: &Arc<InMemoryStore>,
    simulator: &BuildSimulator,
) -> kit_operator::controller::SettleReport {
    controller(store, fast_config())
        .run_until_settled(&ReconcileContext::new(), NAMESPACE, |s| {
            simulator.advance_all(s, NAMESPACE).unwrap() > 0
        })
        .unwrap()
}

#[test]
fn test_kit_reaches_ready_and_notifies() {
    let store = kubernetes_store();
    create_kit(&store, "kit-a", &["camel:log"]);
    create_integration(&store, "it-1", "kit-a");

    let report = settle(&store, &BuildSimulator::new());

    assert!(report.last_pass.is_clean());
    assert_eq!(report.phases.get("kit-a"), Some(&KitPhase::Ready));
    let kit = kit(&store, "kit-a");
    assert!(kit
        .status
        .image
        .as_deref()
        .unwrap()
        .starts_with("registry.test/ns/kit-kit-a:"));
    assert!(!kit.status.artifacts.is_empty());
    assert!(kit.status.artifacts.iter().all(|a| a.location.is_empty()));
    assert_eq!(integration_phase(&store, "it-1"), IntegrationPhase::ResolvingKit);
    assert_eq!(builds(&store).len(), 1);
    assert_eq!(store.count_writes(Operation::Create, "Build"), 1);
}

#[test]
fn test_failed_build_settles_in_error() {
    let store = kubernetes_store();
    create_kit(&store, "kit-a", &[]);
    create_integration(&store, "it-1", "kit-a");
    let simulator = BuildSimulator::new();
    simulator.set_progression("kit-a", vec![BuildPhase::Running, BuildPhase::Error]);

    let report = settle(&store, &simulator);

    assert_eq!(report.phases.get("kit-a"), Some(&KitPhase::Error));
    let failure = kit(&store, "kit-a").status.failure.unwrap();
    assert_eq!(failure.reason, "simulated build failure");
    assert_eq!(integration_phase(&store, "it-1"), IntegrationPhase::BuildingKit);
}

#[test]
fn test_many_kits_settle_in_parallel() {
    let store = openshift_store();
    let names: Vec<String> = (0..8).map(|i| format!("kit-{i}")).collect();
    for name in &names {
        create_kit(&store, name, &["camel:log"]);
        create_integration(&store, &format!("it-{name}"), name);
    }

    let report = settle(&store, &BuildSimulator::new());

    assert_eq!(report.phases.len(), 8);
    assert!(report.phases.values().all(|p| *p == KitPhase::Ready));
    assert_eq!(builds(&store).len(), 8);
    assert_eq!(store.count_writes(Operation::Create, "Build"), 8);
    for name in &names {
        assert_eq!(
            integration_phase(&store, &format!("it-{name}")),
            IntegrationPhase::ResolvingKit
        );
    }
}

#[test]
fn test_held_build_is_never_duplicated() {
    let store = kubernetes_store();
    create_kit(&store, "kit-a", &[]);
    let simulator = BuildSimulator::new();
    simulator.hold("kit-a", BuildPhase::Pending);

    let report = settle(&store, &simulator);

    assert_eq!(report.phases.get("kit-a"), Some(&KitPhase::BuildSubmitted));
    assert_eq!(builds(&store).len(), 1);

    simulator.release("kit-a");
    let report = settle(&store, &simulator);
    assert_eq!(report.phases.get("kit-a"), Some(&KitPhase::Ready));
    assert_eq!(store.count_writes(Operation::Create, "Build"), 1);
}

#[test]
fn test_transient_failures_are_retried() {
    let store = kubernetes_store();
    create_kit_in_phase(&store, "kit-a", KitPhase::BuildSubmitted);
    store.inject_failure(
        Operation::Create,
        "Build",
        FailureConfig::error("apiserver unavailable").with_fail_count(2),
    );

    let result = controller(&store, fast_config()).reconcile_key(&ReconcileContext::new(), &key("kit-a"));

    assert_eq!(result.attempts, 3);
    assert!(matches!(result.result, Ok(Outcome::Ran(_))));
    assert_eq!(builds(&store).len(), 1);
}

#[test]
fn test_retries_give_up_after_limit() {
    let store = kubernetes_store();
    create_kit_in_phase(&store, "kit-a", KitPhase::BuildSubmitted);
    store.inject_failure(Operation::Create, "Build", FailureConfig::error("down"));

    let result = controller(&store, fast_config()).reconcile_key(&ReconcileContext::new(), &key("kit-a"));

    assert_eq!(result.attempts, 4);
    assert!(matches!(result.result, Err(ActionError::Replace(_))));
}

#[test]
fn test_cancellation_interrupts_backoff() {
    let store = kubernetes_store();
    create_kit_in_phase(&store, "kit-a", KitPhase::BuildSubmitted);
    store.inject_failure(Operation::Create, "Build", FailureConfig::error("down"));

    let config = ControllerConfig {
        max_retries: 10,
        retry_backoff: Duration::from_secs(5),
        retry_backoff_max: Duration::from_secs(5),
        ..fast_config()
    };
    let controller = controller(&store, config);
    let ctx = ReconcileContext::new();
    let canceller = ctx.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        canceller.cancel();
    });

    let started = Instant::now();
    let result = controller.reconcile_key(&ctx, &key("kit-a"));
    handle.join().unwrap();

    assert_eq!(result.attempts, 1);
    assert!(result.result.is_err());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_permanent_failure_settles_with_error() {
    let store = kubernetes_store();
    let mut platform: Platform = store.get(&key("platform")).unwrap();
    platform.spec.build.catalog_version = Some(">=9.0".to_string());
    store.update(&platform).unwrap();
    create_kit_in_phase(&store, "kit-a", KitPhase::BuildSubmitted);

    let report = settle(&store, &BuildSimulator::new());

    let failures: Vec<_> = report.last_pass.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, &key("kit-a"));
    assert!(matches!(failures[0].1, ActionError::MissingCatalog { .. }));
    assert_eq!(report.phases.get("kit-a"), Some(&KitPhase::BuildSubmitted));
}

#[test]
fn test_other_namespaces_untouched() {
    let store = kubernetes_store();
    store
        .create(&kit_api::Kit::new("elsewhere", "kit-b"))
        .unwrap();
    create_kit(&store, "kit-a", &[]);

    settle(&store, &BuildSimulator::new());

    let other: kit_api::Kit = store
        .get(&kit_api::ObjectKey::new("elsewhere", "kit-b"))
        .unwrap();
    assert_eq!(other.status.phase, KitPhase::None);
}
