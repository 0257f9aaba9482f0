//! Shared setup for the integration tests
//!
//! Builds in-memory stores with a ready platform and reconcilers wired to the
//! builtin catalog registry.

#![allow(dead_code)]

use std::sync::Arc;

use kit_api::{
    Build, BuildPhase, ClusterType, Integration, IntegrationPhase, Kit, KitPhase, ObjectKey,
    Platform, PlatformPhase, PublishStrategy,
};
use kit_operator::store::Store;
use kit_operator::{CatalogComposer, InMemoryStore, KitReconciler};

pub const NAMESPACE: &str = "ns";
pub const OPERATOR_VERSION: &str = "1.0.0";

pub type Reconciler = KitReconciler<InMemoryStore, CatalogComposer>;

/// Store with a ready Kubernetes platform publishing through Kaniko.
pub fn kubernetes_store() -> Arc<InMemoryStore> {
    store_with_platform(ClusterType::Kubernetes, PublishStrategy::Kaniko)
}

/// Store with a ready OpenShift platform publishing through S2I.
pub fn openshift_store() -> Arc<InMemoryStore> {
    store_with_platform(ClusterType::OpenShift, PublishStrategy::S2i)
}

pub fn store_with_platform(cluster: ClusterType, strategy: PublishStrategy) -> Arc<InMemoryStore> {
    let store = InMemoryStore::new();
    store
        .create(
            &Platform::new(NAMESPACE, "platform")
                .with_cluster(cluster)
                .with_strategy(strategy)
                .with_registry("registry.test")
                .with_phase(PlatformPhase::Ready),
        )
        .unwrap();
    Arc::new(store)
}

pub fn reconciler(store: &Arc<InMemoryStore>) -> Reconciler {
    KitReconciler::new(Arc::clone(store), CatalogComposer::default(), OPERATOR_VERSION)
}

pub fn key(name: &str) -> ObjectKey {
    ObjectKey::new(NAMESPACE, name)
}

pub fn create_kit(store: &InMemoryStore, name: &str, dependencies: &[&str]) -> Kit {
    store
        .create(&Kit::new(NAMESPACE, name).with_dependencies(dependencies.iter().copied()))
        .unwrap()
}

pub fn create_kit_in_phase(store: &InMemoryStore, name: &str, phase: KitPhase) -> Kit {
    store
        .create(&Kit::new(NAMESPACE, name).with_phase(phase))
        .unwrap()
}

pub fn create_integration(store: &InMemoryStore, name: &str, kit: &str) -> Integration {
    store
        .create(&Integration::new(NAMESPACE, name).bound_to(kit, IntegrationPhase::BuildingKit))
        .unwrap()
}

/// Write a Build status the way the build engine would.
pub fn set_build_phase(store: &InMemoryStore, name: &str, phase: BuildPhase) -> Build {
    let mut build: Build = store.get(&key(name)).unwrap();
    build.status.phase = phase;
    store.update_status(&build).unwrap()
}

pub fn kit(store: &InMemoryStore, name: &str) -> Kit {
    store.get(&key(name)).unwrap()
}

pub fn builds(store: &InMemoryStore) -> Vec<Build> {
    store.list(NAMESPACE).unwrap()
}

pub fn integration_phase(store: &InMemoryStore, name: &str) -> IntegrationPhase {
    store
        .get::<Integration>(&key(name))
        .unwrap()
        .status
        .phase
}
