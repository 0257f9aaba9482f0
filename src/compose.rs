//! Pipeline composition
//!
//! Computes the per-pass [`Environment`] for a Kit or an Integration: which
//! platform and runtime catalog apply, the sanitized classpath, and for Kits
//! being built the ordered step pipeline. The Environment is rebuilt on every
//! pass and never persisted.

use std::collections::BTreeSet;

use kit_api::{Build, Integration, Kit, KitPhase, Platform};
use kit_builder::{pipeline_for, step_ids_for, PipelineError, Step, StepPhase};
use tracing::debug;

use crate::catalog::{CatalogError, CatalogRegistry, RuntimeCatalog};
use crate::context::{Cancelled, ReconcileContext};
use crate::platform::{current_platform, PlatformError};
use crate::store::Store;

/// What is being composed. Composition may rewrite the target's dependency
/// list and, for a Kit, its catalog fields in status.
#[derive(Debug)]
pub enum Target<'a> {
    Kit(&'a mut Kit),
    Integration(&'a mut Integration),
}

impl Target<'_> {
    fn namespace(&self) -> &str {
        match self {
            Target::Kit(kit) => &kit.metadata.namespace,
            Target::Integration(it) => &it.metadata.namespace,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub catalog: Option<RuntimeCatalog>,
    pub runtime_version: Option<String>,
    /// Platform snapshot, base image defaulted from the catalog
    pub platform: Platform,
    pub classpath: BTreeSet<String>,
    /// Execution order
    pub steps: Vec<Step>,
    pub build_dir: Option<String>,
}

impl Environment {
    pub fn step_ids(&self) -> Vec<String> {
        step_ids_for(&self.steps)
    }

    pub fn publisher(&self) -> Option<Step> {
        self.steps
            .iter()
            .copied()
            .find(|s| s.phase() == StepPhase::ApplicationPublish)
    }

    /// Catalog and runtime version, when both resolved.
    pub fn resolved_runtime(&self) -> Option<(&RuntimeCatalog, &str)> {
        match (&self.catalog, &self.runtime_version) {
            (Some(catalog), Some(runtime)) => Some((catalog, runtime.as_str())),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl ComposeError {
    /// The platform is missing or not ready yet.
    pub fn is_platform_pending(&self) -> bool {
        matches!(self, ComposeError::Platform(e) if e.is_soft())
    }
}

pub trait Composer: Send + Sync {
    /// Compute the environment for `target`.
    ///
    /// `build` is the existing Build, if any; its catalog is reused so that a
    /// rebuild targets the same runtime.
    fn compose<S: Store>(
        &self,
        ctx: &ReconcileContext,
        store: &S,
        build: Option<&Build>,
        target: Target<'_>,
    ) -> Result<Environment, ComposeError>;
}

/// Trim, drop blanks, dedupe and sort.
pub fn sanitize_dependencies<'a, I>(dependencies: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a String>,
{
    dependencies
        .into_iter()
        .map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect()
}

/// Default composer backed by a catalog registry.
#[derive(Debug, Clone)]
pub struct CatalogComposer {
    registry: CatalogRegistry,
}

impl Default for CatalogComposer {
    fn default() -> Self {
        Self::new(CatalogRegistry::builtin())
    }
}

impl CatalogComposer {
    pub fn new(registry: CatalogRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &CatalogRegistry {
        &self.registry
    }

    fn catalog_for(
        &self,
        platform: &Platform,
        build: Option<&Build>,
    ) -> Result<Option<RuntimeCatalog>, CatalogError> {
        if let Some(existing) = build
            .map(|b| b.spec.catalog_version.as_str())
            .filter(|v| !v.is_empty())
            .and_then(|v| self.registry.find(v))
        {
            return Ok(Some(existing.clone()));
        }

        let settings = &platform.spec.build;
        Ok(self
            .registry
            .resolve(
                settings.catalog_version.as_deref(),
                settings.runtime_version.as_deref(),
            )?
            .cloned())
    }
}

impl Composer for CatalogComposer {
    fn compose<S: Store>(
        &self,
        ctx: &ReconcileContext,
        store: &S,
        build: Option<&Build>,
        target: Target<'_>,
    ) -> Result<Environment, ComposeError> {
        ctx.check()?;

        let mut platform = current_platform(store, target.namespace())?;
        let catalog = self.catalog_for(&platform, build)?;
        if platform.spec.build.base_image.is_none() {
            platform.spec.build.base_image = catalog.as_ref().and_then(|c| c.base_image.clone());
        }

        let mut env = Environment {
            runtime_version: catalog.as_ref().map(|c| c.runtime_version.clone()),
            catalog,
            platform,
            classpath: BTreeSet::new(),
            steps: Vec::new(),
            build_dir: None,
        };

        match target {
            Target::Kit(kit) => {
                let mut dependencies = sanitize_dependencies(&kit.spec.dependencies);
                if let Some(catalog) = &env.catalog {
                    dependencies.insert(catalog.runtime_dependency());
                }
                kit.spec.dependencies = dependencies.iter().cloned().collect();
                kit.status.catalog_version = env.catalog.as_ref().map(|c| c.version.clone());
                kit.status.runtime_version = env.runtime_version.clone();
                kit.status.platform = Some(env.platform.metadata.name.clone());
                env.classpath = dependencies;

                if kit.status.phase != KitPhase::None {
                    let pipeline = pipeline_for(
                        env.platform.spec.cluster,
                        env.platform.spec.build.publish_strategy,
                    )?;
                    env.steps = pipeline.steps;
                    env.build_dir = pipeline.build_dir;
                }
            }
            Target::Integration(integration) => {
                let dependencies = sanitize_dependencies(&integration.spec.dependencies);
                integration.spec.dependencies = dependencies.iter().cloned().collect();
                env.classpath = dependencies;
            }
        }

        debug!(
            platform = %env.platform.metadata.name,
            catalog = env.catalog.as_ref().map(|c| c.version.as_str()).unwrap_or("<none>"),
            steps = env.steps.len(),
            "composed environment"
        );
        Ok(env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use kit_api::{ClusterType, PlatformPhase, PublishStrategy};
    use kit_builder::{kaniko, s2i};

    fn store_with(platform: Platform) -> InMemoryStore {
        let store = InMemoryStore::new();
        store.create(&platform.with_phase(PlatformPhase::Ready)).unwrap();
        store
    }

    #[test]
    fn test_sanitize_dependencies() {
        let deps = vec![
            " camel:log ".to_string(),
            "".to_string(),
            "camel:timer".to_string(),
            "camel:log".to_string(),
        ];
        let sanitized: Vec<String> = sanitize_dependencies(&deps).into_iter().collect();
        assert_eq!(sanitized, vec!["camel:log", "camel:timer"]);
    }

    #[test]
    fn test_unset_kit_phase_gets_no_steps() {
        let store = store_with(Platform::new("ns", "p"));
        let mut kit = Kit::new("ns", "kit-a").with_dependencies(["camel:log", "camel:log"]);

        let env = CatalogComposer::default()
            .compose(&ReconcileContext::new(), &store, None, Target::Kit(&mut kit))
            .unwrap();

        assert!(env.steps.is_empty());
        assert!(env.resolved_runtime().is_some());
        assert_eq!(kit.status.platform.as_deref(), Some("p"));
        assert_eq!(kit.status.catalog_version.as_deref(), Some("2.0.0"));
        // deduplicated, plus the runtime dependency
        assert_eq!(kit.spec.dependencies.len(), 2);
        assert!(kit.spec.dependencies.iter().any(|d| d.starts_with(crate::catalog::RUNTIME_ARTIFACT)));
    }

    #[test]
    fn test_kaniko_pipeline_for_kubernetes() {
        let store = store_with(
            Platform::new("ns", "p")
                .with_cluster(ClusterType::Kubernetes)
                .with_strategy(PublishStrategy::Kaniko),
        );
        let mut kit = Kit::new("ns", "kit-a").with_phase(KitPhase::BuildSubmitted);

        let env = CatalogComposer::default()
            .compose(&ReconcileContext::new(), &store, None, Target::Kit(&mut kit))
            .unwrap();

        assert_eq!(env.steps.len(), 7);
        assert_eq!(env.publisher(), Some(kaniko::PUBLISHER));
        assert_eq!(env.build_dir.as_deref(), Some(kaniko::BUILD_DIR));
    }

    #[test]
    fn test_s2i_pipeline_for_openshift() {
        let store = store_with(
            Platform::new("ns", "p")
                .with_cluster(ClusterType::OpenShift)
                .with_strategy(PublishStrategy::S2i),
        );
        let mut kit = Kit::new("ns", "kit-a").with_phase(KitPhase::BuildSubmitted);

        let env = CatalogComposer::default()
            .compose(&ReconcileContext::new(), &store, None, Target::Kit(&mut kit))
            .unwrap();

        assert_eq!(env.steps.len(), 7);
        assert_eq!(env.publisher(), Some(s2i::PUBLISHER));
    }

    #[test]
    fn test_integration_target_gets_no_steps() {
        let store = store_with(Platform::new("ns", "p"));
        let mut integration = Integration::new("ns", "it");
        integration.spec.dependencies = vec!["b".to_string(), " a".to_string()];

        let env = CatalogComposer::default()
            .compose(
                &ReconcileContext::new(),
                &store,
                None,
                Target::Integration(&mut integration),
            )
            .unwrap();

        assert!(env.steps.is_empty());
        assert!(env.catalog.is_some());
        assert_eq!(integration.spec.dependencies, vec!["a", "b"]);
    }

    #[test]
    fn test_existing_build_keeps_catalog() {
        let mut platform = Platform::new("ns", "p");
        platform.spec.build.catalog_version = Some("^1.0".to_string());
        let store = store_with(platform);

        let mut build = Build::new("ns", "kit-a");
        build.spec.catalog_version = "1.0.0".to_string();
        let mut kit = Kit::new("ns", "kit-a");

        let env = CatalogComposer::default()
            .compose(&ReconcileContext::new(), &store, Some(&build), Target::Kit(&mut kit))
            .unwrap();
        assert_eq!(env.catalog.map(|c| c.version), Some("1.0.0".to_string()));
    }

    #[test]
    fn test_unmatched_constraint_leaves_catalog_unresolved() {
        let mut platform = Platform::new("ns", "p");
        platform.spec.build.catalog_version = Some(">=9.0".to_string());
        let store = store_with(platform);
        let mut kit = Kit::new("ns", "kit-a");

        let env = CatalogComposer::default()
            .compose(&ReconcileContext::new(), &store, None, Target::Kit(&mut kit))
            .unwrap();
        assert!(env.resolved_runtime().is_none());
    }

    #[test]
    fn test_missing_platform_is_pending() {
        let store = InMemoryStore::new();
        let mut kit = Kit::new("ns", "kit-a");
        let err = CatalogComposer::default()
            .compose(&ReconcileContext::new(), &store, None, Target::Kit(&mut kit))
            .unwrap_err();
        assert!(err.is_platform_pending());
    }
}
