//! Runtime catalogs
//!
//! A catalog pins a runtime version and the dependency every Kit built on it
//! must carry. Platforms constrain the catalog with a semver requirement; the
//! highest matching catalog wins.

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

/// Group/artifact of the runtime dependency injected into every Kit.
pub const RUNTIME_ARTIFACT: &str = "mvn:org.kit.runtime:kit-runtime-main";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeCatalog {
    pub version: String,
    pub runtime_version: String,
    /// Base image used when the platform does not set one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_image: Option<String>,
}

impl RuntimeCatalog {
    pub fn new(version: impl Into<String>, runtime_version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            runtime_version: runtime_version.into(),
            base_image: None,
        }
    }

    pub fn with_base_image(mut self, image: impl Into<String>) -> Self {
        self.base_image = Some(image.into());
        self
    }

    /// Dependency coordinate of the runtime this catalog pins.
    pub fn runtime_dependency(&self) -> String {
        format!("{}:{}", RUNTIME_ARTIFACT, self.runtime_version)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("invalid catalog version constraint {constraint:?}: {source}")]
    InvalidConstraint {
        constraint: String,
        #[source]
        source: semver::Error,
    },
}

#[derive(Debug, Clone, Default)]
pub struct CatalogRegistry {
    catalogs: Vec<RuntimeCatalog>,
}

impl CatalogRegistry {
    pub fn new(catalogs: Vec<RuntimeCatalog>) -> Self {
        Self { catalogs }
    }

    /// Catalogs shipped with the operator.
    pub fn builtin() -> Self {
        Self::new(vec![
            RuntimeCatalog::new("1.0.0", "1.0.4").with_base_image("eclipse-temurin:11-jre"),
            RuntimeCatalog::new("1.1.0", "1.1.2").with_base_image("eclipse-temurin:11-jre"),
            RuntimeCatalog::new("1.2.0", "1.2.1").with_base_image("eclipse-temurin:17-jre"),
            RuntimeCatalog::new("2.0.0", "2.0.0").with_base_image("eclipse-temurin:17-jre"),
        ])
    }

    pub fn catalogs(&self) -> &[RuntimeCatalog] {
        &self.catalogs
    }

    /// Exact lookup, used to stay on the catalog an existing Build was made with.
    pub fn find(&self, version: &str) -> Option<&RuntimeCatalog> {
        self.catalogs.iter().find(|c| c.version == version)
    }

    /// Highest catalog satisfying `constraint` and, when given, pinned to
    /// `runtime_version`. No constraint matches every catalog.
    pub fn resolve(
        &self,
        constraint: Option<&str>,
        runtime_version: Option<&str>,
    ) -> Result<Option<&RuntimeCatalog>, CatalogError> {
        let requirement = match constraint {
            Some(c) => VersionReq::parse(c).map_err(|source| CatalogError::InvalidConstraint {
                constraint: c.to_string(),
                source,
            })?,
            None => VersionReq::STAR,
        };

        let best = self
            .catalogs
            .iter()
            .filter(|c| runtime_version.map_or(true, |r| c.runtime_version == r))
            .filter_map(|c| Version::parse(&c.version).ok().map(|v| (v, c)))
            .filter(|(v, _)| requirement.matches(v))
            .max_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, c)| c);

        Ok(best)
    }
}
