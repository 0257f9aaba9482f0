//! JSON snapshot of store contents, used by `kitctl`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use kit_api::{Build, Integration, Kit, Platform};
use serde::{Deserialize, Serialize};

use crate::store::{InMemoryStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid snapshot {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Every resource the operator reads or writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub platforms: Vec<Platform>,
    #[serde(default)]
    pub kits: Vec<Kit>,
    #[serde(default)]
    pub builds: Vec<Build>,
    #[serde(default)]
    pub integrations: Vec<Integration>,
}

impl Snapshot {
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let contents = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| SnapshotError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| SnapshotError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load into a fresh store, keeping uids and resource versions.
    pub fn into_store(self) -> Result<InMemoryStore, StoreError> {
        let store = InMemoryStore::new();
        for platform in &self.platforms {
            store.seed(platform)?;
        }
        for kit in &self.kits {
            store.seed(kit)?;
        }
        for build in &self.builds {
            store.seed(build)?;
        }
        for integration in &self.integrations {
            store.seed(integration)?;
        }
        Ok(store)
    }

    pub fn capture(store: &InMemoryStore) -> Result<Self, StoreError> {
        Ok(Self {
            platforms: store.list_all()?,
            kits: store.list_all()?,
            builds: store.list_all()?,
            integrations: store.list_all()?,
        })
    }
}
