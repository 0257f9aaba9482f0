//! Kit content digest
//!
//! digest = "v" + base64url(SHA-256(JCS(inputs))), unpadded. JCS is the
//! RFC 8785 JSON Canonicalization Scheme, so field order and whitespace in the
//! stored Kit never affect the result.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use kit_api::{ConfigurationSpec, Kit};
use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("canonicalization error: {0}")]
    Canonicalization(String),
}

/// Output-affecting inputs of a Kit.
#[derive(Debug, Clone, Serialize)]
pub struct DigestInputs<'a> {
    pub operator_version: &'a str,
    pub image: Option<&'a str>,
    pub dependencies: &'a [String],
    pub configuration: &'a [ConfigurationSpec],
    pub repositories: &'a [String],
}

impl<'a> DigestInputs<'a> {
    pub fn for_kit(operator_version: &'a str, kit: &'a Kit) -> Self {
        Self {
            operator_version,
            image: kit.spec.image.as_deref(),
            dependencies: &kit.spec.dependencies,
            configuration: &kit.spec.configuration,
            repositories: &kit.spec.repositories,
        }
    }

    pub fn compute(&self) -> Result<String, DigestError> {
        let jcs_bytes = serde_json_canonicalizer::to_vec(self)
            .map_err(|e| DigestError::Canonicalization(e.to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(&jcs_bytes);
        Ok(format!("v{}", URL_SAFE_NO_PAD.encode(hasher.finalize())))
    }
}

/// Digest of a Kit's spec under the given operator version.
pub fn compute_for_kit(operator_version: &str, kit: &Kit) -> Result<String, DigestError> {
    DigestInputs::for_kit(operator_version, kit).compute()
}
