//! Error types for parsing API enums from strings.

use thiserror::Error;

/// Returned when a phase, cluster or strategy name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseError {
    /// What was being parsed (e.g. "cluster type").
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl ParseError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}
