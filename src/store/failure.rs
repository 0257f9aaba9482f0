//! Failure injection for the in-memory store
//!
//! Lets tests fail a specific operation on a specific kind, optionally only
//! after some calls have gone through and only for a bounded number of calls.

use std::collections::HashMap;

use super::Operation;

/// Failure configuration for an (operation, kind) pair
#[derive(Debug, Clone)]
pub struct FailureConfig {
    /// Error message to return
    pub message: String,
    /// Number of matching calls to let through before failing
    pub skip: u32,
    /// Number of times to fail before succeeding (None = always fail)
    pub fail_count: Option<u32>,
}

impl FailureConfig {
    /// Create a config that always fails with the given message
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            skip: 0,
            fail_count: None,
        }
    }

    /// Let `count` calls succeed before the first failure
    pub fn with_skip(mut self, count: u32) -> Self {
        self.skip = count;
        self
    }

    /// Set the number of times to fail before succeeding
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }
}

type FailureKey = (Operation, &'static str);

/// Failure injector for the in-memory store
#[derive(Debug, Default)]
pub struct FailureInjector {
    configs: HashMap<FailureKey, FailureConfig>,
    call_counts: HashMap<FailureKey, u32>,
}

impl FailureInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a failure for an operation on a kind
    pub fn inject(&mut self, op: Operation, kind: &'static str, config: FailureConfig) {
        self.configs.insert((op, kind), config);
        self.call_counts.insert((op, kind), 0);
    }

    /// Clear all failure injections
    pub fn clear(&mut self) {
        self.configs.clear();
        self.call_counts.clear();
    }

    /// Record a call and return the failure message if this call should fail
    pub fn check(&mut self, op: Operation, kind: &'static str) -> Option<String> {
        let config = self.configs.get(&(op, kind))?;
        let count = self.call_counts.entry((op, kind)).or_insert(0);
        *count += 1;

        if *count <= config.skip {
            return None;
        }

        if let Some(limit) = config.fail_count {
            if *count - config.skip > limit {
                return None;
            }
        }

        Some(config.message.clone())
    }
}
