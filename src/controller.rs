//! Outer reconcile loop
//!
//! Stands in for the watch loop of a real cluster: it feeds Kit keys to the
//! [`KitReconciler`], never runs two passes for the same key at once, runs
//! distinct keys on parallel threads and retries failed passes with
//! exponential backoff.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use kit_api::{Kit, KitPhase, ObjectKey};
use tracing::{debug, error, info, warn};

use crate::actions::{ActionError, KitReconciler, Outcome};
use crate::compose::Composer;
use crate::config::OperatorConfig;
use crate::context::{Cancelled, ReconcileContext, EXIT_CODE_CANCELLED};
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Retries after the first failed attempt
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub retry_backoff_max: Duration,
    pub max_concurrent: usize,
    pub max_passes: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::from(&OperatorConfig::default())
    }
}

impl From<&OperatorConfig> for ControllerConfig {
    fn from(config: &OperatorConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff(),
            retry_backoff_max: config.retry_backoff_max(),
            max_concurrent: config.max_concurrent_reconciles.max(1),
            max_passes: config.max_passes,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("cannot list kits in namespace {namespace}: {source}")]
    List {
        namespace: String,
        #[source]
        source: StoreError,
    },

    #[error("controller stopped: {0}")]
    Cancelled(#[from] Cancelled),

    #[error("namespace {namespace} did not settle after {passes} passes")]
    Unsettled { namespace: String, passes: u32 },
}

impl ControllerError {
    pub fn exit_code(&self) -> i32 {
        match self {
            ControllerError::List { .. } => 20,
            ControllerError::Cancelled(_) => EXIT_CODE_CANCELLED,
            ControllerError::Unsettled { .. } => 90,
        }
    }
}

/// Outcome of reconciling one key, after retries.
#[derive(Debug)]
pub struct KeyResult {
    pub key: ObjectKey,
    pub attempts: u32,
    pub result: Result<Outcome, ActionError>,
}

#[derive(Debug, Default)]
pub struct PassReport {
    pub results: Vec<KeyResult>,
}

impl PassReport {
    pub fn failures(&self) -> impl Iterator<Item = (&ObjectKey, &ActionError)> {
        self.results
            .iter()
            .filter_map(|r| r.result.as_ref().err().map(|e| (&r.key, e)))
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Result of [`Controller::run_until_settled`].
#[derive(Debug)]
pub struct SettleReport {
    pub passes: u32,
    /// Kit phases by name once settled
    pub phases: BTreeMap<String, KitPhase>,
    /// The final pass, including keys that kept failing
    pub last_pass: PassReport,
}

/// Observable state of a namespace; unchanged between passes means settled.
type Snapshot = BTreeMap<String, (KitPhase, u64)>;

pub struct Controller<S, C> {
    reconciler: KitReconciler<S, C>,
    config: ControllerConfig,
    locks: Mutex<HashMap<ObjectKey, Arc<Mutex<()>>>>,
}

impl<S: Store, C: Composer> Controller<S, C> {
    pub fn new(reconciler: KitReconciler<S, C>, config: ControllerConfig) -> Self {
        Self {
            reconciler,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn reconciler(&self) -> &KitReconciler<S, C> {
        &self.reconciler
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    fn lock_for(&self, key: &ObjectKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    /// Forget the lock of `key` once no other pass holds or awaits it.
    ///
    /// Clones are only taken under the map lock, so a count of one here
    /// means the map owns the last reference.
    fn release(&self, key: &ObjectKey, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        drop(lock);
        if locks.get(key).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(key);
        }
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Exponential backoff for the given retry (1-based), capped.
    fn calculate_backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.config
            .retry_backoff
            .saturating_mul(factor)
            .min(self.config.retry_backoff_max)
    }

    /// Reconcile one key, holding its lock, retrying retryable failures.
    pub fn reconcile_key(&self, ctx: &ReconcileContext, key: &ObjectKey) -> KeyResult {
        let lock = self.lock_for(key);
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.reconcile_with_retries(ctx, key)
        };
        self.release(key, lock);
        result
    }

    fn reconcile_with_retries(&self, ctx: &ReconcileContext, key: &ObjectKey) -> KeyResult {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let err = match self.reconciler.reconcile(ctx, key) {
                Ok(outcome) => {
                    return KeyResult {
                        key: key.clone(),
                        attempts,
                        result: Ok(outcome),
                    }
                }
                Err(e) => e,
            };

            let retries = attempts - 1;
            if !err.is_retryable() || retries >= self.config.max_retries || ctx.is_cancelled() {
                error!(kit = %key, attempts, error = %err, "reconcile failed");
                return KeyResult {
                    key: key.clone(),
                    attempts,
                    result: Err(err),
                };
            }

            let delay = self.calculate_backoff(attempts);
            warn!(
                kit = %key,
                attempt = attempts,
                backoff_ms = delay.as_millis() as u64,
                error = %err,
                "reconcile failed, retrying"
            );
            if !ctx.sleep(delay) {
                return KeyResult {
                    key: key.clone(),
                    attempts,
                    result: Err(err),
                };
            }
        }
    }

    /// Reconcile each distinct key once.
    ///
    /// Keys run in parallel, at most `max_concurrent` at a time. Results come
    /// back ordered by key.
    pub fn reconcile_keys(&self, ctx: &ReconcileContext, keys: &[ObjectKey]) -> PassReport {
        let mut unique = keys.to_vec();
        unique.sort();
        unique.dedup();

        let mut report = PassReport::default();
        for batch in unique.chunks(self.config.max_concurrent.max(1)) {
            if ctx.is_cancelled() {
                break;
            }
            let results: Vec<KeyResult> = thread::scope(|scope| {
                let handles: Vec<_> = batch
                    .iter()
                    .map(|key| scope.spawn(move || self.reconcile_key(ctx, key)))
                    .collect();
                handles
                    .into_iter()
                    .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                    .collect()
            });
            report.results.extend(results);
        }
        report
    }

    fn snapshot(&self, namespace: &str) -> Result<Snapshot, ControllerError> {
        let kits: Vec<Kit> = self
            .reconciler
            .store()
            .list(namespace)
            .map_err(|source| ControllerError::List {
                namespace: namespace.to_string(),
                source,
            })?;
        Ok(kits
            .into_iter()
            .map(|k| (k.metadata.name, (k.status.phase, k.metadata.resource_version)))
            .collect())
    }

    /// Reconcile every Kit in `namespace` until nothing changes.
    ///
    /// `between_passes` runs after each pass (e.g. to advance simulated
    /// builds) and returns whether it changed anything. The namespace is
    /// settled when a pass leaves every Kit untouched and the hook made no
    /// progress.
    pub fn run_until_settled<F>(
        &self,
        ctx: &ReconcileContext,
        namespace: &str,
        mut between_passes: F,
    ) -> Result<SettleReport, ControllerError>
    where
        F: FnMut(&S) -> bool,
    {
        for pass in 1..=self.config.max_passes {
            ctx.check()?;

            let before = self.snapshot(namespace)?;
            let keys: Vec<ObjectKey> = before
                .keys()
                .map(|name| ObjectKey::new(namespace, name.clone()))
                .collect();

            let report = self.reconcile_keys(ctx, &keys);
            ctx.check()?;

            let hook_progress = between_passes(self.reconciler.store());
            let after = self.snapshot(namespace)?;
            debug!(namespace, pass, kits = after.len(), hook_progress, "pass complete");

            if after == before && !hook_progress {
                let phases = after.into_iter().map(|(name, (phase, _))| (name, phase)).collect();
                info!(namespace, passes = pass, "namespace settled");
                return Ok(SettleReport {
                    passes: pass,
                    phases,
                    last_pass: report,
                });
            }
        }

        Err(ControllerError::Unsettled {
            namespace: namespace.to_string(),
            passes: self.config.max_passes,
        })
    }
}
