//! The reconciliation state machine.
//!
//! One run walks `FETCH_CURRENT → GUARD → DIFF → REMOVE* → ADD* → CONFIRM`.
//! Batches run sequentially; all removals drain before the first addition.
//! Any fatal error aborts the run and is reported with the phase (and, for
//! mutations, the category and batch) at which it happened.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::chunk::Chunker;
use crate::config::ReconcileConfig;
use crate::diff::{diff, Diff};
use crate::error::{
    classify_read, BatchPosition, Classifier, Phase, ReconcileError, ReconcileFailure,
};
use crate::guard::{ReadCheck, StateGuard};
use crate::paginator::Paginator;
use crate::retry::RetryingMutator;
use crate::traits::{IdentityResolver, MembershipBackend};
use crate::types::{Category, Cursor, LifecycleState, Memberships, MutationOp, Page, TargetObject, TargetRef};

/// Result of `FETCH_CURRENT → GUARD → DIFF`.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub target: TargetObject,
    /// Observed state of the managed categories.
    pub current: Memberships,
    pub desired: Memberships,
    /// One entry per managed category, including empty ones.
    pub diffs: BTreeMap<Category, Diff>,
}

impl Plan {
    /// Whether applying the plan would issue no mutation calls.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.diffs.values().all(Diff::is_empty)
    }

    #[must_use]
    pub fn additions(&self) -> usize {
        self.diffs.values().map(|d| d.to_add.len()).sum()
    }

    #[must_use]
    pub fn removals(&self) -> usize {
        self.diffs.values().map(|d| d.to_remove.len()).sum()
    }
}

/// Outcome of a successful reconciliation run.
///
/// `observed` is the state re-read after mutation and is the authoritative
/// result; it may differ from the desired state if the remote changed
/// concurrently.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub run_id: Uuid,
    pub plan: Plan,
    pub batches: usize,
    pub attempts: u32,
    pub added: usize,
    pub removed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub observed: Memberships,
}

/// A target and its memberships, as returned by [`Reconciler::read`].
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub target: TargetObject,
    pub memberships: Memberships,
}

/// Outcome of [`Reconciler::clear`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClearOutcome {
    /// Every member was removed.
    Cleared { report: Box<ReconcileReport> },
    /// The target was missing or in a terminal state; nothing was done.
    Skipped {
        #[serde(skip_serializing_if = "Option::is_none")]
        state: Option<LifecycleState>,
    },
}

#[derive(Debug, Default)]
struct Counters {
    batches: usize,
    attempts: u32,
    added: usize,
    removed: usize,
}

/// Drives reconciliation runs against one backend.
///
/// Holds no per-run state; concurrent runs for different keys are safe.
pub struct Reconciler {
    backend: Arc<dyn MembershipBackend>,
    resolver: Option<Arc<dyn IdentityResolver>>,
    chunker: Chunker,
    mutator: RetryingMutator,
    read_classifier: Classifier,
    guard: StateGuard,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("categories", &self.backend.categories())
            .field("chunker", &self.chunker)
            .field("mutator", &self.mutator)
            .field("has_resolver", &self.resolver.is_some())
            .finish()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(backend: Arc<dyn MembershipBackend>, config: &ReconcileConfig) -> Self {
        Self {
            backend,
            resolver: None,
            chunker: Chunker::new(config.max_batch_size),
            mutator: RetryingMutator::new(config.retry.clone()),
            read_classifier: classify_read,
            guard: StateGuard,
        }
    }

    /// Resolver used by [`Reconciler::reconcile_target`].
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn IdentityResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Replace the classifier used for mutation failures.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.mutator = self.mutator.with_classifier(classifier);
        self
    }

    /// Replace the classifier used for reads.
    #[must_use]
    pub fn with_read_classifier(mut self, classifier: Classifier) -> Self {
        self.read_classifier = classifier;
        self
    }

    #[must_use]
    pub fn backend(&self) -> &Arc<dyn MembershipBackend> {
        &self.backend
    }

    /// Dry run: compute what [`Reconciler::reconcile`] would change.
    pub async fn plan(
        &self,
        key: &str,
        desired: &Memberships,
        prefetched: Option<&Memberships>,
        cancel: &CancellationToken,
    ) -> Result<Plan, ReconcileFailure> {
        let description = self.backend.describe(key);
        self.build_plan(key, &description, desired, prefetched, cancel)
            .await
    }

    /// Converge `key` to `desired`.
    ///
    /// Categories absent from `desired` are left untouched. `prefetched`
    /// replaces the initial read for the categories it contains.
    pub async fn reconcile(
        &self,
        key: &str,
        desired: &Memberships,
        prefetched: Option<&Memberships>,
        cancel: &CancellationToken,
    ) -> Result<ReconcileReport, ReconcileFailure> {
        let run_id = Uuid::new_v4();
        let description = self.backend.describe(key);
        let span = info_span!("reconcile", run_id = %run_id, subject = %description);

        self.run(run_id, key, &description, desired, prefetched, cancel)
            .instrument(span)
            .await
    }

    /// Resolve `target` and reconcile it.
    ///
    /// `known_key` skips resolution. If the key in use turns out to be
    /// missing during `FETCH_CURRENT` or `GUARD`, the target is re-resolved
    /// once and the run restarted under the new key.
    pub async fn reconcile_target(
        &self,
        target: &TargetRef,
        known_key: Option<&str>,
        desired: &Memberships,
        cancel: &CancellationToken,
    ) -> Result<ReconcileReport, ReconcileFailure> {
        let key = match known_key {
            Some(key) => key.to_string(),
            None => self.resolve(target, cancel).await?,
        };

        match self.reconcile(&key, desired, None, cancel).await {
            Err(failure)
                if matches!(failure.phase, Phase::FetchCurrent | Phase::Guard)
                    && failure.error().is_not_found()
                    && self.resolver.is_some() =>
            {
                let fresh = self.resolve(target, cancel).await?;
                if fresh == key {
                    return Err(failure);
                }
                info!(
                    subject = %target,
                    previous_key = %key,
                    key = %fresh,
                    "Target was renamed; retrying with re-resolved key"
                );
                self.reconcile(&fresh, desired, None, cancel).await
            }
            other => other,
        }
    }

    /// Read-mode: current memberships of every supported category.
    ///
    /// `Ok(None)` means the target no longer exists and the caller should
    /// drop any local state for it.
    pub async fn read(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Snapshot>, ReconcileFailure> {
        let description = self.backend.describe(key);
        let fail = |err| ReconcileFailure::new(Phase::FetchCurrent, description.clone(), err);

        let object = self.load_target(key, cancel).await.map_err(fail)?;
        let target = match self.guard.check_readable(object.as_ref()) {
            ReadCheck::Present(target) => target.clone(),
            ReadCheck::Gone => {
                info!(subject = %description, "Target no longer exists");
                return Ok(None);
            }
        };

        let categories = self.backend.categories().to_vec();
        match self
            .fetch_current(key, &description, &categories, cancel)
            .await
        {
            Ok(memberships) => Ok(Some(Snapshot {
                target,
                memberships,
            })),
            Err(ReconcileError::NotFound { .. }) => {
                info!(subject = %description, "Target disappeared while reading");
                Ok(None)
            }
            Err(err) => Err(fail(err)),
        }
    }

    /// Remove every member from every supported category.
    ///
    /// A missing or terminal target is skipped without error.
    pub async fn clear(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<ClearOutcome, ReconcileFailure> {
        let description = self.backend.describe(key);
        let object = self
            .load_target(key, cancel)
            .await
            .map_err(|err| ReconcileFailure::new(Phase::Guard, description.clone(), err))?;

        match object {
            None => {
                info!(subject = %description, "Target already gone; nothing to clear");
                Ok(ClearOutcome::Skipped { state: None })
            }
            Some(target) if !target.lifecycle.is_mutable() => {
                info!(
                    subject = %description,
                    state = %target.lifecycle,
                    "Target in terminal state; nothing to clear"
                );
                Ok(ClearOutcome::Skipped {
                    state: Some(target.lifecycle),
                })
            }
            Some(_) => {
                let mut desired = Memberships::new();
                for &category in self.backend.categories() {
                    desired.manage(category);
                }
                let report = self.reconcile(key, &desired, None, cancel).await?;
                Ok(ClearOutcome::Cleared {
                    report: Box::new(report),
                })
            }
        }
    }

    async fn run(
        &self,
        run_id: Uuid,
        key: &str,
        description: &str,
        desired: &Memberships,
        prefetched: Option<&Memberships>,
        cancel: &CancellationToken,
    ) -> Result<ReconcileReport, ReconcileFailure> {
        let started_at = Utc::now();
        info!("Starting reconciliation");

        // 1. FETCH_CURRENT, GUARD, DIFF
        let plan = self
            .build_plan(key, description, desired, prefetched, cancel)
            .await?;
        info!(
            to_add = plan.additions(),
            to_remove = plan.removals(),
            "Plan computed"
        );

        // 2. REMOVE* then ADD*; a failed removal prevents every addition.
        let mut counters = Counters::default();
        for op in [MutationOp::Remove, MutationOp::Add] {
            for (&category, d) in &plan.diffs {
                let items = match op {
                    MutationOp::Remove => &d.to_remove,
                    MutationOp::Add => &d.to_add,
                };
                self.apply(key, description, op, category, items, &mut counters, cancel)
                    .await?;
            }
        }

        // 3. CONFIRM
        let categories: Vec<Category> = plan.diffs.keys().copied().collect();
        let observed = self
            .fetch_current(key, description, &categories, cancel)
            .await
            .map_err(|err| ReconcileFailure::new(Phase::Confirm, description, err))?;

        let finished_at = Utc::now();
        info!(
            batches = counters.batches,
            attempts = counters.attempts,
            added = counters.added,
            removed = counters.removed,
            "Reconciliation complete"
        );

        Ok(ReconcileReport {
            run_id,
            plan,
            batches: counters.batches,
            attempts: counters.attempts,
            added: counters.added,
            removed: counters.removed,
            started_at,
            finished_at,
            observed,
        })
    }

    async fn build_plan(
        &self,
        key: &str,
        description: &str,
        desired: &Memberships,
        prefetched: Option<&Memberships>,
        cancel: &CancellationToken,
    ) -> Result<Plan, ReconcileFailure> {
        let fail = |phase, err| ReconcileFailure::new(phase, description, err);

        // FETCH_CURRENT: unsupported categories are rejected at DIFF.
        let managed: Vec<Category> = desired
            .categories()
            .filter(|c| self.backend.supports(*c))
            .collect();
        let mut current = prefetched
            .map(|p| p.restricted_to(desired))
            .unwrap_or_default();
        let missing: Vec<Category> = managed
            .iter()
            .copied()
            .filter(|c| !current.is_managed(*c))
            .collect();
        if prefetched.is_some() && missing.is_empty() {
            debug!(subject = description, "Using prefetched state");
        }
        let fetched = self
            .fetch_current(key, description, &missing, cancel)
            .await
            .map_err(|err| fail(Phase::FetchCurrent, err))?;
        for (category, items) in fetched.iter() {
            current.set(category, items.iter().cloned());
        }

        // GUARD
        let object = self
            .load_target(key, cancel)
            .await
            .map_err(|err| fail(Phase::Guard, err))?;
        self.guard
            .check_mutable(description, object.as_ref())
            .map_err(|err| fail(Phase::Guard, err))?;
        let Some(target) = object else {
            return Err(fail(
                Phase::Guard,
                ReconcileError::NotFound {
                    target: description.to_string(),
                },
            ));
        };

        // DIFF
        let mut diffs = BTreeMap::new();
        for category in desired.categories() {
            if !self.backend.supports(category) {
                return Err(fail(
                    Phase::Diff,
                    ReconcileError::UnsupportedCategory {
                        category,
                        backend: description.to_string(),
                    },
                )
                .in_category(category));
            }
            let observed = current.get(category).into_iter().flatten();
            let wanted = desired.get(category).into_iter().flatten();
            let d = diff(observed, wanted);
            debug!(
                %category,
                to_add = d.to_add.len(),
                to_remove = d.to_remove.len(),
                "Category diff"
            );
            diffs.insert(category, d);
        }

        Ok(Plan {
            target,
            current,
            desired: desired.clone(),
            diffs,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn apply(
        &self,
        key: &str,
        description: &str,
        op: MutationOp,
        category: Category,
        items: &[String],
        counters: &mut Counters,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileFailure> {
        let phase = match op {
            MutationOp::Remove => Phase::Remove,
            MutationOp::Add => Phase::Add,
        };
        let count = self.chunker.batch_count(items.len());

        for (i, batch) in self.chunker.split(items).enumerate() {
            let position = BatchPosition {
                index: i + 1,
                count,
                size: batch.len(),
            };
            let attempts = self
                .mutator
                .mutate(self.backend.as_ref(), key, op, category, batch, cancel)
                .await
                .map_err(|err| {
                    warn!(%phase, %category, batch = %position, error = %err, "Batch failed");
                    ReconcileFailure::new(phase, description, err)
                        .in_category(category)
                        .in_batch(position)
                })?;

            debug!(%op, %category, batch = %position, attempts, "Batch applied");
            counters.batches += 1;
            counters.attempts += attempts;
            match op {
                MutationOp::Remove => counters.removed += batch.len(),
                MutationOp::Add => counters.added += batch.len(),
            }
        }
        Ok(())
    }

    async fn fetch_current(
        &self,
        key: &str,
        description: &str,
        categories: &[Category],
        cancel: &CancellationToken,
    ) -> Result<Memberships, ReconcileError> {
        let paginator = Paginator::new(cancel.clone());
        let mut observed = Memberships::new();

        for &category in categories {
            let label = format!("{description} {category}");
            let items = paginator
                .fetch_all(&label, |cursor| self.list_page(key, category, cursor, cancel))
                .await
                .map_err(ReconcileError::from)
                .map_err(|err| {
                    if err.is_not_found() {
                        ReconcileError::NotFound {
                            target: description.to_string(),
                        }
                    } else {
                        err
                    }
                })?;
            observed.set(category, items);
        }
        Ok(observed)
    }

    async fn list_page(
        &self,
        key: &str,
        category: Category,
        cursor: Option<Cursor>,
        cancel: &CancellationToken,
    ) -> Result<Page<String>, ReconcileError> {
        let operation = format!("list {category}");
        self.mutator
            .policy()
            .execute(&operation, cancel, self.read_classifier, || {
                self.backend.list_page(key, category, cursor.clone())
            })
            .await
            .map(|retried| retried.value)
    }

    async fn load_target(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<TargetObject>, ReconcileError> {
        let result = self
            .mutator
            .policy()
            .execute("get target", cancel, self.read_classifier, || {
                self.backend.get_object(key)
            })
            .await;

        match result {
            Ok(retried) => Ok(retried.value),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn resolve(
        &self,
        target: &TargetRef,
        cancel: &CancellationToken,
    ) -> Result<String, ReconcileFailure> {
        let fail = |err| ReconcileFailure::new(Phase::FetchCurrent, target.to_string(), err);
        let not_found = || ReconcileError::NotFound {
            target: target.to_string(),
        };

        let Some(resolver) = &self.resolver else {
            return target
                .id
                .clone()
                .or_else(|| target.slug.clone())
                .filter(|key| !key.is_empty())
                .ok_or_else(|| fail(not_found()));
        };

        let result = self
            .mutator
            .policy()
            .execute("resolve target", cancel, self.read_classifier, || {
                resolver.resolve(target)
            })
            .await;

        match result {
            Ok(retried) => {
                let key = retried.value.ok_or_else(|| fail(not_found()))?;
                debug!(subject = %target, key = %key, "Resolved target");
                Ok(key)
            }
            Err(err) if err.is_not_found() => Err(fail(not_found())),
            Err(err) => Err(fail(err)),
        }
    }
}
