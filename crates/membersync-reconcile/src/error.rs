//! Error types for the reconciliation engine.
//!
//! Collaborators report failures as [`RemoteError`]. The engine classifies
//! them (see [`classify_remote`]) and surfaces a typed [`ReconcileError`];
//! at the orchestrator boundary errors are wrapped in a [`ReconcileFailure`]
//! that records where the run stopped.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::types::{Category, Cursor, LifecycleState};

/// Result type for engine operations that have not crossed the orchestrator boundary.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// A failure reported by a remote collaborator (list, mutate or read endpoint).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The remote answered with a non-success HTTP status.
    #[error("remote returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response (connect, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The response could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Create a status error.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        RemoteError::Status {
            status,
            message: message.into(),
        }
    }

    /// HTTP status code, if the remote answered at all.
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self {
            RemoteError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the remote reported the object as missing (404).
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.http_status() == Some(404)
    }
}

/// Outcome of classifying a remote failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Transient; the identical request may be re-issued.
    Retryable,
    /// Permanent; retrying cannot help.
    Fatal,
}

/// Classification predicate used by the retry executor.
pub type Classifier = fn(&RemoteError) -> FailureClass;

/// Default classifier.
///
/// Not-found (the target may be momentarily inconsistent), conflict and the
/// 5xx gateway family are retryable. Everything else, including transport
/// and decode failures, is fatal.
#[must_use]
pub fn classify_remote(error: &RemoteError) -> FailureClass {
    match error.http_status() {
        Some(404 | 409 | 500 | 502 | 503 | 504) => FailureClass::Retryable,
        _ => FailureClass::Fatal,
    }
}

/// Classifier for reads (list pages, object reads, identity lookups).
///
/// Same as [`classify_remote`] except that not-found is fatal, so a missing
/// target surfaces at once instead of after the whole retry budget.
#[must_use]
pub fn classify_read(error: &RemoteError) -> FailureClass {
    if error.is_not_found() {
        FailureClass::Fatal
    } else {
        classify_remote(error)
    }
}

/// Errors produced by the engine's components.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The target object does not exist but a mutation was requested.
    #[error("{target} not found")]
    NotFound { target: String },

    /// The target object is in a terminal lifecycle state.
    #[error("{target} cannot be modified because it is {state}")]
    Archived {
        target: String,
        state: LifecycleState,
    },

    /// A retryable remote failure surfaced from a read that is not retried.
    #[error("transient remote failure: {source}")]
    Transient {
        #[source]
        source: RemoteError,
    },

    /// Only retryable failures occurred but the retry budget ran out.
    #[error("retry budget exhausted after {attempts} attempt(s) in {elapsed:?}: {source}")]
    RetryBudgetExceeded {
        attempts: u32,
        elapsed: Duration,
        #[source]
        source: RemoteError,
    },

    /// The remote rejected the request with a 4xx other than 404/409.
    #[error("request rejected: {source}")]
    Validation {
        #[source]
        source: RemoteError,
    },

    /// Any other non-retryable remote failure.
    #[error("remote failure: {source}")]
    Remote {
        #[source]
        source: RemoteError,
    },

    /// The caller cancelled the run while it was waiting on the network or a backoff.
    #[error("reconciliation cancelled")]
    Cancelled,

    /// The list endpoint handed back the cursor it was just given.
    #[error("pagination stalled: server repeated cursor {cursor}")]
    StalledPagination { cursor: Cursor },

    /// The desired state names a category the backend cannot manage.
    #[error("category {category} is not supported by {backend}")]
    UnsupportedCategory { category: Category, backend: String },
}

impl ReconcileError {
    /// Build the error for a remote failure that will not be retried.
    #[must_use]
    pub fn from_remote(source: RemoteError, classifier: Classifier) -> Self {
        match classifier(&source) {
            FailureClass::Retryable => ReconcileError::Transient { source },
            FailureClass::Fatal => Self::fatal(source),
        }
    }

    /// Build the error for a remote failure classified as fatal.
    #[must_use]
    pub fn fatal(source: RemoteError) -> Self {
        match source.http_status() {
            Some(status) if (400..500).contains(&status) => ReconcileError::Validation { source },
            _ => ReconcileError::Remote { source },
        }
    }

    /// The underlying remote failure, if any.
    #[must_use]
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            ReconcileError::Transient { source }
            | ReconcileError::RetryBudgetExceeded { source, .. }
            | ReconcileError::Validation { source }
            | ReconcileError::Remote { source } => Some(source),
            _ => None,
        }
    }

    /// Whether the remote reported the target as missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ReconcileError::NotFound { .. })
            || self.remote().is_some_and(RemoteError::is_not_found)
    }

    /// Whether re-issuing the same request could not succeed.
    ///
    /// `Cancelled` is neither fatal nor transient.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ReconcileError::Transient { .. } | ReconcileError::Cancelled
        )
    }

    /// Stable code for metrics and CLI output.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            ReconcileError::NotFound { .. } => "NOT_FOUND",
            ReconcileError::Archived { .. } => "ARCHIVED",
            ReconcileError::Transient { .. } => "TRANSIENT_REMOTE",
            ReconcileError::RetryBudgetExceeded { .. } => "RETRY_BUDGET_EXCEEDED",
            ReconcileError::Validation { .. } => "VALIDATION",
            ReconcileError::Remote { .. } => "REMOTE",
            ReconcileError::Cancelled => "CANCELLED",
            ReconcileError::StalledPagination { .. } => "STALLED_PAGINATION",
            ReconcileError::UnsupportedCategory { .. } => "UNSUPPORTED_CATEGORY",
        }
    }
}

/// Errors produced by the paginator, generic over the collaborator's error type.
#[derive(Debug, Error)]
pub enum PaginationError<E> {
    /// The list endpoint failed; no partial collection is returned.
    #[error(transparent)]
    Remote(E),

    /// The caller cancelled while a page was in flight.
    #[error("pagination cancelled")]
    Cancelled,

    /// The server returned the same continuation cursor twice in a row.
    #[error("pagination stalled: server repeated cursor {cursor}")]
    Stalled { cursor: Cursor },
}

impl PaginationError<RemoteError> {
    /// Convert into an engine error using the given classifier.
    #[must_use]
    pub fn into_reconcile(self, classifier: Classifier) -> ReconcileError {
        match self {
            PaginationError::Remote(source) => ReconcileError::from_remote(source, classifier),
            PaginationError::Cancelled => ReconcileError::Cancelled,
            PaginationError::Stalled { cursor } => ReconcileError::StalledPagination { cursor },
        }
    }
}

impl From<PaginationError<ReconcileError>> for ReconcileError {
    fn from(err: PaginationError<ReconcileError>) -> Self {
        match err {
            PaginationError::Remote(err) => err,
            PaginationError::Cancelled => ReconcileError::Cancelled,
            PaginationError::Stalled { cursor } => ReconcileError::StalledPagination { cursor },
        }
    }
}

/// State of the reconciliation state machine at which a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    FetchCurrent,
    Guard,
    Diff,
    Remove,
    Add,
    Confirm,
}

impl Phase {
    /// Upper-case name used in logs and error messages.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::FetchCurrent => "FETCH_CURRENT",
            Phase::Guard => "GUARD",
            Phase::Diff => "DIFF",
            Phase::Remove => "REMOVE",
            Phase::Add => "ADD",
            Phase::Confirm => "CONFIRM",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of a batch within one category's mutation sequence (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPosition {
    pub index: usize,
    pub count: usize,
    pub size: usize,
}

impl fmt::Display for BatchPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "batch {}/{} ({} item(s))",
            self.index, self.count, self.size
        )
    }
}

/// A failed reconciliation run, annotated with where it stopped.
///
/// The remote is left in whatever state the last successful batch produced;
/// re-running with the same desired state is the recovery path.
#[derive(Debug, Error)]
#[error("{phase} failed for {target}{}: {source}", location(.category.as_ref(), .batch.as_ref()))]
pub struct ReconcileFailure {
    pub phase: Phase,
    pub target: String,
    pub category: Option<Category>,
    pub batch: Option<BatchPosition>,
    #[source]
    pub source: ReconcileError,
}

impl ReconcileFailure {
    /// Wrap an engine error that occurred at `phase`.
    pub fn new(phase: Phase, target: impl Into<String>, source: ReconcileError) -> Self {
        Self {
            phase,
            target: target.into(),
            category: None,
            batch: None,
            source,
        }
    }

    /// Attach the category being processed.
    #[must_use]
    pub fn in_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// Attach the batch being processed.
    #[must_use]
    pub fn in_batch(mut self, batch: BatchPosition) -> Self {
        self.batch = Some(batch);
        self
    }

    /// The engine error that stopped the run.
    #[must_use]
    pub fn error(&self) -> &ReconcileError {
        &self.source
    }

    /// Whether the run stopped because the caller cancelled it.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.source, ReconcileError::Cancelled)
    }
}

fn location(category: Option<&Category>, batch: Option<&BatchPosition>) -> String {
    match (category, batch) {
        (Some(category), Some(batch)) => format!(" ({category}, {batch})"),
        (Some(category), None) => format!(" ({category})"),
        (None, Some(batch)) => format!(" ({batch})"),
        (None, None) => String::new(),
    }
}
