//! Desired-state reconciliation for membership collections.
//!
//! Given a target object (a cost center, a team) and the identifiers that
//! should belong to each of its categories, the engine reads the current
//! state page by page, diffs it against the desired state, refuses to touch
//! targets in a terminal lifecycle state, applies removals and then
//! additions in bounded batches with classified retry, and finally re-reads
//! the state as the authoritative result.
//!
//! The engine is transport-agnostic: remote systems plug in through
//! [`MembershipBackend`] and [`IdentityResolver`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use membersync_reconcile::{Category, Memberships, MembershipBackend, ReconcileConfig, Reconciler};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(backend: Arc<dyn MembershipBackend>) -> Result<(), Box<dyn std::error::Error>> {
//! let reconciler = Reconciler::new(backend, &ReconcileConfig::default());
//! let desired = Memberships::new().with(Category::Users, ["octocat", "hubot"]);
//!
//! let report = reconciler
//!     .reconcile("cc-1", &desired, None, &CancellationToken::new())
//!     .await?;
//! println!("now: {:?}", report.observed);
//! # Ok(())
//! # }
//! ```

pub mod chunk;
pub mod config;
pub mod diff;
pub mod error;
pub mod guard;
pub mod orchestrator;
pub mod paginator;
pub mod retry;
pub mod traits;
pub mod types;

pub use chunk::Chunker;
pub use config::{ConfigError, ReconcileConfig};
pub use diff::{diff, Diff};
pub use error::{
    classify_read, classify_remote, BatchPosition, Classifier, FailureClass, PaginationError,
    Phase, ReconcileError, ReconcileFailure, ReconcileResult, RemoteError,
};
pub use guard::{ReadCheck, StateGuard};
pub use orchestrator::{ClearOutcome, Plan, ReconcileReport, Reconciler, Snapshot};
pub use paginator::Paginator;
pub use retry::{Retried, RetryPolicy, RetryingMutator};
pub use traits::{IdentityResolver, MembershipBackend};
pub use types::{Category, Cursor, LifecycleState, Memberships, MutationOp, Page, TargetObject, TargetRef};
