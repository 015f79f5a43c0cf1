//! Collaborator traits.
//!
//! The engine never talks to a remote system directly. A backend exposes the
//! three endpoints the engine needs for one kind of target object (list,
//! batched mutate, object read); a resolver maps user-supplied references to
//! canonical keys.

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::types::{Category, Cursor, MutationOp, Page, TargetObject, TargetRef};

/// Remote endpoints for one kind of membership-owning object.
///
/// Implementations must be safe to call concurrently for different keys.
/// `mutate` must be idempotent: the engine re-issues identical batches on
/// retry.
#[async_trait]
pub trait MembershipBackend: Send + Sync {
    /// Human-readable description of a target, used in logs and errors
    /// (e.g. `cost center 1a2b`).
    fn describe(&self, key: &str) -> String;

    /// Categories this backend can list and mutate.
    fn categories(&self) -> &[Category];

    /// Check whether `category` is handled by this backend.
    fn supports(&self, category: Category) -> bool {
        self.categories().contains(&category)
    }

    /// Read the target object.
    ///
    /// Returns `Ok(None)` when the remote reports the object as missing.
    async fn get_object(&self, key: &str) -> Result<Option<TargetObject>, RemoteError>;

    /// Fetch one page of a category's identifiers.
    ///
    /// `cursor` is `None` for the first page.
    async fn list_page(
        &self,
        key: &str,
        category: Category,
        cursor: Option<Cursor>,
    ) -> Result<Page<String>, RemoteError>;

    /// Issue exactly one batched mutation call.
    async fn mutate(
        &self,
        key: &str,
        op: MutationOp,
        category: Category,
        items: &[String],
    ) -> Result<(), RemoteError>;
}

/// Maps a slug or ID to the canonical key a backend expects.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve `target`; `Ok(None)` means no such object exists.
    ///
    /// Implementations must not cache: callers re-resolve after a key 404s.
    async fn resolve(&self, target: &TargetRef) -> Result<Option<String>, RemoteError>;
}
