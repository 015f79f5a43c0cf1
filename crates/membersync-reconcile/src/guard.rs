//! Lifecycle checks performed before any membership mutation.

use tracing::debug;

use crate::error::ReconcileError;
use crate::types::TargetObject;

/// Outcome of a read-mode check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadCheck<'a> {
    /// The target exists; its memberships may be read.
    Present(&'a TargetObject),
    /// The target no longer exists; the caller should drop local state.
    Gone,
}

/// Gates mutation on the target's lifecycle state.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateGuard;

impl StateGuard {
    /// Fail unless `target` exists and is active.
    ///
    /// `description` names the target in the error when it is missing.
    pub fn check_mutable(
        &self,
        description: &str,
        target: Option<&TargetObject>,
    ) -> Result<(), ReconcileError> {
        let target = target.ok_or_else(|| ReconcileError::NotFound {
            target: description.to_string(),
        })?;

        if !target.lifecycle.is_mutable() {
            debug!(
                subject = description,
                state = %target.lifecycle,
                "Refusing to mutate target in terminal state"
            );
            return Err(ReconcileError::Archived {
                target: format!("{description} ({})", target.name),
                state: target.lifecycle.clone(),
            });
        }
        Ok(())
    }

    /// Read-mode check: a missing target is not an error.
    #[must_use]
    pub fn check_readable<'a>(&self, target: Option<&'a TargetObject>) -> ReadCheck<'a> {
        match target {
            Some(target) => ReadCheck::Present(target),
            None => ReadCheck::Gone,
        }
    }
}
