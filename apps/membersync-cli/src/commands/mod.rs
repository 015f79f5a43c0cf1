//! Subcommand implementations.

pub mod cost_center;
pub mod scim;
pub mod teams;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use membersync_github::{CostCenters, EnterpriseTeams, GitHubClient, ScimDirectory};
use membersync_reconcile::{IdentityResolver, ReconcileConfig, TargetRef};

use crate::error::{CliError, CliResult};

/// Everything a command needs to talk to one enterprise.
#[derive(Debug, Clone)]
pub struct Context {
    pub client: GitHubClient,
    pub enterprise: String,
    pub reconcile: ReconcileConfig,
    pub cancel: CancellationToken,
}

impl Context {
    pub fn cost_centers(&self) -> CostCenters {
        CostCenters::new(self.client.clone(), &self.enterprise)
    }

    pub fn teams(&self) -> EnterpriseTeams {
        EnterpriseTeams::new(self.client.clone(), &self.enterprise)
            .with_cancellation(self.cancel.clone())
    }

    pub fn scim(&self) -> ScimDirectory {
        ScimDirectory::new(self.client.clone(), &self.enterprise)
            .with_cancellation(self.cancel.clone())
    }
}

/// Resolve a user-supplied reference to a canonical key, or fail with
/// `NotFound`.
pub async fn resolve_key(
    resolver: &dyn IdentityResolver,
    target: &TargetRef,
    cancel: &CancellationToken,
) -> CliResult<String> {
    if target.is_empty() {
        return Err(CliError::Validation("no target given".into()));
    }
    let resolved = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(CliError::Cancelled),
        result = resolver.resolve(target) => result?,
    };
    resolved.ok_or_else(|| CliError::NotFound(target.to_string()))
}

/// Pretty-print a value as JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
