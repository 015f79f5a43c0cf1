//! GitHub Enterprise collaborators for the membersync engine.
//!
//! - [`CostCenters`]: billing cost centers and their user, organization and
//!   repository assignments.
//! - [`EnterpriseTeams`]: enterprise teams, their organizations and members.
//! - [`ScimDirectory`]: read-only SCIM users and groups.
//!
//! `CostCenters` and `EnterpriseTeams` implement both
//! [`MembershipBackend`](membersync_reconcile::MembershipBackend) and
//! [`IdentityResolver`](membersync_reconcile::IdentityResolver).

pub mod client;
pub mod config;
pub mod cost_centers;
pub mod error;
pub mod models;
pub mod scim;
pub mod teams;

pub use client::GitHubClient;
pub use config::GitHubConfig;
pub use cost_centers::CostCenters;
pub use error::{GitHubError, GitHubResult};
pub use scim::{ScimDirectory, ScimQuery};
pub use teams::EnterpriseTeams;
