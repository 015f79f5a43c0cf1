//! Cost center resource commands

use std::sync::Arc;

use clap::{Args, Subcommand};

use membersync_reconcile::{Category, Memberships, Reconciler, TargetRef};

use super::{print_json, resolve_key, Context};
use crate::error::{CliError, CliResult};

/// Cost center resource commands
#[derive(Args, Debug)]
pub struct CostCenterArgs {
    #[command(subcommand)]
    pub command: CostCenterCommands,
}

#[derive(Subcommand, Debug)]
pub enum CostCenterCommands {
    /// Show the users, organizations and repositories assigned to a cost center
    Show(TargetArgs),
    /// Show the changes `apply` would make, without making them
    Plan(ChangeArgs),
    /// Converge the cost center's assignments onto the given sets
    Apply(ChangeArgs),
    /// Remove every resource from a cost center (no-op if archived or gone)
    Clear(TargetArgs),
}

/// Which cost center to act on
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = true)]
pub struct TargetArgs {
    /// Cost center ID
    #[arg(long)]
    pub id: Option<String>,

    /// Cost center name (used when no ID is given)
    #[arg(long)]
    pub name: Option<String>,
}

impl TargetArgs {
    pub fn target_ref(&self) -> TargetRef {
        TargetRef {
            id: self.id.clone(),
            slug: self.name.clone(),
        }
    }
}

/// Desired assignments. Categories left out are not touched; an empty
/// value (`--users ""`) removes every member of that category.
#[derive(Args, Debug, Clone, Default)]
pub struct MembershipFlags {
    /// Comma-separated usernames
    #[arg(long, value_delimiter = ',')]
    pub users: Option<Vec<String>>,

    /// Comma-separated organization logins
    #[arg(long, value_delimiter = ',')]
    pub organizations: Option<Vec<String>>,

    /// Comma-separated repository full names (owner/name)
    #[arg(long, value_delimiter = ',')]
    pub repositories: Option<Vec<String>>,
}

impl MembershipFlags {
    pub fn desired(&self) -> CliResult<Memberships> {
        let mut desired = Memberships::new();
        for (category, values) in [
            (Category::Users, &self.users),
            (Category::Organizations, &self.organizations),
            (Category::Repositories, &self.repositories),
        ] {
            if let Some(values) = values {
                desired.set(category, values.iter().map(|v| v.trim()));
            }
        }
        if desired.categories().next().is_none() {
            return Err(CliError::Validation(
                "at least one of --users, --organizations or --repositories is required".into(),
            ));
        }
        Ok(desired)
    }
}

#[derive(Args, Debug)]
pub struct ChangeArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub members: MembershipFlags,
}

pub async fn execute(args: CostCenterArgs, ctx: &Context) -> CliResult<()> {
    let backend = Arc::new(ctx.cost_centers());
    let reconciler =
        Reconciler::new(backend.clone(), &ctx.reconcile).with_resolver(backend.clone());

    match args.command {
        CostCenterCommands::Show(target) => {
            let key = resolve_key(backend.as_ref(), &target.target_ref(), &ctx.cancel).await?;
            match reconciler.read(&key, &ctx.cancel).await? {
                Some(snapshot) => print_json(&snapshot),
                None => Err(CliError::NotFound(format!("cost center {key}"))),
            }
        }
        CostCenterCommands::Plan(change) => {
            let desired = change.members.desired()?;
            let key =
                resolve_key(backend.as_ref(), &change.target.target_ref(), &ctx.cancel).await?;
            let plan = reconciler.plan(&key, &desired, None, &ctx.cancel).await?;
            print_json(&plan)
        }
        CostCenterCommands::Apply(change) => {
            let desired = change.members.desired()?;
            let report = reconciler
                .reconcile_target(&change.target.target_ref(), None, &desired, &ctx.cancel)
                .await?;
            print_json(&report)
        }
        CostCenterCommands::Clear(target) => {
            let key = resolve_key(backend.as_ref(), &target.target_ref(), &ctx.cancel).await?;
            let outcome = reconciler.clear(&key, &ctx.cancel).await?;
            print_json(&outcome)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desired_only_includes_given_categories() {
        let flags = MembershipFlags {
            users: Some(vec!["alice".into(), " bob ".into()]),
            repositories: Some(vec![String::new()]),
            ..MembershipFlags::default()
        };
        let desired = flags.desired().unwrap();

        assert_eq!(desired.get(Category::Users).unwrap().len(), 2);
        assert!(desired.get(Category::Users).unwrap().contains("bob"));
        assert!(desired.is_managed(Category::Repositories));
        assert!(desired.get(Category::Repositories).unwrap().is_empty());
        assert!(!desired.is_managed(Category::Organizations));
    }

    #[test]
    fn test_desired_requires_a_category() {
        let err = MembershipFlags::default().desired().unwrap_err();
        assert!(matches!(err, CliError::Validation(_)));
    }

    #[test]
    fn test_target_ref_from_flags() {
        let target = TargetArgs {
            id: None,
            name: Some("Engineering".into()),
        };
        assert_eq!(target.target_ref(), TargetRef::slug("Engineering"));
    }
}
