//! Enterprise team organization and member commands

use std::sync::Arc;

use clap::{Args, Subcommand};

use membersync_reconcile::{Category, Memberships, Reconciler, TargetRef};

use super::{print_json, resolve_key, Context};
use crate::error::{CliError, CliResult};

/// Which team to act on. An explicit `--team-id` wins over `--team`.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = true)]
pub struct TeamArgs {
    /// Team slug, including the `ent:` prefix
    #[arg(long)]
    pub team: Option<String>,

    /// Numeric team ID
    #[arg(long)]
    pub team_id: Option<String>,
}

impl TeamArgs {
    pub fn target_ref(&self) -> TargetRef {
        TargetRef {
            id: self.team_id.clone(),
            slug: self.team.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// team-orgs
// ----------------------------------------------------------------------------

/// Organizations assigned to an enterprise team
#[derive(Args, Debug)]
pub struct TeamOrgsArgs {
    #[command(subcommand)]
    pub command: TeamOrgsCommands,
}

#[derive(Subcommand, Debug)]
pub enum TeamOrgsCommands {
    /// Show the organizations assigned to a team
    Show(TeamArgs),
    /// Show the changes `apply` would make
    Plan(OrgChangeArgs),
    /// Converge the team's organizations onto the given set
    Apply(OrgChangeArgs),
}

#[derive(Args, Debug)]
pub struct OrgChangeArgs {
    #[command(flatten)]
    pub team: TeamArgs,

    /// Comma-separated organization logins (empty to remove all)
    #[arg(long, value_delimiter = ',', required = true)]
    pub organizations: Vec<String>,
}

// ----------------------------------------------------------------------------
// team-members
// ----------------------------------------------------------------------------

/// Members of an enterprise team
#[derive(Args, Debug)]
pub struct TeamMembersArgs {
    #[command(subcommand)]
    pub command: TeamMembersCommands,
}

#[derive(Subcommand, Debug)]
pub enum TeamMembersCommands {
    /// Show the members of a team
    Show(TeamArgs),
    /// Show the changes `apply` would make
    Plan(MemberChangeArgs),
    /// Converge the team's members onto the given set
    Apply(MemberChangeArgs),
}

#[derive(Args, Debug)]
pub struct MemberChangeArgs {
    #[command(flatten)]
    pub team: TeamArgs,

    /// Comma-separated usernames (empty to remove all)
    #[arg(long, value_delimiter = ',', required = true)]
    pub users: Vec<String>,
}

enum Action {
    Show(TeamArgs),
    Plan(TeamArgs, Vec<String>),
    Apply(TeamArgs, Vec<String>),
}

pub async fn execute_orgs(args: TeamOrgsArgs, ctx: &Context) -> CliResult<()> {
    let action = match args.command {
        TeamOrgsCommands::Show(team) => Action::Show(team),
        TeamOrgsCommands::Plan(c) => Action::Plan(c.team, c.organizations),
        TeamOrgsCommands::Apply(c) => Action::Apply(c.team, c.organizations),
    };
    run(action, Category::Organizations, ctx).await
}

pub async fn execute_members(args: TeamMembersArgs, ctx: &Context) -> CliResult<()> {
    let action = match args.command {
        TeamMembersCommands::Show(team) => Action::Show(team),
        TeamMembersCommands::Plan(c) => Action::Plan(c.team, c.users),
        TeamMembersCommands::Apply(c) => Action::Apply(c.team, c.users),
    };
    run(action, Category::Users, ctx).await
}

fn desired(category: Category, values: &[String]) -> Memberships {
    Memberships::new().with(category, values.iter().map(|v| v.trim()))
}

async fn run(action: Action, category: Category, ctx: &Context) -> CliResult<()> {
    let teams = Arc::new(ctx.teams());
    let reconciler = Reconciler::new(teams.clone(), &ctx.reconcile).with_resolver(teams.clone());

    match action {
        Action::Show(team) => {
            let key = resolve_key(teams.as_ref(), &team.target_ref(), &ctx.cancel).await?;
            let Some(mut snapshot) = reconciler.read(&key, &ctx.cancel).await? else {
                return Err(CliError::NotFound(format!("enterprise team {key}")));
            };
            let mut only = Memberships::new();
            only.manage(category);
            snapshot.memberships = snapshot.memberships.restricted_to(&only);
            print_json(&snapshot)
        }
        Action::Plan(team, values) => {
            let key = resolve_key(teams.as_ref(), &team.target_ref(), &ctx.cancel).await?;
            let plan = reconciler
                .plan(&key, &desired(category, &values), None, &ctx.cancel)
                .await?;
            print_json(&plan)
        }
        Action::Apply(team, values) => {
            let report = reconciler
                .reconcile_target(
                    &team.target_ref(),
                    None,
                    &desired(category, &values),
                    &ctx.cancel,
                )
                .await?;
            print_json(&report)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_id_and_slug_both_kept() {
        let team = TeamArgs {
            team: Some("ent:platform".into()),
            team_id: Some("42".into()),
        };
        assert_eq!(team.target_ref(), TargetRef::id("42").with_slug("ent:platform"));
    }

    #[test]
    fn test_empty_flag_means_remove_all() {
        let d = desired(Category::Users, &[String::new()]);
        assert!(d.is_managed(Category::Users));
        assert!(d.is_empty());
        assert!(!d.is_managed(Category::Organizations));
    }
}
