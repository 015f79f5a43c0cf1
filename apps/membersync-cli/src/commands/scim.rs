//! SCIM directory commands (read-only)

use clap::{Args, Subcommand};

use membersync_github::ScimQuery;

use super::{print_json, Context};
use crate::error::{CliError, CliResult};

/// Read the enterprise SCIM directory
#[derive(Args, Debug)]
pub struct ScimArgs {
    #[command(subcommand)]
    pub command: ScimCommands,
}

#[derive(Subcommand, Debug)]
pub enum ScimCommands {
    /// List SCIM users, or show one with --id
    Users(UsersArgs),
    /// List SCIM groups, or show one with --id
    Groups(GroupsArgs),
}

/// List parameters
#[derive(Args, Debug, Clone, Default)]
pub struct QueryArgs {
    /// SCIM filter, e.g. 'userName eq "mona"'
    #[arg(long)]
    pub filter: Option<String>,

    /// Comma-separated attributes to exclude from the response
    #[arg(long)]
    pub excluded_attributes: Option<String>,

    /// Page size
    #[arg(long)]
    pub count: Option<u32>,
}

impl From<QueryArgs> for ScimQuery {
    fn from(args: QueryArgs) -> Self {
        ScimQuery {
            filter: args.filter,
            excluded_attributes: args.excluded_attributes,
            count: args.count,
        }
    }
}

#[derive(Args, Debug)]
pub struct UsersArgs {
    /// SCIM user ID
    #[arg(long, conflicts_with_all = ["filter", "excluded_attributes", "count"])]
    pub id: Option<String>,

    #[command(flatten)]
    pub query: QueryArgs,
}

#[derive(Args, Debug)]
pub struct GroupsArgs {
    /// SCIM group ID
    #[arg(long, conflicts_with_all = ["filter", "excluded_attributes", "count"])]
    pub id: Option<String>,

    /// With --id, print only the member user IDs
    #[arg(long, requires = "id")]
    pub members: bool,

    #[command(flatten)]
    pub query: QueryArgs,
}

pub async fn execute(args: ScimArgs, ctx: &Context) -> CliResult<()> {
    let scim = ctx.scim();

    match args.command {
        ScimCommands::Users(UsersArgs { id: Some(id), .. }) => match scim.get_user(&id).await? {
            Some(user) => print_json(&user),
            None => Err(CliError::NotFound(format!("SCIM user {id}"))),
        },
        ScimCommands::Users(UsersArgs { id: None, query }) => {
            let users = scim.list_users(&query.into()).await?;
            print_json(&users)
        }
        ScimCommands::Groups(GroupsArgs {
            id: Some(id),
            members,
            ..
        }) => {
            let Some(group) = scim.get_group(&id).await? else {
                return Err(CliError::NotFound(format!("SCIM group {id}")));
            };
            if members {
                print_json(&group.member_values())
            } else {
                print_json(&group)
            }
        }
        ScimCommands::Groups(GroupsArgs {
            id: None, query, ..
        }) => {
            let groups = scim.list_groups(&query.into()).await?;
            print_json(&groups)
        }
    }
}
