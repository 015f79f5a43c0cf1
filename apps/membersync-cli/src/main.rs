//! membersync - converge GitHub Enterprise memberships onto a desired state
//!
//! Configuration comes from the environment (`GITHUB_TOKEN`,
//! `GITHUB_BASE_URL`, `MEMBERSYNC_BATCH_SIZE`, ...). Results are printed as
//! JSON on stdout; logs go to stderr.

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;

mod commands;
mod error;
mod logging;

use commands::Context;
use error::{CliError, CliResult};
use logging::LogFormat;
use membersync_github::{GitHubClient, GitHubConfig};
use membersync_reconcile::ReconcileConfig;

/// membersync - desired-state reconciliation for GitHub Enterprise
#[derive(Parser, Debug)]
#[command(name = "membersync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enterprise slug
    #[arg(long, global = true, env = "GITHUB_ENTERPRISE")]
    enterprise: Option<String>,

    /// Log filter directive (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage the resources assigned to a cost center
    CostCenter(commands::cost_center::CostCenterArgs),

    /// Manage the organizations assigned to an enterprise team
    TeamOrgs(commands::teams::TeamOrgsArgs),

    /// Manage the members of an enterprise team
    TeamMembers(commands::teams::TeamMembersArgs),

    /// Read the enterprise SCIM directory
    Scim(commands::scim::ScimArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = run(cli).await;

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    logging::init_logging(&cli.log_level, cli.log_format)?;

    let enterprise = cli
        .enterprise
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| CliError::Config("no enterprise given".into()))?;
    let client = GitHubClient::new(&GitHubConfig::from_env()?)?;
    let reconcile = ReconcileConfig::from_env()?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling");
            on_interrupt.cancel();
        }
    });

    let ctx = Context {
        client,
        enterprise,
        reconcile,
        cancel,
    };

    match cli.command {
        Commands::CostCenter(args) => commands::cost_center::execute(args, &ctx).await,
        Commands::TeamOrgs(args) => commands::teams::execute_orgs(args, &ctx).await,
        Commands::TeamMembers(args) => commands::teams::execute_members(args, &ctx).await,
        Commands::Scim(args) => commands::scim::execute(args, &ctx).await,
    }
}
