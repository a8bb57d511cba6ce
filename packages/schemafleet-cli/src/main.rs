use clap::{Parser, Subcommand, ValueEnum};
use eyre::Context;
use schemafleet_core::selector::TenantSelector;
use schemafleet_database::models::group::GroupId;
use std::io::Write;
use std::path::PathBuf;

mod config;
mod init;
mod migrate;
mod rollback;
mod status;

use config::CliConfiguration;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the cli configuration file
    #[arg(short, long)]
    pub config: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the registry tables in the root database
    Init {},

    /// Apply pending migrations to one tenant, a group, or the fleet
    Migrate {
        /// Base name of a single tenant to migrate
        tenant: Option<String>,

        /// Migrate every active tenant
        #[arg(long)]
        all: bool,

        /// Migrate every active tenant of one group
        #[arg(long)]
        group: Option<GroupId>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Revert migrations on one tenant, a group, or the fleet
    Rollback {
        /// Base name of a single tenant to roll back
        tenant: Option<String>,

        /// Roll back every active tenant
        #[arg(long)]
        all: bool,

        /// Roll back every active tenant of one group
        #[arg(long)]
        group: Option<GroupId>,

        /// Number of migrations to revert; omitted reverts the last
        /// migration run
        #[arg(long)]
        step: Option<usize>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Show pending migrations per tenant (read-only)
    Status {
        /// Base name of a single tenant to inspect
        tenant: Option<String>,

        /// Inspect every active tenant
        #[arg(long)]
        all: bool,

        /// Inspect every active tenant of one group
        #[arg(long)]
        group: Option<GroupId>,

        /// Filter the output
        #[arg(long)]
        only: Option<StatusFilter>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum StatusFilter {
    /// Only tenants with pending migrations
    Pending,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Load environment variables
    _ = dotenvy::dotenv();

    // Setup colorful error logging
    color_eyre::install()?;

    // Start configuring a `fmt` subscriber
    let subscriber = tracing_subscriber::fmt()
        // Use the logging options from env variables
        .with_env_filter("sqlx=warn,info")
        // Display source code file paths
        .with_file(true)
        // Display source code line numbers
        .with_line_number(true)
        // Don't display the event's target (module path)
        .with_target(false)
        // Build the subscriber
        .finish();

    // use that subscriber to process traces emitted after this point
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    // Load the cli config
    let config_raw = tokio::fs::read(args.config).await?;
    let config: CliConfiguration =
        serde_json::from_slice(&config_raw).context("failed to parse config")?;

    match args.command {
        Commands::Init {} => {
            init::init(&config).await?;
            Ok(())
        }
        Commands::Migrate {
            tenant,
            all,
            group,
            force,
        } => {
            let selector = selector(tenant, group, all)?;
            migrate::migrate(&config, selector, force).await?;
            Ok(())
        }
        Commands::Rollback {
            tenant,
            all,
            group,
            step,
            force,
        } => {
            let selector = selector(tenant, group, all)?;
            rollback::rollback(&config, selector, step, force).await?;
            Ok(())
        }
        Commands::Status {
            tenant,
            all,
            group,
            only,
        } => {
            let selector = selector(tenant, group, all)?;
            status::status(&config, selector, only).await?;
            Ok(())
        }
    }
}

/// Build the tenant selector from the shared target arguments
fn selector(
    tenant: Option<String>,
    group: Option<GroupId>,
    all: bool,
) -> eyre::Result<TenantSelector> {
    match (tenant, group, all) {
        (Some(base), None, false) => Ok(TenantSelector::One(base)),
        (None, Some(group_id), false) => Ok(TenantSelector::Group(group_id)),
        (None, None, true) => Ok(TenantSelector::All),
        _ => Err(eyre::eyre!(
            "specify exactly one target: a tenant base name, --group, or --all"
        )),
    }
}

/// Ask the operator to confirm a mutating fleet operation
fn confirm(prompt: &str) -> eyre::Result<bool> {
    print!("{prompt} [y/N]: ");
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;

    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
