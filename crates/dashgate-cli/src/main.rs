//! dashgate operator CLI.
//!
//! Runs the access policy core against hand-written requests and manages the
//! dashboard documents served to the BI SDK.
//!
//! # Quick Start
//!
//! ```bash
//! # What does customer ANTON get when opening the Orders table?
//! dashgate check --header x-customer-id=ANTON --table Orders
//!
//! # Same for a bound procedure, as JSON
//! dashgate check --header x-customer-id=ANTON --procedure CustOrderHist --json
//!
//! # Store a dashboard designed elsewhere
//! dashgate dashboards import Sales ./Sales.rdash
//! ```

mod commands;
mod style;

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use dashgate_policy::ResourceDescriptor;

use commands::config::OutputFormat;

/// dashgate - per-customer access control for embedded BI dashboards.
#[derive(Parser)]
#[command(name = "dashgate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory holding dashgate.toml.
    #[arg(long, global = true, default_value = ".")]
    project: PathBuf,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// Evaluate one request against the access policy.
    Check(CheckArgs),

    /// Dashboard document commands.
    #[command(subcommand)]
    Dashboards(DashboardCommands),

    /// Configuration commands.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args)]
struct CheckArgs {
    /// Request header as NAME=VALUE (repeatable).
    #[arg(long = "header", value_name = "NAME=VALUE", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    #[command(flatten)]
    target: CheckTarget,

    /// Print the result as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct CheckTarget {
    /// Table item by name.
    #[arg(long)]
    table: Option<String>,

    /// Stored procedure item by id.
    #[arg(long)]
    procedure: Option<String>,

    /// Custom query item by id.
    #[arg(long)]
    query: Option<String>,
}

impl CheckTarget {
    fn into_resource(self) -> Result<ResourceDescriptor> {
        match (self.table, self.procedure, self.query) {
            (Some(name), None, None) => Ok(ResourceDescriptor::table(name)),
            (None, Some(id), None) => Ok(ResourceDescriptor::procedure(id)),
            (None, None, Some(id)) => Ok(ResourceDescriptor::custom_query(id)),
            _ => bail!("exactly one of --table, --procedure or --query is required"),
        }
    }
}

#[derive(Subcommand)]
enum DashboardCommands {
    /// List stored dashboards.
    List,

    /// Print a stored dashboard document.
    Show {
        /// Dashboard id.
        id: String,
    },

    /// Store a dashboard document from a file.
    Import {
        /// Dashboard id to store under.
        id: String,

        /// Path of the document to import.
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration.
    Show {
        /// Output format.
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Validate the configuration and its policy rules.
    Validate,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got {raw:?}")),
    }
}

fn main() -> Result<()> {
    // Logs go to stderr so command output stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    style::set_no_color(
        cli.no_color || std::env::var_os("NO_COLOR").is_some() || !std::io::stdout().is_terminal(),
    );

    let project = cli.project.as_path();
    match cli.command {
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
        Commands::Check(args) => {
            let resource = args.target.into_resource()?;
            commands::check::run(project, args.headers, &resource, args.json)
        }
        Commands::Dashboards(cmd) => match cmd {
            DashboardCommands::List => commands::dashboards::list(project),
            DashboardCommands::Show { id } => commands::dashboards::show(project, &id),
            DashboardCommands::Import { id, file } => {
                commands::dashboards::import(project, &id, &file)
            }
        },
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show { format } => commands::config::show(project, format),
            ConfigCommands::Validate => commands::config::validate(project),
        },
    }
}
