use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use pricedin::cli::chart::ChartOptions;
use pricedin::core::log::init_logging;
use pricedin::core::{Denominator, TimeRange, TransformParams};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Print the merged monthly series as JSON
    Fetch,
    /// Display asset prices under a chosen denominator
    Chart {
        /// One of GOLD, HOUSES, PCE or USD
        #[arg(short, long, default_value = "USD")]
        denominator: Denominator,

        /// Trailing number of months, or "all"
        #[arg(short, long, default_value = "all")]
        range: TimeRange,

        /// Rebase every asset to 100 at its first month
        #[arg(short, long)]
        indexed: bool,

        /// Print chart rows as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

impl From<Commands> for pricedin::AppCommand {
    fn from(cmd: Commands) -> pricedin::AppCommand {
        match cmd {
            Commands::Fetch => pricedin::AppCommand::Fetch,
            Commands::Chart {
                denominator,
                range,
                indexed,
                json,
            } => pricedin::AppCommand::Chart(ChartOptions {
                params: TransformParams {
                    denominator,
                    range,
                    indexed,
                },
                json,
            }),
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => pricedin::cli::setup::setup(),
        Some(cmd) => pricedin::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
