//! LumiMeds E2E CLI - Main Entry Point
//!
//! Reporting side of the browser suite: Slack notifications, video uploads
//! and report summaries.

use clap::{Parser, Subcommand};
use tracing::error;

use lumimeds_cli::commands::{notify, summary, upload};

/// LumiMeds E2E - run reporting and artifact uploads
#[derive(Parser)]
#[command(name = "lumimeds")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Post the run summary to Slack
    Notify(notify::NotifyArgs),

    /// Upload a run artifact
    #[command(subcommand)]
    Upload(upload::UploadCommands),

    /// Print the run summary
    Summary(summary::SummaryArgs),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Notify(args) => notify::execute(args).await,
        Commands::Upload(cmd) => upload::execute(cmd).await,
        Commands::Summary(args) => summary::execute(args).await,
        Commands::Version => {
            println!("LumiMeds E2E CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Report schema shared with lumimeds-e2e v{}", lumimeds_common::VERSION);
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
