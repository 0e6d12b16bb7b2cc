//! Sales CRM CLI.
//!
//! Drives the storage layer and the realtime sync layer from the terminal.
//! Useful for scripting, inspecting records, and watching sync status
//! without a UI.

mod commands;

use clap::{Parser, Subcommand};
use tracing::info;

use crm_core::config::{AppConfig, ConfigHandle};
use crm_core::error::CrmResult;
use crm_core::logging;

/// Sales CRM - records and realtime sync from the command line.
#[derive(Parser)]
#[command(
    name = "crm",
    version,
    about = "Sales CRM command-line client",
    long_about = "A command-line interface for the Sales CRM.\n\
                  Manage clients, proposals and organizations, and watch their realtime sync status."
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json).
    #[arg(short = 'f', long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output for scripting.
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or create the configuration file.
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// List and edit stored records.
    Records {
        #[command(subcommand)]
        action: commands::records::RecordsAction,
    },
    /// Sign in locally, start the realtime bridge and show sync status.
    Sync {
        /// Email of the user to sign in as.
        #[arg(short, long)]
        user: String,
        /// Keep running and print events until Ctrl-C. Only changes made by
        /// this process are shown; edits from other `crm` invocations are
        /// not seen by the in-process change feed.
        #[arg(short, long)]
        watch: bool,
    },
    /// Run one manual refresh of a watched entity.
    Refresh {
        /// Entity to refresh (clients, proposals, organizations).
        entity: String,
        /// Email of the user to sign in as.
        #[arg(short, long)]
        user: String,
    },
}

#[tokio::main]
async fn main() -> CrmResult<()> {
    let cli = Cli::parse();

    let config_path = cli.config.as_deref().map(std::path::PathBuf::from);
    let config = match config_path {
        Some(ref path) if path.exists() => AppConfig::load_from_file(path)?,
        Some(_) => AppConfig::default(),
        None => AppConfig::load_default()?,
    };

    let log_level = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    let log_dir = config
        .effective_log_dir()
        .unwrap_or_else(|_| std::path::PathBuf::from("logs"));
    let _guard = logging::init_logging(&log_level, &log_dir, config.logging.json_output)?;

    let config_handle = ConfigHandle::new(config);

    info!("Sales CRM CLI v{}", crm_core::constants::APP_VERSION);

    match cli.command {
        Commands::Config { action } => {
            commands::config::run(config_handle, config_path, action, cli.format).await
        }
        Commands::Records { action } => {
            commands::records::run(config_handle, action, cli.format).await
        }
        Commands::Sync { user, watch } => {
            commands::sync::run(config_handle, user, watch, cli.format).await
        }
        Commands::Refresh { entity, user } => {
            commands::refresh::run(config_handle, entity, user, cli.format).await
        }
    }
}
