//! Config commands.

use std::path::PathBuf;

use clap::Subcommand;
use console::style;

use crm_core::config::{AppConfig, ConfigHandle};
use crm_core::error::{CrmError, CrmResult};
use crate::OutputFormat;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration.
    Show,
    /// Write a default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Show the configuration file path.
    Path,
}

pub async fn run(
    config: ConfigHandle,
    path_override: Option<PathBuf>,
    action: ConfigAction,
    format: OutputFormat,
) -> CrmResult<()> {
    let path = match path_override {
        Some(path) => path,
        None => AppConfig::default_config_path()?,
    };

    match action {
        ConfigAction::Show => {
            let cfg = config.read().await;
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&*cfg)?);
                }
                OutputFormat::Text => {
                    let rendered = toml::to_string_pretty(&*cfg)
                        .map_err(|e| CrmError::Config(format!("failed to render config: {e}")))?;
                    println!("# {}", path.display());
                    print!("{rendered}");
                }
            }
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                return Err(CrmError::Config(format!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                )));
            }
            AppConfig::default().save_to_file(&path)?;
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::json!({ "path": path.display().to_string() }));
                }
                OutputFormat::Text => {
                    println!("  {} Wrote {}", style("OK").green().bold(), path.display());
                }
            }
        }
        ConfigAction::Path => match format {
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "path": path.display().to_string(),
                        "exists": path.exists(),
                    })
                );
            }
            OutputFormat::Text => println!("{}", path.display()),
        },
    }

    Ok(())
}
