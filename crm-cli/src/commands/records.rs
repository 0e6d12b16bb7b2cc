//! Record commands over the configured storage backend.

use clap::Subcommand;
use console::style;
use tracing::warn;

use crm_core::config::{ConfigHandle, StorageBackend};
use crm_core::error::{CrmError, CrmResult};
use crm_models::{EntityKind, Record, Repository};
use crate::OutputFormat;

#[derive(Subcommand)]
pub enum RecordsAction {
    /// List all records of a kind.
    List {
        /// Entity kind (clients, proposals, organizations, users, forms).
        kind: String,
    },
    /// Create a record from a JSON object.
    Add {
        /// Entity kind.
        kind: String,
        /// Record payload, e.g. '{"name": "Acme"}'.
        json: String,
    },
    /// Show one record.
    Get {
        /// Entity kind.
        kind: String,
        /// Record id.
        id: String,
    },
    /// Delete one record.
    Delete {
        /// Entity kind.
        kind: String,
        /// Record id.
        id: String,
    },
}

pub async fn run(config: ConfigHandle, action: RecordsAction, format: OutputFormat) -> CrmResult<()> {
    if config.read().await.storage.backend == StorageBackend::Memory {
        warn!("memory backend selected: records are not kept between runs");
    }
    let backends = super::open_backends(&config).await?;
    let repo = backends.repository.clone();

    match action {
        RecordsAction::List { kind } => {
            let kind: EntityKind = kind.parse()?;
            let records = repo.list(kind).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
                OutputFormat::Text => {
                    if records.is_empty() {
                        println!("  No {kind} found.");
                    } else {
                        println!("{}", super::records_table(&records));
                        println!("  {} {kind}", records.len());
                    }
                }
            }
        }
        RecordsAction::Add { kind, json } => {
            let kind: EntityKind = kind.parse()?;
            let value: serde_json::Value = serde_json::from_str(&json)?;
            let record = repo.create(kind, Record::data_from_value(value)?).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
                OutputFormat::Text => {
                    println!("  {} Created {kind}/{}", style("OK").green().bold(), record.id);
                }
            }
        }
        RecordsAction::Get { kind, id } => {
            let kind: EntityKind = kind.parse()?;
            let record = repo
                .get(kind, &id)
                .await?
                .ok_or_else(|| CrmError::NotFound(format!("{kind}/{id}")))?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
                OutputFormat::Text => {
                    println!("{}", style(format!("{kind}/{}", record.id)).bold().underlined());
                    println!("  Created: {}", record.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
                    println!("  Updated: {}", record.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
                    for (key, value) in &record.data {
                        println!("  {key}: {value}");
                    }
                }
            }
        }
        RecordsAction::Delete { kind, id } => {
            let kind: EntityKind = kind.parse()?;
            let removed = repo.delete(kind, &id).await?;
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::json!({ "id": id, "deleted": removed }));
                }
                OutputFormat::Text => {
                    if removed {
                        println!("  {} Deleted {kind}/{id}", style("OK").green().bold());
                    } else {
                        println!("  {} {kind}/{id} not found", style("--").yellow().bold());
                    }
                }
            }
        }
    }

    Ok(())
}
