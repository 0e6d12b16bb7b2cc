//! Manual refresh command.

use console::style;

use crm_core::config::ConfigHandle;
use crm_core::error::CrmResult;
use crm_models::WatchedEntity;
use crate::OutputFormat;

pub async fn run(config: ConfigHandle, entity: String, user: String, format: OutputFormat) -> CrmResult<()> {
    let entity: WatchedEntity = entity.parse()?;
    let backends = super::open_backends(&config).await?;
    let registry = super::build_registry(&config, &backends).await?;
    super::sign_in(&backends, &user)?;

    // The error is already recorded in the status store; show it with the table.
    let result = registry.bridge.refresh_data(entity).await;
    let status = registry.status.get(entity).await;

    match format {
        OutputFormat::Json => {
            let records = result.as_ref().ok();
            println!(
                "{}",
                serde_json::json!({
                    "entity": entity,
                    "status": status,
                    "records": records,
                })
            );
        }
        OutputFormat::Text => {
            match result {
                Ok(ref records) if records.is_empty() => println!("  No {entity} found."),
                Ok(ref records) => println!("{}", super::records_table(records)),
                Err(ref e) => println!("  {} {e}", style("ERROR").red().bold()),
            }
            println!(
                "\n  {entity}: {}",
                super::status_label(status.status)
            );
        }
    }

    result.map(|_| ())
}
