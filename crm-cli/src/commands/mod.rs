//! CLI command implementations.

pub mod config;
pub mod records;
pub mod refresh;
pub mod sync;

use std::sync::Arc;

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use console::style;

use crm_core::config::ConfigHandle;
use crm_core::error::{CrmError, CrmResult};
use crm_models::Record;
use crm_realtime::{LocalTransport, SessionUser};
use crm_services::registry::{Backends, ServiceRegistry};
use crm_services::status::{StatusSnapshot, SyncStatus};

/// Open the configured backends.
pub async fn open_backends(config: &ConfigHandle) -> CrmResult<Backends> {
    let cfg = config.read().await;
    Backends::from_config(&cfg)
}

/// Build the service graph over `backends`.
pub async fn build_registry(config: &ConfigHandle, backends: &Backends) -> CrmResult<ServiceRegistry> {
    ServiceRegistry::from_backends(config.clone(), backends).await
}

/// Start a local session for `email` on the in-process transport.
pub fn sign_in(backends: &Backends, email: &str) -> CrmResult<Arc<LocalTransport>> {
    let transport = backends.transport.clone().ok_or_else(|| {
        CrmError::TransportUnavailable("realtime is disabled in the configuration".into())
    })?;
    transport.sign_in(SessionUser::new(format!("local:{email}"), email))?;
    Ok(transport)
}

/// Colored label for a sync status.
pub fn status_label(status: SyncStatus) -> String {
    match status {
        SyncStatus::Synced | SyncStatus::Connected => style(status).green().to_string(),
        SyncStatus::Loading => style(status).cyan().to_string(),
        SyncStatus::Error => style(status).red().bold().to_string(),
        SyncStatus::Disconnected => style(status).dim().to_string(),
    }
}

/// Render a status snapshot as a table.
pub fn status_table(snapshot: &StatusSnapshot) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Entity", "Status", "Last update", "Last error"]);

    for (entity, record) in snapshot {
        table.add_row(vec![
            entity.to_string(),
            status_label(record.status),
            record
                .last_update
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "-".into()),
            record.last_error.clone().unwrap_or_else(|| "-".into()),
        ]);
    }
    table
}

/// Render records as a table with a one-line payload preview.
pub fn records_table(records: &[Record]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["ID", "Created", "Data"]);

    for record in records {
        let preview = serde_json::to_string(&record.data).unwrap_or_default();
        table.add_row(vec![
            record.id.clone(),
            record.created_at.format("%Y-%m-%d %H:%M").to_string(),
            truncate(&preview, 60),
        ]);
    }
    table
}

/// Truncate a string to a maximum number of characters, appending an
/// ellipsis if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len > 3 {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    } else {
        s.chars().take(max_len).collect()
    }
}
