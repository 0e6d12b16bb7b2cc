//! Sync command: start the realtime bridge for a local session.

use console::style;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use crm_core::config::ConfigHandle;
use crm_core::error::CrmResult;
use crm_services::event_bus::{event_label, AppEvent};
use crate::OutputFormat;

pub async fn run(config: ConfigHandle, user: String, watch: bool, format: OutputFormat) -> CrmResult<()> {
    let backends = super::open_backends(&config).await?;
    let registry = super::build_registry(&config, &backends).await?;
    super::sign_in(&backends, &user)?;

    // Subscribe before init so the startup events are not missed.
    let mut events = registry.event_bus().subscribe();

    if let OutputFormat::Text = format {
        println!(
            "  {} Starting realtime sync as {}...\n",
            style("SYNC").cyan().bold(),
            user
        );
    }
    registry.init_all().await?;

    let snapshot = registry.status.snapshot().await;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        OutputFormat::Text => println!("{}", super::status_table(&snapshot)),
    }

    if watch {
        if let OutputFormat::Text = format {
            println!("\n  Watching for changes. Press Ctrl-C to stop.\n");
        }
        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => print_event(&event, format)?,
                    Err(RecvError::Lagged(n)) => warn!("event stream lagged, {n} event(s) skipped"),
                    Err(RecvError::Closed) => break,
                },
                _ = tokio::signal::ctrl_c() => break,
            }
        }
    }

    registry.shutdown_all().await?;
    Ok(())
}

fn print_event(event: &AppEvent, format: OutputFormat) -> CrmResult<()> {
    let label = event_label(event);
    match format {
        OutputFormat::Json => {
            let detail = match event {
                AppEvent::EntityChanged { entity, kind, record_id } => serde_json::json!({
                    "entity": entity, "kind": kind, "recordId": record_id,
                }),
                AppEvent::SyncStatusChanged { entity, status, error } => serde_json::json!({
                    "entity": entity, "status": status, "error": error,
                }),
                AppEvent::EntityRefreshed { entity, count } => serde_json::json!({
                    "entity": entity, "count": count,
                }),
                AppEvent::Toast(toast) => serde_json::to_value(toast)?,
                AppEvent::SessionChanged { signed_in, email } => serde_json::json!({
                    "signedIn": signed_in, "email": email,
                }),
            };
            println!("{}", serde_json::json!({ "event": label, "data": detail }));
        }
        OutputFormat::Text => {
            let detail = match event {
                AppEvent::EntityChanged { entity, kind, record_id } => {
                    format!("{kind} on {entity} ({})", record_id.as_deref().unwrap_or("?"))
                }
                AppEvent::SyncStatusChanged { entity, status, error } => match error {
                    Some(e) => format!("{entity}: {} ({e})", super::status_label(*status)),
                    None => format!("{entity}: {}", super::status_label(*status)),
                },
                AppEvent::EntityRefreshed { entity, count } => {
                    format!("{entity}: {count} record(s)")
                }
                AppEvent::Toast(toast) => format!("[{}] {}: {}", toast.level, toast.title, toast.body),
                AppEvent::SessionChanged { signed_in: true, email } => {
                    format!("signed in as {}", email.as_deref().unwrap_or("unknown"))
                }
                AppEvent::SessionChanged { signed_in: false, .. } => "signed out".to_string(),
            };
            println!(
                "  {} {:<18} {detail}",
                style(chrono::Local::now().format("%H:%M:%S")).dim(),
                style(label).bold()
            );
        }
    }
    Ok(())
}
