//! The `event` subcommand: handle a single storage-event payload.

use serde::Deserialize;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

use crate::common::*;
use crate::config::Config;
use crate::loader::{LoadOutcome, Loader, SchemaPolicy, WriteMode};
use crate::resolver;

/// The `{name, bucket}` pair identifying the finalized object.
#[derive(Debug, Deserialize)]
struct StorageEventPayload {
    name: String,
    bucket: String,
}

/// Event metadata supplied by the host.
#[derive(Debug, Deserialize)]
struct EventContext {
    event_id: String,
    timestamp: String,
    #[serde(default)]
    resource: serde_json::Value,
}

/// The envelope this subcommand reads: the event itself plus its context.
#[derive(Debug, Deserialize)]
struct StorageEventEnvelope {
    event: StorageEventPayload,
    #[serde(default)]
    context: Option<EventContext>,
}

/// Load the file named by a storage event.
///
/// A load failure propagates out of `main` with a nonzero exit, so the host
/// event system can apply its own redelivery policy.
pub(crate) async fn run(config: Config, payload: Option<PathBuf>) -> Result<()> {
    let raw = match &payload {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("could not read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buffer)
                .await
                .context("could not read event payload from stdin")?;
            buffer
        }
    };
    let envelope = serde_json::from_str::<StorageEventEnvelope>(&raw)
        .context("could not parse storage event payload")?;

    info!(
        "new file detected: {} in bucket {}",
        envelope.event.name, envelope.event.bucket,
    );
    if let Some(context) = &envelope.context {
        info!(
            "event {} at {} (resource: {})",
            context.event_id, context.timestamp, context.resource,
        );
    }

    let loader = Loader::new(config);
    match loader
        .load_resolved(
            resolver::substring,
            &envelope.event.bucket,
            &envelope.event.name,
            WriteMode::Overwrite,
            SchemaPolicy::Registry,
        )
        .await?
    {
        LoadOutcome::Loaded { table, rows } => {
            info!("load completed for table {} ({} rows)", table, rows);
        }
        // Not a file we manage. The event is still consumed cleanly so the
        // host doesn't redeliver it.
        LoadOutcome::Ignored => {}
    }
    Ok(())
}
