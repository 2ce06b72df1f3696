//! The load-and-verify procedure shared by every trigger.

use crate::clouds::gcloud::bigquery::{self, TableSchema};
use crate::clouds::gcloud::Client;
use crate::common::*;
use crate::config::Config;
use crate::schema::SchemaRegistry;
use crate::table_name::TableName;

/// Policy governing what happens to a destination table's existing rows.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum WriteMode {
    /// Destroy all prior rows before the new data lands. Loading the same
    /// file twice reproduces the same table state.
    Overwrite,
    /// Add rows without touching existing ones. Loading the same file twice
    /// duplicates every row.
    Append,
}

/// Where the schema for a load comes from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum SchemaPolicy {
    /// Use the registry's explicit schema for the resolved table.
    Registry,
    /// Let the warehouse infer column types from the input records.
    Autodetect,
}

/// A single bulk-load request.
#[derive(Clone, Debug)]
pub(crate) struct LoadRequest {
    /// The `gs://` URL of the newline-delimited JSON input.
    pub(crate) source_uri: Url,
    /// The table the data lands in.
    pub(crate) target_table: TableName,
    /// The explicit schema, or `None` to autodetect.
    pub(crate) schema: Option<TableSchema>,
    /// What happens to the table's existing rows.
    pub(crate) write_mode: WriteMode,
}

/// The outcome of resolving and loading a stored object. Failures are the
/// `Err` arm of the surrounding `Result`, so callers see exactly three
/// cases: loaded, ignored, or failed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum LoadOutcome {
    /// The object was loaded; the table now holds `rows` rows.
    Loaded { table: &'static str, rows: u64 },
    /// The object is not one this system manages.
    Ignored,
}

/// Issues bulk loads against the configured dataset.
pub(crate) struct Loader {
    config: Config,
    registry: SchemaRegistry,
}

impl Loader {
    /// Create a loader for the given deployment configuration.
    pub(crate) fn new(config: Config) -> Loader {
        let registry = SchemaRegistry::new(config.product_id_type);
        Loader { config, registry }
    }

    /// The registry of known destination tables.
    pub(crate) fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Submit a bulk-load job, block until it finishes, then confirm by
    /// reading back the destination table's row count.
    #[instrument(
        level = "debug",
        skip(self, request),
        fields(table = %request.target_table, uri = %request.source_uri),
    )]
    pub(crate) async fn load(&self, request: &LoadRequest) -> Result<u64> {
        info!(
            "loading {} into {} ({:?})",
            request.source_uri, request.target_table, request.write_mode,
        );

        // Credentials are resolved per invocation, so a key file added or
        // removed between triggers takes effect without a restart.
        let client = Client::new(self.config.service_account_key.as_deref()).await?;
        bigquery::load(
            &client,
            &request.source_uri,
            &request.target_table,
            request.schema.as_ref(),
            request.write_mode.into(),
        )
        .await
        .with_context(|| {
            format!(
                "could not load {} into {}",
                request.source_uri, request.target_table,
            )
        })?;

        let rows = bigquery::row_count(&client, &request.target_table).await?;
        info!("{} now holds {} rows", request.target_table, rows);
        Ok(rows)
    }

    /// Resolve `object` to a destination table and load it.
    ///
    /// An object whose name maps to no known table is reported as
    /// [`LoadOutcome::Ignored`], never as an error.
    pub(crate) async fn load_resolved(
        &self,
        resolve: impl Fn(&str) -> Option<&'static str>,
        bucket: &str,
        object: &str,
        write_mode: WriteMode,
        schema_policy: SchemaPolicy,
    ) -> Result<LoadOutcome> {
        let table = match resolve(object) {
            Some(table) => table,
            None => {
                warn!("{} does not map to any known table, skipping", object);
                return Ok(LoadOutcome::Ignored);
            }
        };
        let schema = match schema_policy {
            SchemaPolicy::Registry => Some(self.registry.get(table)?.clone()),
            SchemaPolicy::Autodetect => None,
        };
        let request = LoadRequest {
            source_uri: gs_url(bucket, object)?,
            target_table: self.config.table_name(table)?,
            schema,
            write_mode,
        };
        let rows = self.load(&request).await?;
        Ok(LoadOutcome::Loaded { table, rows })
    }
}

/// Build a `gs://` URL for an object.
pub(crate) fn gs_url(bucket: &str, object: &str) -> Result<Url> {
    format!("gs://{}/{}", bucket, object)
        .parse::<Url>()
        .with_context(|| format!("invalid object location gs://{}/{}", bucket, object))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ProductIdType;
    use pretty_assertions::assert_eq;

    fn test_config() -> Config {
        Config {
            project_id: "fresh-ocean".to_owned(),
            dataset: "glamira_dataset".to_owned(),
            bucket: "twan_glamira".to_owned(),
            service_account_key: None,
            listen: "127.0.0.1:8080".to_owned(),
            product_id_type: ProductIdType::Integer,
        }
    }

    #[test]
    fn gs_urls_are_well_formed() {
        let url = gs_url("twan_glamira", "dataset_export/ip_location_results.jsonl")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "gs://twan_glamira/dataset_export/ip_location_results.jsonl",
        );
    }

    #[tokio::test]
    async fn unmapped_objects_are_ignored_not_failed() {
        let loader = Loader::new(test_config());
        let outcome = loader
            .load_resolved(
                crate::resolver::substring,
                "twan_glamira",
                "orders.jsonl",
                WriteMode::Overwrite,
                SchemaPolicy::Registry,
            )
            .await
            .unwrap();
        assert_eq!(outcome, LoadOutcome::Ignored);
    }
}
