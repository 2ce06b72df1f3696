//! The `batch` subcommand: reload all three dataset exports.

use crate::common::*;
use crate::config::Config;
use crate::loader::{gs_url, LoadRequest, Loader, WriteMode};

/// The dataset exports loaded by a batch run, in order.
const BATCH_OBJECTS: &[(&str, &str)] = &[
    ("dataset_export/ip_location_results.jsonl", "ip_locations"),
    (
        "dataset_export/product_ids_to_crawl.jsonl",
        "product_ids_to_crawl",
    ),
    ("dataset_export/valid_product_ids.jsonl", "crawl_product_id"),
];

/// Reload every export with its explicit schema, overwriting whatever the
/// tables held before. Loads run strictly in order; a failure aborts the
/// remaining ones.
pub(crate) async fn run(config: Config) -> Result<()> {
    let loader = Loader::new(config.clone());
    for &(object, table) in BATCH_OBJECTS {
        let request = LoadRequest {
            source_uri: gs_url(&config.bucket, object)?,
            target_table: config.table_name(table)?,
            schema: Some(loader.registry().get(table)?.clone()),
            write_mode: WriteMode::Overwrite,
        };
        loader
            .load(&request)
            .await
            .with_context(|| format!("could not load {}", object))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver;
    use crate::schema::{ProductIdType, SchemaRegistry};
    use pretty_assertions::assert_eq;

    #[test]
    fn batch_plan_covers_the_three_registry_tables() {
        let registry = SchemaRegistry::new(ProductIdType::Integer);
        assert_eq!(BATCH_OBJECTS.len(), 3);
        for &(object, table) in BATCH_OBJECTS {
            assert!(registry.get(table).is_ok(), "unknown table {}", table);
            // The batch plan and the webhook's stem resolution must agree on
            // where each export lands.
            assert_eq!(resolver::exact_stem(object), Some(table));
        }
    }
}
