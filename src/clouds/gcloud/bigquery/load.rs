//! Load data from Cloud Storage into BigQuery.

use super::{
    super::Client,
    jobs::{
        run_job, CreateDisposition, Job, JobConfigurationLoad, SourceFormat,
        TableReference, WriteDisposition,
    },
    TableSchema,
};
use crate::common::*;
use crate::table_name::TableName;

/// Load the newline-delimited JSON file at `gs_url` into `dest_table`,
/// blocking until the job reaches a terminal state.
///
/// When `schema` is `None`, the warehouse infers column types from sampled
/// input records.
#[instrument(level = "trace", skip(client, schema))]
pub(crate) async fn load(
    client: &Client,
    gs_url: &Url,
    dest_table: &TableName,
    schema: Option<&TableSchema>,
    write_disposition: WriteDisposition,
) -> Result<()> {
    trace!("loading {} into {}", gs_url, dest_table);

    // Configure our job.
    let autodetect = schema.is_none();
    let config = JobConfigurationLoad {
        source_uris: vec![gs_url.to_string()],
        schema: schema.cloned(),
        destination_table: TableReference::from(dest_table),
        create_disposition: Some(CreateDisposition::CreateIfNeeded),
        write_disposition: Some(write_disposition),
        source_format: Some(SourceFormat::NewlineDelimitedJson),
        autodetect: autodetect.then_some(true),
    };

    // Run our job.
    run_job(client, dest_table.project(), Job::new_load(config)).await?;
    Ok(())
}
