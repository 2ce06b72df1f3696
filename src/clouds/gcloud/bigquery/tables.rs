//! Support for looking up BigQuery table metadata.

use serde::Deserialize;

use super::super::{percent_encode, Client, NoQuery};
use crate::common::*;
use crate::table_name::TableName;

/// Information about a table. We only care about the row count.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Table {
    /// The number of rows in the table, as a decimal string.
    #[serde(default)]
    num_rows: Option<String>,
}

/// Look up the current row count of `name`.
#[instrument(level = "trace", skip(client))]
pub(crate) async fn row_count(client: &Client, name: &TableName) -> Result<u64> {
    let url = format!(
        "https://bigquery.googleapis.com/bigquery/v2/projects/{}/datasets/{}/tables/{}",
        percent_encode(name.project()),
        percent_encode(name.dataset()),
        percent_encode(name.table()),
    );

    let table = client.get::<Table, _, _>(&url, NoQuery).await?;
    let num_rows = table
        .num_rows
        .ok_or_else(|| format_err!("table {} did not report a row count", name))?;
    num_rows
        .parse::<u64>()
        .with_context(|| format!("could not parse row count for {}", name))
}
