//! BigQuery table names.

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

use crate::common::*;

/// A BigQuery table name of the form `"project:dataset.table"`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct TableName {
    /// The name of the Google Cloud project.
    project: String,
    /// The BigQuery dataset.
    dataset: String,
    /// The table.
    table: String,
}

impl TableName {
    /// Build a table name from its parts, rejecting empty or malformed
    /// components before anything reaches the warehouse.
    pub(crate) fn new(project: &str, dataset: &str, table: &str) -> Result<TableName> {
        lazy_static! {
            static ref COMPONENT_RE: Regex =
                Regex::new("^[^:.`]+$").expect("could not parse built-in regex");
        }
        for component in [project, dataset, table] {
            if !COMPONENT_RE.is_match(component) {
                return Err(format_err!(
                    "invalid BigQuery table name component: {:?}",
                    component,
                ));
            }
        }
        Ok(TableName {
            project: project.to_owned(),
            dataset: dataset.to_owned(),
            table: table.to_owned(),
        })
    }

    /// Return the name of the table's project.
    pub(crate) fn project(&self) -> &str {
        &self.project
    }

    /// Return the name of the table's dataset.
    pub(crate) fn dataset(&self) -> &str {
        &self.dataset
    }

    /// Return the bare table name itself, without project or dataset.
    pub(crate) fn table(&self) -> &str {
        &self.table
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.project, self.dataset, self.table)
    }
}
