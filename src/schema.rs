//! Table schemas and the registry of known destination tables.

use serde::{Deserialize, Serialize};
use std::{error, fmt};

use crate::clouds::gcloud::bigquery::TableSchema;

/// The column types this system loads. The upstream exports only contain
/// strings and integers.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum FieldType {
    String,
    Integer,
}

/// The mode of a column: Is it nullable?
///
/// This can be omitted in schemas returned by BigQuery, in which case it
/// corresponds to `NULLABLE`.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum Mode {
    #[default]
    Nullable,
    Required,
}

/// A BigQuery column declaration.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub(crate) struct BqColumn {
    /// The name of the column.
    pub(crate) name: String,

    /// The type of the column.
    #[serde(rename = "type")]
    pub(crate) ty: FieldType,

    /// The mode of the column.
    #[serde(default)]
    pub(crate) mode: Mode,
}

impl BqColumn {
    /// A column that must be present in every record.
    pub(crate) fn required(name: &str, ty: FieldType) -> BqColumn {
        BqColumn {
            name: name.to_owned(),
            ty,
            mode: Mode::Required,
        }
    }

    /// A column that may be null.
    pub(crate) fn nullable(name: &str, ty: FieldType) -> BqColumn {
        BqColumn {
            name: name.to_owned(),
            ty,
            mode: Mode::Nullable,
        }
    }
}

/// How `product_id` columns are typed.
///
/// The upstream system has loaded these exports as both INTEGER and STRING
/// at different times, so the type is a deployment decision rather than
/// something we hard-code.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ProductIdType {
    #[default]
    Integer,
    String,
}

impl From<ProductIdType> for FieldType {
    fn from(ty: ProductIdType) -> FieldType {
        match ty {
            ProductIdType::Integer => FieldType::Integer,
            ProductIdType::String => FieldType::String,
        }
    }
}

/// An error returned when a table name is not in the registry.
#[derive(Clone, Debug)]
pub(crate) struct UnknownTableError {
    table: String,
}

impl fmt::Display for UnknownTableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown table: {}", self.table)
    }
}

impl error::Error for UnknownTableError {}

/// The static mapping from destination table names to their schemas.
///
/// Built once at startup and read-only afterwards.
#[derive(Debug)]
pub(crate) struct SchemaRegistry {
    tables: Vec<(&'static str, TableSchema)>,
}

impl SchemaRegistry {
    /// Build the registry of the three predefined tables.
    pub(crate) fn new(product_id_type: ProductIdType) -> SchemaRegistry {
        let product_id = FieldType::from(product_id_type);
        let tables = vec![
            (
                "ip_locations",
                TableSchema::new(vec![
                    BqColumn::required("ip", FieldType::String),
                    BqColumn::nullable("country", FieldType::String),
                    BqColumn::nullable("region", FieldType::String),
                    BqColumn::nullable("city", FieldType::String),
                ]),
            ),
            (
                "product_ids_to_crawl",
                TableSchema::new(vec![
                    BqColumn::required("product_id", product_id),
                    BqColumn::nullable("url", FieldType::String),
                ]),
            ),
            (
                "crawl_product_id",
                TableSchema::new(vec![BqColumn::required("product_id", product_id)]),
            ),
        ];
        SchemaRegistry { tables }
    }

    /// Look up the schema for `table`.
    pub(crate) fn get(&self, table: &str) -> Result<&TableSchema, UnknownTableError> {
        self.tables
            .iter()
            .find(|(name, _)| *name == table)
            .map(|(_, schema)| schema)
            .ok_or_else(|| UnknownTableError {
                table: table.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn registry_knows_the_three_tables() {
        let registry = SchemaRegistry::new(ProductIdType::Integer);
        for table in ["ip_locations", "product_ids_to_crawl", "crawl_product_id"] {
            assert!(registry.get(table).is_ok(), "missing table {}", table);
        }
    }

    #[test]
    fn unknown_tables_fail_fast() {
        let registry = SchemaRegistry::new(ProductIdType::Integer);
        let err = registry.get("glamira_orders").unwrap_err();
        assert_eq!(err.to_string(), "unknown table: glamira_orders");
    }

    #[test]
    fn ip_locations_columns_keep_their_order() {
        let registry = SchemaRegistry::new(ProductIdType::Integer);
        let schema = registry.get("ip_locations").unwrap();
        let names = schema
            .fields
            .iter()
            .map(|column| column.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, ["ip", "country", "region", "city"]);
        assert_eq!(schema.fields[0].mode, Mode::Required);
        assert_eq!(schema.fields[1].mode, Mode::Nullable);
    }

    #[test]
    fn product_id_type_is_a_deployment_choice() {
        let registry = SchemaRegistry::new(ProductIdType::String);
        assert_eq!(
            registry.get("crawl_product_id").unwrap().fields[0].ty,
            FieldType::String,
        );
        assert_eq!(
            registry.get("product_ids_to_crawl").unwrap().fields[0].ty,
            FieldType::String,
        );

        let registry = SchemaRegistry::new(ProductIdType::Integer);
        assert_eq!(
            registry.get("crawl_product_id").unwrap().fields[0].ty,
            FieldType::Integer,
        );
    }

    #[test]
    fn columns_serialize_in_bigquery_wire_shape() {
        let column = BqColumn::required("product_id", FieldType::Integer);
        let json = serde_json::to_value(&column).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "product_id",
                "type": "INTEGER",
                "mode": "REQUIRED",
            }),
        );
    }
}
