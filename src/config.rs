//! Configuration file support.

use serde::Deserialize;
use std::path::PathBuf;

use crate::common::*;
use crate::schema::ProductIdType;
use crate::table_name::TableName;

/// Process-wide configuration, resolved once at startup and passed into the
/// loader by value. Nothing here is mutated after loading.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct Config {
    /// The Google Cloud project that owns the dataset.
    pub(crate) project_id: String,

    /// The BigQuery dataset the destination tables live in.
    pub(crate) dataset: String,

    /// The Cloud Storage bucket holding the dataset exports.
    pub(crate) bucket: String,

    /// Optional path to a service account key file. When the file exists,
    /// loads authenticate with it; otherwise we fall back to application
    /// default credentials. The file is checked on every invocation.
    #[serde(default)]
    pub(crate) service_account_key: Option<PathBuf>,

    /// The address `serve` listens on.
    #[serde(default = "default_listen")]
    pub(crate) listen: String,

    /// How `product_id` columns are typed. See [`ProductIdType`].
    #[serde(default)]
    pub(crate) product_id_type: ProductIdType,
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

impl Config {
    /// Load configuration from the file at `path`, allowing
    /// `BQLOAD_`-prefixed environment variables to override individual keys.
    pub(crate) fn load(path: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("BQLOAD"))
            .build()
            .with_context(|| format!("could not read config {}", path))?;
        config
            .try_deserialize()
            .with_context(|| format!("could not parse config {}", path))
    }

    /// The fully-qualified name of `table` in the configured dataset.
    pub(crate) fn table_name(&self, table: &str) -> Result<TableName> {
        TableName::new(&self.project_id, &self.dataset, table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn load_reads_toml_and_applies_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
project_id = "fresh-ocean"
dataset = "glamira_dataset"
bucket = "twan_glamira"
"#
        )
        .unwrap();

        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.project_id, "fresh-ocean");
        assert_eq!(config.dataset, "glamira_dataset");
        assert_eq!(config.bucket, "twan_glamira");
        assert_eq!(config.listen, "127.0.0.1:8080");
        assert_eq!(config.product_id_type, ProductIdType::Integer);
        assert!(config.service_account_key.is_none());
    }

    #[test]
    fn product_id_type_is_configurable() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
project_id = "fresh-ocean"
dataset = "glamira_dataset"
bucket = "twan_glamira"
product_id_type = "string"
service_account_key = "/etc/bqload/key.json"
"#
        )
        .unwrap();

        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.product_id_type, ProductIdType::String);
        assert_eq!(
            config.service_account_key,
            Some(PathBuf::from("/etc/bqload/key.json")),
        );
    }

    #[test]
    fn table_names_use_the_configured_project_and_dataset() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
project_id = "fresh-ocean"
dataset = "glamira_dataset"
bucket = "twan_glamira"
"#
        )
        .unwrap();

        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        let name = config.table_name("ip_locations").unwrap();
        assert_eq!(name.to_string(), "fresh-ocean:glamira_dataset.ip_locations");
    }
}
