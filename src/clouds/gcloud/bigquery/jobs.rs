//! BigQuery batch jobs.
//!
//! These use a number of closely-related types.

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};

use super::{
    super::{Client, Idempotency, NoQuery},
    BigQueryError, TableSchema,
};
use crate::common::*;
use crate::loader::WriteMode;
use crate::table_name::TableName;

/// A BigQuery job.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Job {
    /// Output only. The ID of this job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) id: Option<String>,

    /// Output only. A link which can be used to access this job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) self_link: Option<String>,

    /// The configuration for this job.
    pub(crate) configuration: JobConfiguration,

    /// Output only. The status of this job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) status: Option<JobStatus>,
}

impl Job {
    /// Create a new load job.
    pub(crate) fn new_load(load_config: JobConfigurationLoad) -> Self {
        Job {
            id: None,
            self_link: None,
            configuration: JobConfiguration {
                load: Some(load_config),
            },
            status: None,
        }
    }

    /// Get a URL which can be used to poll this job.
    pub(crate) fn url(&self) -> Result<Url> {
        self.self_link
            .as_ref()
            .ok_or_else(|| format_err!("newly created job has no selfLink"))?
            .parse::<Url>()
            .context("BigQuery returned invalid selfLink")
    }
}

/// Configuration for a job.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobConfiguration {
    /// Configuration information for load jobs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) load: Option<JobConfigurationLoad>,
}

/// Configuration for data load jobs.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobConfigurationLoad {
    pub(crate) source_uris: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) schema: Option<TableSchema>,
    pub(crate) destination_table: TableReference,
    pub(crate) create_disposition: Option<CreateDisposition>,
    pub(crate) write_disposition: Option<WriteDisposition>,
    pub(crate) source_format: Option<SourceFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) autodetect: Option<bool>,
}

/// The status of a job.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobStatus {
    /// The state of this job.
    state: JobState,

    /// If present, indicates that the job failed.
    error_result: Option<BigQueryError>,

    /// Errors encountered while running the job. These do not necessarily
    /// indicate that the job has finished or was unsuccessful.
    #[serde(default)]
    errors: Vec<BigQueryError>,
}

impl JobStatus {
    /// Check to see if we've encountered an error.
    fn check_for_error(&self) -> Result<(), BigQueryError> {
        if let Some(err) = &self.error_result {
            Err(err.clone())
        } else {
            Ok(())
        }
    }
}

/// The state of a job.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum JobState {
    /// This job is waiting to run.
    Pending,
    /// This job is currently running.
    Running,
    /// This job has finished.
    Done,
}

/// The name of a table.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TableReference {
    pub(crate) project_id: String,
    pub(crate) dataset_id: String,
    pub(crate) table_id: String,
}

impl From<&TableName> for TableReference {
    fn from(name: &TableName) -> Self {
        Self {
            project_id: name.project().to_owned(),
            dataset_id: name.dataset().to_owned(),
            table_id: name.table().to_owned(),
        }
    }
}

/// Should this job create new tables?
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(dead_code, clippy::enum_variant_names)]
pub(crate) enum CreateDisposition {
    CreateIfNeeded,
    CreateNever,
}

/// What should we do with any existing data?
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(dead_code, clippy::enum_variant_names)]
pub(crate) enum WriteDisposition {
    WriteTruncate,
    WriteAppend,
    WriteEmpty,
}

impl From<WriteMode> for WriteDisposition {
    fn from(mode: WriteMode) -> Self {
        match mode {
            WriteMode::Overwrite => WriteDisposition::WriteTruncate,
            WriteMode::Append => WriteDisposition::WriteAppend,
        }
    }
}

/// The source data format for load jobs.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub(crate) enum SourceFormat {
    #[serde(rename = "NEWLINE_DELIMITED_JSON")]
    NewlineDelimitedJson,
}

/// Run a BigQuery job to completion.
pub(crate) async fn run_job(
    client: &Client,
    project_id: &str,
    mut job: Job,
) -> Result<Job> {
    trace!("starting BigQuery job on {} {:?}", project_id, job);

    // Create our job. Load jobs are not idempotent, so a failed insert is
    // never resubmitted; retry belongs to whatever triggered us.
    let insert_url = format!(
        "https://bigquery.googleapis.com/bigquery/v2/projects/{}/jobs",
        project_id,
    );
    job = client
        .post::<Job, _, _, _>(&insert_url, Idempotency::UnsafeToRetry, NoQuery, job)
        .await?;
    if let Some(id) = &job.id {
        debug!("created job {}", id);
    }

    // Get the URL for polling the job.
    let job_url = job.url()?;

    // Poll until the job reaches a terminal state.
    let mut sleep_duration = Duration::from_secs(2);
    loop {
        // Check to see if the job is done.
        let state = job.status.as_ref().map(|s| s.state);
        if state == Some(JobState::Done) {
            break;
        }

        // Wait for a while.
        sleep(sleep_duration).await;
        if sleep_duration < Duration::from_secs(16) {
            sleep_duration *= 2;
        }

        // Update our job.
        job = client.get::<Job, _, _>(job_url.as_str(), NoQuery).await?;
    }

    // Return either an error or a finished job.
    job.status
        .as_ref()
        .expect("should have already checked for status")
        .check_for_error()?;
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{BqColumn, FieldType};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn table_reference() -> TableReference {
        TableReference {
            project_id: "fresh-ocean".to_owned(),
            dataset_id: "glamira_dataset".to_owned(),
            table_id: "ip_locations".to_owned(),
        }
    }

    #[test]
    fn write_modes_map_to_dispositions() {
        assert_eq!(
            WriteDisposition::from(WriteMode::Overwrite),
            WriteDisposition::WriteTruncate,
        );
        assert_eq!(
            WriteDisposition::from(WriteMode::Append),
            WriteDisposition::WriteAppend,
        );
    }

    #[test]
    fn load_jobs_serialize_in_wire_shape() {
        let config = JobConfigurationLoad {
            source_uris: vec!["gs://b/f.jsonl".to_owned()],
            schema: Some(TableSchema::new(vec![BqColumn::required(
                "ip",
                FieldType::String,
            )])),
            destination_table: table_reference(),
            create_disposition: Some(CreateDisposition::CreateIfNeeded),
            write_disposition: Some(WriteDisposition::WriteTruncate),
            source_format: Some(SourceFormat::NewlineDelimitedJson),
            autodetect: None,
        };
        let json = serde_json::to_value(Job::new_load(config)).unwrap();
        assert_eq!(
            json,
            json!({
                "configuration": {
                    "load": {
                        "sourceUris": ["gs://b/f.jsonl"],
                        "schema": {
                            "fields": [
                                {"name": "ip", "type": "STRING", "mode": "REQUIRED"},
                            ],
                        },
                        "destinationTable": {
                            "projectId": "fresh-ocean",
                            "datasetId": "glamira_dataset",
                            "tableId": "ip_locations",
                        },
                        "createDisposition": "CREATE_IF_NEEDED",
                        "writeDisposition": "WRITE_TRUNCATE",
                        "sourceFormat": "NEWLINE_DELIMITED_JSON",
                    },
                },
            }),
        );
    }

    #[test]
    fn autodetect_jobs_omit_the_schema() {
        let config = JobConfigurationLoad {
            source_uris: vec!["gs://b/f.jsonl".to_owned()],
            schema: None,
            destination_table: table_reference(),
            create_disposition: Some(CreateDisposition::CreateIfNeeded),
            write_disposition: Some(WriteDisposition::WriteAppend),
            source_format: Some(SourceFormat::NewlineDelimitedJson),
            autodetect: Some(true),
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["autodetect"], json!(true));
        assert_eq!(json["writeDisposition"], json!("WRITE_APPEND"));
        assert!(json.get("schema").is_none());
    }

    #[test]
    fn job_status_surfaces_the_error_result() {
        let status = serde_json::from_value::<JobStatus>(json!({
            "state": "DONE",
            "errorResult": {
                "reason": "invalid",
                "message": "Schema mismatch",
            },
        }))
        .unwrap();
        let err = status.check_for_error().unwrap_err();
        assert_eq!(err.to_string(), "invalid: Schema mismatch");
    }

    #[test]
    fn running_jobs_are_not_terminal() {
        let status = serde_json::from_value::<JobStatus>(json!({"state": "RUNNING"}))
            .unwrap();
        assert_eq!(status.state, JobState::Running);
        assert!(status.check_for_error().is_ok());
    }
}
