//! The `serve` subcommand: an HTTP trigger for storage notifications.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::common::*;
use crate::config::Config;
use crate::loader::{LoadOutcome, Loader, SchemaPolicy, WriteMode};
use crate::resolver;

/// Shared state for the HTTP trigger.
struct AppState {
    loader: Loader,
}

/// Build the trigger router.
fn router(loader: Loader) -> Router {
    Router::new()
        .route("/", post(trigger))
        .with_state(Arc::new(AppState { loader }))
}

/// Run the HTTP trigger until shutdown.
pub(crate) async fn run(config: Config, listen: Option<String>) -> Result<()> {
    let addr = listen.unwrap_or_else(|| config.listen.clone());
    let app = router(Loader::new(config));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("could not listen on {}", addr))?;
    info!("listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown())
        .await
        .context("server error")
}

async fn shutdown() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("could not install ctrl-c handler: {}", err);
    }
}

/// The JSON body of a trigger request. Both fields must be present; we keep
/// them optional here so validation can say which check failed.
#[derive(Debug, Deserialize)]
struct HttpTriggerPayload {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    bucket: Option<String>,
}

impl HttpTriggerPayload {
    /// Validate the payload into a `(name, bucket)` pair.
    fn validated(self) -> Result<(String, String), &'static str> {
        match (self.name, self.bucket) {
            (Some(name), Some(bucket)) if !name.is_empty() && !bucket.is_empty() => {
                Ok((name, bucket))
            }
            _ => Err("Bad Request: Missing fields"),
        }
    }
}

/// Parse and validate a request body.
fn parse_body(body: &[u8]) -> Result<(String, String), &'static str> {
    serde_json::from_slice::<HttpTriggerPayload>(body)
        .map_err(|_| "Bad Request: No JSON body")?
        .validated()
}

/// Handle one storage notification.
async fn trigger(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let (name, bucket) = match parse_body(&body) {
        Ok(parsed) => parsed,
        Err(message) => {
            error!("{}", message);
            return (StatusCode::BAD_REQUEST, message).into_response();
        }
    };
    info!("triggered by file {} in bucket {}", name, bucket);

    let outcome = state
        .loader
        .load_resolved(
            resolver::exact_stem,
            &bucket,
            &name,
            WriteMode::Append,
            SchemaPolicy::Autodetect,
        )
        .await;
    match outcome {
        Ok(LoadOutcome::Loaded { table, rows }) => {
            info!("load completed for table {} ({} rows)", table, rows);
            (StatusCode::OK, "OK").into_response()
        }
        Ok(LoadOutcome::Ignored) => (StatusCode::OK, "Ignored").into_response(),
        Err(err) => {
            error!("load failed: {:?}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error: {:#}", err),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ProductIdType;
    use axum::body::Body;
    use axum::http::{header::CONTENT_TYPE, Request};
    use http_body_util::BodyExt;
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    fn test_router() -> Router {
        let config = Config {
            project_id: "fresh-ocean".to_owned(),
            dataset: "glamira_dataset".to_owned(),
            bucket: "twan_glamira".to_owned(),
            service_account_key: None,
            listen: "127.0.0.1:0".to_owned(),
            product_id_type: ProductIdType::Integer,
        };
        router(Loader::new(config))
    }

    async fn post_body(body: &'static str) -> (StatusCode, String) {
        let response = test_router()
            .oneshot(
                Request::post("/")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn missing_body_is_rejected() {
        let (status, body) = post_body("").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Bad Request: No JSON body");
    }

    #[tokio::test]
    async fn empty_object_is_rejected() {
        let (status, body) = post_body("{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Bad Request: Missing fields");
    }

    #[tokio::test]
    async fn partial_payloads_are_rejected() {
        let (status, body) =
            post_body(r#"{"name": "ip_location_results.jsonl"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Bad Request: Missing fields");
    }

    #[tokio::test]
    async fn unmapped_files_are_ignored_without_loading() {
        let (status, body) =
            post_body(r#"{"name": "unknown_file.jsonl", "bucket": "b"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Ignored");
    }

    #[test]
    fn known_files_resolve_to_their_tables() {
        assert_eq!(
            resolver::exact_stem("ip_location_results.jsonl"),
            Some("ip_locations"),
        );
    }
}
