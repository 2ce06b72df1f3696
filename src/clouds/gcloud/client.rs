//! A Google Cloud REST client.

use futures::FutureExt;
use mime::{self, Mime};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::{self, header::CONTENT_TYPE, IntoUrl, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{error, fmt, path::Path, time::Duration};

use super::auth::{authenticator, AccessToken, Authenticator};
use crate::common::*;
use crate::wait::{wait, WaitOptions, WaitStatus};

/// The OAuth2 scopes that we'll need.
static SCOPES: &[&str] = &["https://www.googleapis.com/auth/bigquery"];

/// An empty `GET` query.
#[derive(Debug, Serialize)]
pub(crate) struct NoQuery;

/// An HTTP client error. We break out a few specific statuses our caller
/// might care about.
#[derive(Debug)]
pub(crate) enum ClientError {
    /// The resource at URL was not found.
    NotFound { method: String, url: Url },
    /// Another error occured. We don't currently care about the details.
    Other(Error),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::NotFound { method, url } => {
                write!(f, "cannot {} {}: Not Found", method, url)
            }
            ClientError::Other(err) => err.fmt(f),
        }
    }
}

impl error::Error for ClientError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            ClientError::NotFound { .. } => None,
            ClientError::Other(err) => err.source(),
        }
    }
}

impl From<Error> for ClientError {
    fn from(err: Error) -> Self {
        ClientError::Other(err)
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Other(err.into())
    }
}

/// Is it safe to retry a request? This should always be true for GET
/// requests, but by default POST requests are not safe to retry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Idempotency {
    SafeToRetry,
    UnsafeToRetry,
}

/// A Google Cloud REST client using OAuth2.
#[derive(Clone)]
pub(crate) struct Client {
    /// An authenticator that provides OAuth2 tokens.
    authenticator: Authenticator,

    /// Our HTTP client.
    client: reqwest::Client,
}

impl Client {
    /// Create a new Google Cloud client, resolving credentials from
    /// `key_file` (if it exists) or the ambient environment.
    #[instrument(level = "trace")]
    pub(crate) async fn new(key_file: Option<&Path>) -> Result<Client, ClientError> {
        let authenticator = authenticator(key_file).await?;
        let client = reqwest::Client::new();
        Ok(Client {
            authenticator,
            client,
        })
    }

    /// Make an HTTP GET request and return the response.
    async fn get_helper(&self, url: &Url) -> Result<reqwest::Response, ClientError> {
        trace!("GET {}", url);
        let token = self.token().await?;
        let wait_options = WaitOptions::default()
            .retry_interval(Duration::from_secs(10))
            // Don't retry too much because we're probably classifying some
            // permanent errors as temporary.
            .allowed_errors(3);
        wait(&wait_options, move || {
            let token = token.clone();
            async move {
                let resp_result = self
                    .client
                    .get(url.as_str())
                    .bearer_auth(token.as_str())
                    .send()
                    .await;
                // HTTP defines GET as idempotent, and we believe Google
                // follows this convention in their APIs.
                self.response_to_wait_status(
                    "GET",
                    url,
                    Idempotency::SafeToRetry,
                    resp_result,
                )
                .await
            }
            .boxed()
        })
        .await
    }

    /// Make an HTTP GET request with the specified URL and query parameters,
    /// and deserialize the result.
    #[instrument(level = "trace", skip(self))]
    pub(crate) async fn get<Output, U, Query>(
        &self,
        url: U,
        query: Query,
    ) -> Result<Output, ClientError>
    where
        Output: fmt::Debug + DeserializeOwned,
        U: IntoUrl + fmt::Debug,
        Query: fmt::Debug + Serialize,
    {
        let url = build_url(url, query)?;
        let http_resp = self.get_helper(&url).await?;
        self.handle_response("GET", &url, http_resp).await
    }

    /// Make an HTTP POST request with the specified URL and body.
    ///
    /// When `idempotency` is `SafeToRetry`, this may POST the request
    /// multiple times, which may cause the underlying action to be performed
    /// multiple times. The caller is responsible for deciding whether that's
    /// acceptable.
    #[instrument(level = "trace", skip(self, body))]
    pub(crate) async fn post<Output, U, Query, Body>(
        &self,
        url: U,
        idempotency: Idempotency,
        query: Query,
        body: Body,
    ) -> Result<Output, ClientError>
    where
        Output: fmt::Debug + DeserializeOwned,
        U: IntoUrl + fmt::Debug,
        Query: fmt::Debug + Serialize,
        Body: fmt::Debug + Serialize + Sync + Send,
    {
        let url = build_url(url, query)?;
        trace!("POST {} {:?}", url, body);

        let token = self.token().await?;
        let wait_options = WaitOptions::default()
            .retry_interval(Duration::from_secs(4))
            // Don't retry too much because we're probably classifying some
            // permanent errors as temporary.
            .allowed_errors(4);

        let token_ref = &token;
        let url_ref = &url;
        let body_ref = &body;
        let http_resp = wait(&wait_options, move || {
            async move {
                let resp_result = self
                    .client
                    .post(url_ref.as_str())
                    .bearer_auth(token_ref.as_str())
                    .json(body_ref)
                    .send()
                    .await;
                self.response_to_wait_status("POST", url_ref, idempotency, resp_result)
                    .await
            }
            .boxed()
        })
        .await?;
        self.handle_response("POST", &url, http_resp).await
    }

    /// Get an access token.
    #[instrument(level = "trace", skip(self))]
    async fn token(&self) -> Result<AccessToken> {
        self.authenticator
            .token(SCOPES)
            .await
            .context("could not get Google Cloud OAuth2 token")
    }

    /// Is this HTTP status code something we should retry?
    ///
    /// Our policy is basically "Don't retry things you haven't seen fail
    /// temporarily in practice." The caller gets rapid feedback for
    /// configuration or user errors, and we avoid retry amplification
    /// against an overloaded service.
    fn should_retry_status_code(&self, status_code: &StatusCode) -> bool {
        [
            // 503: This seems to happen pretty commonly, according to logs.
            StatusCode::SERVICE_UNAVAILABLE,
            // 403: Google reports exceeded rate limits with this status. In
            // a perfect world, we'd look at the error in more detail and
            // retry only the rate-limit 403s, not the "forbidden" ones.
            StatusCode::FORBIDDEN,
        ]
        .contains(status_code)
    }

    /// Convert an HTTP response into a [`WaitStatus`].
    async fn response_to_wait_status(
        &self,
        method: &str,
        url: &Url,
        idempotency: Idempotency,
        response_result: Result<reqwest::Response, reqwest::Error>,
    ) -> WaitStatus<reqwest::Response, ClientError> {
        match response_result {
            // The HTTP request failed outright, because of something like a
            // DNS error.
            Err(err) => {
                // Request and timeout errors look like the kind of things we
                // should probably retry.
                let temporary = idempotency == Idempotency::SafeToRetry
                    && (err.is_request() || err.is_timeout());
                let err: Error = err.into();
                let err: ClientError =
                    err.context(format!("could not {} {}", method, url)).into();
                if temporary {
                    WaitStatus::FailedTemporarily(err)
                } else {
                    WaitStatus::FailedPermanently(err)
                }
            }

            // We talked to the server and it returned a server-side error
            // that we expect to be transient, so retry.
            Ok(resp)
                if idempotency == Idempotency::SafeToRetry
                    && self.should_retry_status_code(&resp.status()) =>
            {
                WaitStatus::FailedTemporarily(
                    self.handle_error(method, url, resp).await,
                )
            }

            // We talked to the server and it returned some other server-side
            // error (500-599). There's a chance things might work next time,
            // but we're not sure, so just fail.
            Ok(resp) if resp.status().is_server_error() => {
                WaitStatus::FailedPermanently(
                    self.handle_error(method, url, resp).await,
                )
            }
            Ok(resp) => WaitStatus::Finished(resp),
        }
    }

    /// Handle an HTTP response.
    async fn handle_response<Output>(
        &self,
        method: &str,
        url: &Url,
        http_resp: reqwest::Response,
    ) -> Result<Output, ClientError>
    where
        Output: fmt::Debug + DeserializeOwned,
    {
        if http_resp.status().is_success() {
            let resp = http_resp.json::<Output>().await.with_context(|| {
                format!("error fetching JSON response from {}", url)
            })?;
            trace!("{} returned {:?}", method, resp);
            Ok(resp)
        } else {
            Err(self.handle_error(method, url, http_resp).await)
        }
    }

    /// Handle an HTTP error response.
    async fn handle_error(
        &self,
        method: &str,
        url: &Url,
        http_resp: reqwest::Response,
    ) -> ClientError {
        // Return 404 Not Found as a special case.
        if http_resp.status() == StatusCode::NOT_FOUND {
            return ClientError::NotFound {
                method: method.to_owned(),
                url: url.to_owned(),
            };
        }

        // Decide if we should even try to parse this response as JSON before
        // we consume our http_resp.
        let should_parse_as_json = response_claims_to_be_json(&http_resp);

        // Fetch the error body.
        let err_body_result = http_resp
            .bytes()
            .await
            .with_context(|| format!("error fetching error response from {}", url));
        let err_body = match err_body_result {
            Ok(err_body) => err_body,
            Err(err) => return err.into(),
        };

        // Try to return a nice JSON error.
        if should_parse_as_json {
            if let Ok(resp) = serde_json::from_slice::<ErrorResponse>(&err_body) {
                trace!("{} error {:?}", method, resp);
                let err: Error = resp.error.into();
                return err.context(format!("{} error {}", method, url)).into();
            }
        }

        // The server sent us something that isn't a JSON error description,
        // so just report whatever we have.
        let raw_err = String::from_utf8_lossy(&err_body);
        trace!(
            "{} {}: expected JSON describing error, but got {:?}",
            method,
            url,
            raw_err,
        );
        let err = format_err!("expected JSON describing error, but got {:?}", raw_err);
        err.context(format!("{} error {}", method, url)).into()
    }
}

/// Construct a URL from something we can convert to URL, and something that
/// we can serialize as a query string.
fn build_url<U, Query>(url: U, query: Query) -> Result<Url>
where
    U: IntoUrl,
    Query: fmt::Debug + Serialize,
{
    let mut url = url.into_url().context("could not parse URL")?;
    let query_str = serde_urlencoded::to_string(&query)?;
    if !query_str.is_empty() {
        url.set_query(Some(&query_str));
    }
    Ok(url)
}

/// A Google Cloud error response.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    /// The actual error.
    error: GCloudError,
}

/// Information about a GCloud error.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub(crate) struct GCloudError {
    pub(crate) code: i32,
    pub(crate) message: String,
    #[serde(default)]
    pub(crate) errors: Vec<ErrorDetail>,
}

impl fmt::Display for GCloudError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Google Cloud error: {} {}", self.code, self.message)
    }
}

impl error::Error for GCloudError {}

/// Details about an individual GCloud error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
pub(crate) struct ErrorDetail {
    pub(crate) domain: String,
    pub(crate) reason: String,
    pub(crate) message: String,
    pub(crate) location_type: Option<String>,
    pub(crate) location: Option<String>,
}

/// Percent-encode a string for use as a URL path component.
pub(crate) fn percent_encode(s: &str) -> impl fmt::Display + '_ {
    utf8_percent_encode(s, NON_ALPHANUMERIC)
}

/// Returns `true` if `http_resp` claims to be a JSON response.
fn response_claims_to_be_json(http_resp: &reqwest::Response) -> bool {
    let content_type = match http_resp.headers().get(CONTENT_TYPE) {
        Some(content_type) => content_type,
        None => return false,
    };
    let content_type_str = match content_type.to_str() {
        Ok(content_type_str) => content_type_str,
        Err(err) => {
            error!("Non-ASCII content type {:?}: {}", content_type, err);
            return false;
        }
    };
    let content_type_mime = match content_type_str.parse::<Mime>() {
        Ok(content_type_mime) => content_type_mime,
        Err(err) => {
            error!(
                "Could not parse content type {:?}: {}",
                content_type_str, err,
            );
            return false;
        }
    };
    content_type_mime.type_() == mime::APPLICATION
        && content_type_mime.subtype() == mime::JSON
}
