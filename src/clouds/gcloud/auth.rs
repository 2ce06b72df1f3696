//! Authentication support for Google Cloud.

use hyper::client::connect::HttpConnector;
use hyper_rustls::HttpsConnector;
use std::path::Path;
use tokio::fs;
use yup_oauth2::{
    authenticator::ApplicationDefaultCredentialsTypes,
    ApplicationDefaultCredentialsAuthenticator, ApplicationDefaultCredentialsFlowOpts,
    ServiceAccountAuthenticator,
};

use crate::common::*;

/// The connector type used to create `hyper` connections.
pub(crate) type HyperConnector = HttpsConnector<HttpConnector>;

pub(crate) use yup_oauth2::AccessToken;

pub(crate) type Authenticator =
    yup_oauth2::authenticator::Authenticator<HyperConnector>;

/// Build an authenticator from the service account key at `key_file`.
async fn service_account_authenticator(key_file: &Path) -> Result<Authenticator> {
    let key = yup_oauth2::read_service_account_key(key_file)
        .await
        .with_context(|| {
            format!(
                "could not read service account key {}",
                key_file.display(),
            )
        })?;
    ServiceAccountAuthenticator::builder(key)
        .build()
        .await
        .context("failed to create service account authenticator")
}

/// Build an authenticator for application default credentials. This first
/// looks for a key in the location named by the
/// `$GOOGLE_APPLICATION_CREDENTIALS` env variable. If that is not defined,
/// it will assume we're running on a Google Compute Engine instance, and
/// query its metadata service.
async fn application_default_authenticator() -> Result<Authenticator> {
    let adc_authenticator = ApplicationDefaultCredentialsAuthenticator::builder(
        ApplicationDefaultCredentialsFlowOpts { metadata_url: None },
    );

    match adc_authenticator.await {
        ApplicationDefaultCredentialsTypes::InstanceMetadata(auth) => auth
            .build()
            .await
            .context("failed to create instance metadata authenticator"),
        ApplicationDefaultCredentialsTypes::ServiceAccount(auth) => auth
            .build()
            .await
            .context("failed to create service account authenticator"),
    }
}

/// Create an authenticator using the configured key file if it exists, and
/// ambient credentials otherwise.
///
/// The file check happens on every call, so a key dropped into place (or
/// removed) between invocations takes effect on the next trigger.
#[instrument(level = "trace")]
pub(crate) async fn authenticator(key_file: Option<&Path>) -> Result<Authenticator> {
    match key_file {
        Some(path) if fs::metadata(path).await.is_ok() => {
            info!("using service account key {}", path.display());
            service_account_authenticator(path).await
        }
        Some(path) => {
            debug!(
                "no service account key at {}, using application default credentials",
                path.display(),
            );
            application_default_authenticator().await
        }
        None => {
            debug!("using application default credentials");
            application_default_authenticator().await
        }
    }
}
