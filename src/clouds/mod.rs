//! Interfaces to cloud services.

pub(crate) mod gcloud;
