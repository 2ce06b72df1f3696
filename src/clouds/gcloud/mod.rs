//! Interfaces to Google Cloud.

pub(crate) mod auth;
pub(crate) mod bigquery;
mod client;

pub(crate) use client::*;
