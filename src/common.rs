//! Definitions included by all the files in this crate.
//!
//! This forms the dialect of Rust we use throughout, with an emphasis on
//! `anyhow` errors and structured logging.

#[allow(unused_imports)]
pub(crate) use anyhow::{format_err, Context as _, Error, Result};
#[allow(unused_imports)]
pub(crate) use tracing::{debug, error, info, instrument, trace, warn};
#[allow(unused_imports)]
pub(crate) use url::Url;
