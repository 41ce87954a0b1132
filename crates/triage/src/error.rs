//! Typed errors surfaced by the triage core
//!
//! Only two conditions need a distinguishable type: missing configuration
//! (fatal before any scan begins) and a sender header without a parseable
//! address (recovered locally, the field is recorded absent). Everything
//! else travels as `anyhow::Error` with context, matching how the
//! provider and storage adapters report failures.

use thiserror::Error;

/// A required setting is absent; the run is aborted before any scan
#[derive(Debug, Error, PartialEq, Eq)]
#[error("required setting '{key}' is not configured; set it with `jobscan init` and edit settings.json")]
pub struct MissingSettingError {
    pub key: &'static str,
}

/// The From header carried no angle-bracketed address
#[derive(Debug, Error, PartialEq, Eq)]
#[error("no angle-bracketed address in sender header '{0}'")]
pub struct MalformedAddressError(pub String);
