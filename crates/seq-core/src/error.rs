//! Error taxonomy.
//!
//! Split in two, matching distilled spec §7: `EngineError` aborts the run
//! (missing/malformed inputs, an invalid sequence document, a dataset
//! referenced but never loaded); `StepError` is captured into a
//! [`crate::result::StepOutcome`] and execution continues.

use crate::value::Value;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("input not found: {0}")]
    InputNotFound(PathBuf),

    #[error("input malformed ({path}): {source}")]
    InputMalformed { path: PathBuf, source: String },

    #[error("sequence spec invalid: {0}")]
    SpecInvalid(String),
}

/// Per-step failure. Recorded into the result list; never aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("transport error (status {status:?}): {body}")]
    Transport { status: Option<u16>, body: Value },

    #[error("graphql error: {errors}")]
    GraphQl { errors: Value },

    #[error("{0}")]
    SpecInvalid(String),
}
