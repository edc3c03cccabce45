//! Error types for the unnesting engine
//!
//! Only two things can go wrong in the core: a single source unit cannot be
//! turned into a document tree, or the run as a whole has nothing to work on.
//! Missing fields are never errors.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to turn one source unit into a document tree
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse JSON: {0}")]
    Parse(#[from] simd_json::Error),

    #[error("document root is not an object")]
    NotAnObject,

    #[error("duplicate match id {0}")]
    DuplicateMatchId(String),
}

/// Run-level failures
#[derive(Error, Debug)]
pub enum UnnestError {
    /// The input set is empty
    #[error("no source units to process")]
    NoInput,

    /// Every unit failed to read or parse
    #[error("none of the {failed} source units could be read")]
    NoReadableInput { failed: usize },

    /// Nothing was read, and at least one batch found the source unavailable
    #[error("input unavailable: {failed_batches} batches could not start and {failed_units} units failed to read")]
    InputUnavailable {
        failed_batches: usize,
        failed_units: usize,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The input location could not be listed at all
    #[error("input source unavailable at {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
