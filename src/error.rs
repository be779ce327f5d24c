//! Error taxonomy, layering `StorageError`
//! into `SimError` in `main.rs`: small leaf `thiserror` enums per subsystem,
//! folded into one top-level enum via `#[from]`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("no file at path \"{path}\" on tier \"{tier}\"")]
    FileNotFound { tier: String, path: String },
    #[error("tier index {0} is out of range")]
    UnknownTier(usize),
    #[error(
        "invariant violated on tier \"{tier}\": used_size={used_size} but content sums to {observed}"
    )]
    SizeMismatch {
        tier: String,
        used_size: u64,
        observed: u64,
    },
    #[error("path \"{0}\" is present on more than one tier")]
    DuplicatePath(String),
}

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("{path}:{line}: malformed record: {reason}")]
    Format {
        path: String,
        line: usize,
        reason: String,
    },
    #[error("trace adapter \"{0}\" is not a known trace format")]
    UnknownAdapter(String),
}

#[derive(Error, Debug)]
pub enum SimError {
    #[error("could not open or read a file: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("error in configuration: {source}")]
    ConfigurationParse {
        #[from]
        source: toml::de::Error,
    },
    #[error("could not serialize configuration: {source}")]
    ConfigurationWrite {
        #[from]
        source: toml::ser::Error,
    },
    #[error("storage invariant or lookup error: {source}")]
    Storage {
        #[from]
        source: StorageError,
    },
    #[error("trace error: {source}")]
    Trace {
        #[from]
        source: TraceError,
    },
    #[error("trace timestamps regressed: was at {previous}, next record is at {got}")]
    TraceOrder { previous: f64, got: f64 },
    #[error("access to unknown path \"{path}\" with no prior create (strict trace mode)")]
    UnknownPathOnAccess { path: String },
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    #[error("migrate() called with an invalid cause")]
    UnknownOperationCause,
    #[error("unknown policy \"{0}\"")]
    UnknownPolicy(String),
    #[error("{0}")]
    Generic(String),
}
