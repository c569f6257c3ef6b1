
//! Error type shared by the likelihood-ratio engine.
//!
//! An interrupted computation is reported through its own variant so callers can mark a search
//! as aborted rather than failed.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MixRankError {
    /// Computation was cancelled through an interrupt handle.
    #[error("Computation was interrupted")]
    Interrupted,

    /// Hypotheses or analysis parameters are inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Dropout could not be estimated from the evidence.
    #[error("Dropout estimation failed: {0}")]
    DropoutEstimation(String),
}

pub type Result<T> = std::result::Result<T, MixRankError>;
