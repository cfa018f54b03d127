//! Harness error types.

use crate::oracle::Violation;
use semlab_core::ContentError;
use thiserror::Error;

/// Why a scenario stopped early.
#[derive(Debug, Error)]
pub enum SimError {
    /// The lecture page could not be installed
    #[error("Page setup failed: {0}")]
    Setup(#[from] ContentError),

    /// Harness configuration is unusable
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A scenario-specific expectation did not hold
    #[error("Assertion failed: {0}")]
    Assertion(String),

    /// The oracle flagged a broken invariant
    #[error("Invariant violated: {0}")]
    Invariant(Violation),
}

impl SimError {
    pub fn assertion(msg: impl Into<String>) -> Self {
        Self::Assertion(msg.into())
    }
}

/// Fails with an assertion error unless `cond` holds.
pub fn ensure(cond: bool, msg: impl FnOnce() -> String) -> Result<(), SimError> {
    if cond {
        Ok(())
    } else {
        Err(SimError::Assertion(msg()))
    }
}
