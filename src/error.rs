//! Error types.
//!
//! Only fatal conditions are errors: malformed setup data and broken
//! runtime invariants. Running out of slot resources is a deferral and
//! never surfaces here.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type HarqResult<T> = Result<T, HarqError>;

/// Fatal errors raised by the engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HarqError {
    /// A scheme index above the technology maximum.
    #[error("invalid scheme {scheme}: maximum is {max}")]
    InvalidScheme { scheme: u8, max: u8 },

    /// A quality index or other bounded quantity outside its range.
    #[error("{quantity} = {value} outside [{min}, {max}]")]
    OutOfRange {
        quantity: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    /// Mis-sized or inconsistent setup.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A curve table row that cannot be interpolated.
    #[error("invalid curve: {0}")]
    InvalidCurve(String),

    /// Internal bookkeeping that no longer holds.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A request the engine deliberately does not handle.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

impl HarqError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        HarqError::Configuration(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        HarqError::InvariantViolation(msg.into())
    }

    pub fn curve(msg: impl Into<String>) -> Self {
        HarqError::InvalidCurve(msg.into())
    }
}
