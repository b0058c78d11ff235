//! Configuration validation.
//!
//! Checks an [`EngineConfig`] before any engine is built, so mis-sizing
//! fails at setup instead of at the first scheduling call. Detects:
//! - Zero-sized grid dimensions or process pools
//! - Probabilities and subcarrier counts outside their range
//! - A history too short to hold every attempt of one block

use crate::config::EngineConfig;
use crate::error::HarqError;

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// A count that must be positive is zero.
    ZeroDimension,
    /// A value outside its valid range.
    OutOfRange,
    /// Two settings that contradict each other.
    Inconsistent,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Validates an engine configuration.
///
/// Checks:
/// 1. Slot symbols, bandwidth, process count, timeout and history length
///    are positive
/// 2. The BLER target lies in (0, 1) and the reference BER in (0, 0.2)
/// 3. Reference subcarriers leave at least one useful subcarrier per RB
/// 4. The history holds every attempt up to the last redundancy version
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_config(config: &EngineConfig) -> ValidationResult {
    let mut errors = Vec::new();

    let counts: [(&str, u64); 5] = [
        ("symbols_per_slot", u64::from(config.symbols_per_slot)),
        ("bandwidth_rbg", u64::from(config.bandwidth_rbg)),
        ("num_harq_processes", u64::from(config.num_harq_processes)),
        ("harq_timeout_slots", u64::from(config.harq_timeout_slots)),
        ("max_history_len", config.max_history_len as u64),
    ];
    for (name, value) in counts {
        if value == 0 {
            errors.push(ValidationError::new(
                ValidationErrorKind::ZeroDimension,
                format!("{name} must be positive"),
            ));
        }
    }

    if !(config.target_bler > 0.0 && config.target_bler < 1.0) {
        errors.push(ValidationError::new(
            ValidationErrorKind::OutOfRange,
            format!("target_bler {} outside (0, 1)", config.target_bler),
        ));
    }
    // The efficiency gap -ln(5 BER) / 1.5 must stay positive.
    if !(config.reference_ber > 0.0 && config.reference_ber < 0.2) {
        errors.push(ValidationError::new(
            ValidationErrorKind::OutOfRange,
            format!("reference_ber {} outside (0, 0.2)", config.reference_ber),
        ));
    }
    if config.ref_subcarriers_per_rb >= 12 {
        errors.push(ValidationError::new(
            ValidationErrorKind::OutOfRange,
            format!(
                "ref_subcarriers_per_rb {} leaves no useful subcarrier",
                config.ref_subcarriers_per_rb
            ),
        ));
    }

    let attempts = usize::from(config.max_retransmissions) + 1;
    if config.max_history_len > 0 && config.max_history_len < attempts {
        errors.push(ValidationError::new(
            ValidationErrorKind::Inconsistent,
            format!(
                "max_history_len {} cannot hold {} attempts (max_retransmissions {})",
                config.max_history_len, attempts, config.max_retransmissions
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Folds validation errors into one configuration error.
pub fn into_harq_error(errors: Vec<ValidationError>) -> HarqError {
    let joined = errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    HarqError::configuration(joined)
}
