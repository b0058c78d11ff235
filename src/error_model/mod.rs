//! Transport block error model.
//!
//! Turns the SINR of a decode attempt into a block error rate, combining
//! soft information from earlier attempts of the same block.
//!
//! # Combining
//!
//! For a retransmission whose SINR differs from the last recorded one,
//! the BLERs of both SINRs are looked up on the curve of the current
//! attempt and averaged with weight proportional to SINR (the stronger
//! attempt counts `max/min` times as much as the weaker one). The
//! combined BLER is mapped back to an effective SINR by inverse lookup.
//! When both attempts saturate at BLER 1 the stronger SINR is kept as
//! the effective one.
//!
//! # Reference
//! Mezzavilla et al. (2012), "A Lightweight and Accurate Link Abstraction
//! Model for the Simulation of LTE Networks in ns-3"

mod curve;

pub use curve::{CurveRow, CurveTable, REFERENCE_DEPTH, REFERENCE_SCHEMES};

use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

use crate::error::HarqResult;
use crate::models::Scheme;

/// Result of evaluating one decode attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorModelOutput {
    /// Probability that the block fails to decode.
    pub bler: f64,
    /// Linear SINR equivalent to all attempts so far.
    pub effective_sinr: f64,
}

impl ErrorModelOutput {
    pub fn new(bler: f64, effective_sinr: f64) -> Self {
        Self {
            bler,
            effective_sinr,
        }
    }
}

/// A BLER model usable by link adaptation and the decoder.
pub trait ErrorModel: Send + Sync + Debug {
    /// Highest scheme the model covers.
    fn max_scheme(&self) -> Scheme;

    /// BLER of a single attempt at a linear SINR.
    fn lookup(&self, scheme: Scheme, attempt: usize, sinr: f64) -> HarqResult<f64>;

    /// Evaluates the next attempt given the recorded history of the block.
    ///
    /// The attempt index is the history length.
    fn combine(
        &self,
        scheme: Scheme,
        history: &[ErrorModelOutput],
        sinr: f64,
    ) -> HarqResult<ErrorModelOutput>;
}

/// Curve-table error model.
#[derive(Debug, Clone)]
pub struct CurveErrorModel {
    table: Arc<CurveTable>,
}

impl CurveErrorModel {
    /// Creates a model over a shared table.
    pub fn new(table: Arc<CurveTable>) -> Self {
        Self { table }
    }

    /// The underlying table.
    pub fn table(&self) -> &CurveTable {
        &self.table
    }

    /// Linear SINR reaching `bler` on the given curve.
    pub fn inverse_lookup(&self, scheme: Scheme, attempt: usize, bler: f64) -> HarqResult<f64> {
        self.table.inverse_lookup(scheme, attempt, bler)
    }
}

impl ErrorModel for CurveErrorModel {
    fn max_scheme(&self) -> Scheme {
        self.table.max_scheme()
    }

    fn lookup(&self, scheme: Scheme, attempt: usize, sinr: f64) -> HarqResult<f64> {
        self.table.lookup(scheme, attempt, sinr)
    }

    fn combine(
        &self,
        scheme: Scheme,
        history: &[ErrorModelOutput],
        sinr: f64,
    ) -> HarqResult<ErrorModelOutput> {
        let attempt = history.len();
        let previous = match history.last() {
            Some(last) if last.effective_sinr != sinr => last.effective_sinr,
            _ => {
                let bler = self.table.lookup(scheme, attempt, sinr)?;
                return Ok(ErrorModelOutput::new(bler, sinr));
            }
        };

        let prev_bler = self.table.lookup(scheme, attempt, previous)?;
        let new_bler = self.table.lookup(scheme, attempt, sinr)?;
        let strongest = previous.max(sinr);

        if prev_bler == 1.0 && new_bler == 1.0 {
            return Ok(ErrorModelOutput::new(1.0, strongest));
        }

        let weakest = previous.min(sinr);
        let (weak_bler, strong_bler) = if sinr > previous {
            (prev_bler, new_bler)
        } else {
            (new_bler, prev_bler)
        };
        let bler = if weakest > 0.0 {
            let ratio = strongest / weakest;
            (weak_bler + strong_bler * ratio) / (1.0 + ratio)
        } else {
            strong_bler
        };
        let effective_sinr = self.table.inverse_lookup(scheme, attempt, bler)?;
        debug!(
            "combine scheme {scheme} attempt {attempt}: prev {prev_bler:.4} new {new_bler:.4} -> {bler:.4}"
        );
        Ok(ErrorModelOutput::new(bler, effective_sinr))
    }
}
