//! Retransmission pass indicators.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Scheduled rate | scheduled / pending |
//! | Deferred | items returned for the next slot |
//! | Used symbols | symbols consumed by the pass |
//! | RBG-symbol utilisation | occupied block-symbols / (bandwidth x symbols) |
//! | Max RV | highest redundancy version sent |

use serde::{Deserialize, Serialize};

use super::RetxOutcome;
use crate::models::{SlotAllocation, StreamTx};

/// Indicators of one retransmission pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetxKpi {
    /// Items submitted.
    pub pending: usize,
    /// Items placed in the slot.
    pub scheduled: usize,
    /// Items deferred to the next slot.
    pub deferred: usize,
    /// Fraction of pending items scheduled (1.0 when nothing was pending).
    pub scheduled_rate: f64,
    /// Symbols consumed.
    pub used_symbols: u8,
    /// Occupied fraction of the slot grid (0.0..1.0).
    pub grid_utilization: f64,
    /// Highest redundancy version in the slot.
    pub max_rv: u8,
}

impl RetxKpi {
    /// Computes indicators from a pass outcome and the resulting slot.
    ///
    /// # Arguments
    /// * `outcome` - Result of the pass.
    /// * `slot` - Allocation the pass wrote into.
    /// * `bandwidth_rbg` / `symbols_per_slot` - Grid dimensions.
    pub fn calculate(
        outcome: &RetxOutcome,
        slot: &SlotAllocation,
        bandwidth_rbg: u16,
        symbols_per_slot: u8,
    ) -> Self {
        let scheduled_rate = if outcome.pending == 0 {
            1.0
        } else {
            outcome.scheduled as f64 / outcome.pending as f64
        };
        let max_rv = slot
            .allocations
            .iter()
            .flat_map(|a| a.streams.iter())
            .filter(|s| s.is_scheduled())
            .map(StreamTx::rv)
            .max()
            .unwrap_or(0);

        Self {
            pending: outcome.pending,
            scheduled: outcome.scheduled,
            deferred: outcome.deferred.len(),
            scheduled_rate,
            used_symbols: outcome.used_symbols,
            grid_utilization: slot
                .grid_utilization(bandwidth_rbg, symbols_per_slot)
                .unwrap_or(0.0),
            max_rv,
        }
    }

    /// Whether the pass served at least `min_rate` of its items.
    pub fn meets_threshold(&self, min_rate: f64) -> bool {
        self.scheduled_rate >= min_rate
    }
}
