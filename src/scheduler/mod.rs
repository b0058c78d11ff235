//! HARQ retransmission schedulers and slot KPIs.
//!
//! Runs once per slot, before new data is scheduled. Every pending
//! retransmission is either placed in the slot or returned on the
//! deferred list; the caller resubmits deferred items next slot.
//!
//! # Algorithm
//!
//! - **Downlink** ([`DlRetxScheduler`]): the available symbols are split
//!   evenly across the beams with pending work. Inside a beam, items are
//!   ordered by a [`RetxOrdering`] policy and packed side by side in
//!   frequency, each keeping its previous block-symbol area.
//! - **Uplink** ([`UlRetxScheduler`]): one transmitter owns the whole
//!   bandwidth per symbol range; retransmissions keep their previous symbol
//!   count and are stacked in front of the new-data region.
//!
//! # KPI
//!
//! [`RetxKpi`] summarises one pass: scheduled and deferred items, symbols
//! consumed and grid utilisation.

mod active;
mod downlink;
mod kpi;
mod ordering;
mod uplink;

pub use active::{group_by_beam, pending_count, BeamGroupProvider, PendingByBeam};
pub use downlink::DlRetxScheduler;
pub use kpi::RetxKpi;
pub use ordering::{
    order_pending, Fifo, LargestFirst, OrderScore, RetxOrdering, RetxOrderingKind, SmallestFirst,
};
pub use uplink::UlRetxScheduler;

use crate::error::{HarqError, HarqResult};
use crate::harq::{HarqHandle, HarqProcessTable};
use crate::models::{
    ConnectionId, FeedbackRecord, HarqProcess, HarqStatus, ProcessId, TransportBlockDescriptor,
};

/// Result of one retransmission pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetxOutcome {
    /// Items submitted to the pass.
    pub pending: usize,
    /// Items placed in the slot.
    pub scheduled: usize,
    /// Symbols consumed by the pass.
    pub used_symbols: u8,
    /// Items to resubmit next slot, as originally received.
    pub deferred: Vec<FeedbackRecord>,
}

impl RetxOutcome {
    /// Whether every submitted item is accounted for.
    pub fn is_balanced(&self) -> bool {
        self.scheduled + self.deferred.len() == self.pending
    }
}

/// Looks up the process awaiting retransmission for a pending item.
fn pending_process<'a>(
    table: &'a HarqProcessTable,
    item: &FeedbackRecord,
) -> HarqResult<(HarqHandle, &'a HarqProcess, &'a TransportBlockDescriptor)> {
    let handle = table.handle(item.connection, item.process).ok_or_else(|| {
        HarqError::invariant(format!("{} {item}: no HARQ process", table.direction()))
    })?;
    let process = table
        .get(handle)
        .ok_or_else(|| HarqError::invariant(format!("{item}: dangling handle")))?;
    if process.status != HarqStatus::ReceivedFeedback {
        return Err(HarqError::invariant(format!(
            "{} {item}: process is {:?}, not awaiting retransmission",
            table.direction(),
            process.status
        )));
    }
    let last = process.last_tx.as_ref().ok_or_else(|| {
        HarqError::invariant(format!("{item}: no previous transmission recorded"))
    })?;
    Ok((handle, process, last))
}

/// Matches deferred (connection, process) pairs back to the feedback they
/// came from.
fn rematch_deferred(
    keys: &[(ConnectionId, ProcessId)],
    items: &[FeedbackRecord],
) -> HarqResult<Vec<FeedbackRecord>> {
    keys.iter()
        .map(|&(conn, pid)| {
            items
                .iter()
                .find(|r| r.matches(conn, pid))
                .cloned()
                .ok_or_else(|| {
                    HarqError::invariant(format!("deferred conn {conn} pid {pid} has no feedback"))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rematch_deferred() {
        let items = vec![FeedbackRecord::nack(1, 0), FeedbackRecord::nack(2, 3)];
        let back = rematch_deferred(&[(2, 3)], &items).unwrap();
        assert_eq!(back, vec![FeedbackRecord::nack(2, 3)]);
        assert!(matches!(
            rematch_deferred(&[(2, 0)], &items),
            Err(HarqError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_outcome_balance() {
        let outcome = RetxOutcome {
            pending: 3,
            scheduled: 2,
            used_symbols: 2,
            deferred: vec![FeedbackRecord::nack(3, 0)],
        };
        assert!(outcome.is_balanced());
        assert!(RetxOutcome::default().is_balanced());
    }
}
