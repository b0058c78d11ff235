//! Uplink retransmission scheduler.
//!
//! # Algorithm
//!
//! The frequency plane is not shared: a retransmission takes the whole
//! previous block mask for its previous symbol count. The cursor points at
//! the start of the region already reserved for new data; each committed
//! retransmission is placed immediately before it and the cursor moves
//! back by the symbols used.
//!
//! 1. Walk pending items in order.
//! 2. If the previous symbol count fits the remaining budget, commit with
//!    scheme, size and mask unchanged, next RV and new-data cleared.
//! 3. Otherwise defer; later, smaller items may still fit.
//!
//! Only single-stream uplink retransmissions are handled.

use log::{debug, info};
use std::collections::HashSet;

use super::{pending_process, rematch_deferred, RetxOutcome};
use crate::error::{HarqError, HarqResult};
use crate::harq::HarqProcessTable;
use crate::models::{
    ConnectionId, FeedbackRecord, FtPoint, ProcessId, SlotAllocation, StreamTx,
    TransportBlockDescriptor,
};

/// Time-only retransmission packer.
#[derive(Debug, Clone, Copy)]
pub struct UlRetxScheduler {
    symbols_per_slot: u8,
}

impl UlRetxScheduler {
    pub fn new(symbols_per_slot: u8) -> Self {
        Self { symbols_per_slot }
    }

    /// Schedules pending uplink retransmissions into `slot`.
    ///
    /// `cursor.symbol` is the first symbol of the new-data region and at
    /// least `available_symbols` symbols must lie before it. Committed
    /// transmissions are prepended to `slot`.
    pub fn schedule(
        &self,
        cursor: &mut FtPoint,
        available_symbols: u8,
        pending: Vec<FeedbackRecord>,
        table: &mut HarqProcessTable,
        slot: &mut SlotAllocation,
    ) -> HarqResult<RetxOutcome> {
        let mut outcome = RetxOutcome {
            pending: pending.len(),
            ..RetxOutcome::default()
        };
        if pending.is_empty() {
            return Ok(outcome);
        }
        if cursor.symbol > self.symbols_per_slot || available_symbols > cursor.symbol {
            return Err(HarqError::invariant(format!(
                "UL cursor at symbol {} cannot hold {} symbols before it in a {}-symbol slot",
                cursor.symbol, available_symbols, self.symbols_per_slot
            )));
        }

        let mut remaining = available_symbols;
        let mut deferred_keys: Vec<(ConnectionId, ProcessId)> = Vec::new();
        let mut served: HashSet<ConnectionId> = HashSet::new();

        for item in &pending {
            let (handle, _, last) = pending_process(table, item)?;
            if last.streams.len() > 1 {
                return Err(HarqError::Unsupported("multi-stream uplink retransmission"));
            }
            let symbols = last.symbol_count;
            if symbols == 0 {
                return Err(HarqError::invariant(format!(
                    "UL {item}: previous transmission occupies no symbols"
                )));
            }
            if symbols > remaining || served.contains(&item.connection) {
                debug!("UL {item}: needs {symbols} symbol(s), {remaining} left, deferred");
                deferred_keys.push((item.connection, item.process));
                continue;
            }

            let tb = TransportBlockDescriptor {
                symbol_start: cursor.symbol - symbols,
                streams: last.streams.iter().map(|s| s.retransmission()).collect(),
                ..last.clone()
            };
            debug!(
                "UL retx {item}: sym [{}, {}), {} RBG, rv {}",
                tb.symbol_start,
                tb.symbol_end(),
                tb.rbg_count(),
                tb.streams.iter().map(StreamTx::rv).max().unwrap_or(0)
            );
            table.mark_retransmitted(handle, tb.clone())?;
            slot.push_front(tb);
            cursor.symbol -= symbols;
            remaining -= symbols;
            served.insert(item.connection);
            outcome.scheduled += 1;
            outcome.used_symbols += symbols;
        }

        outcome.deferred = rematch_deferred(&deferred_keys, &pending)?;
        slot.used_symbols = slot.used_symbols.saturating_add(outcome.used_symbols);
        info!(
            "UL retx: {} scheduled, {} deferred, {} symbol(s) used",
            outcome.scheduled,
            outcome.deferred.len(),
            outcome.used_symbols
        );
        Ok(outcome)
    }
}
