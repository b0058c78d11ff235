//! Downlink retransmission scheduler.
//!
//! # Algorithm
//!
//! 1. `symbols_per_beam = available / beams with pending work`.
//! 2. Order each beam's items with the configured policy.
//! 3. For each item: defer if its connection already got an allocation in
//!    this slot; otherwise keep the previous block-symbol area at the new
//!    symbol budget, `need = ceil(old_rbg * old_symbols / symbols_per_beam)`,
//!    and defer if `need` exceeds the blocks left at the frequency cursor.
//! 4. On commit, NACKed streams keep scheme and size with the next RV and
//!    the new-data flag cleared; ACKed streams are not transmitted. The
//!    block range `[cursor.rbg, cursor.rbg + need)` is taken and the
//!    frequency cursor advances.
//! 5. After a beam with at least one allocation the time cursor moves by
//!    `symbols_per_beam` and the frequency cursor returns to 0.
//!
//! # Complexity
//! O(n log n) per beam for the ordering, O(n) for packing.

use log::{debug, info};
use std::collections::HashSet;
use std::sync::Arc;

use super::active::{pending_count, PendingByBeam};
use super::ordering::{order_pending, LargestFirst, RetxOrdering};
use super::{pending_process, rematch_deferred, RetxOutcome};
use crate::error::{HarqError, HarqResult};
use crate::harq::HarqProcessTable;
use crate::models::{
    ConnectionId, Direction, FeedbackRecord, FtPoint, ProcessId, SlotAllocation, StreamTx,
    TransportBlockDescriptor,
};

/// Beam-partitioned, time x frequency retransmission packer.
///
/// # Example
///
/// ```
/// use std::collections::BTreeMap;
/// use u_harq::harq::HarqProcessTable;
/// use u_harq::models::{Direction, FeedbackRecord, FtPoint, SlotAllocation, StreamTx, TransportBlockDescriptor};
/// use u_harq::scheduler::DlRetxScheduler;
///
/// let mut table = HarqProcessTable::new(Direction::Downlink, 16);
/// table.start_transmission(
///     TransportBlockDescriptor::new(1, 0, Direction::Downlink)
///         .with_symbols(0, 2)
///         .with_rbg_range(4, 0, 2)
///         .with_stream(StreamTx::new_data(10, 300)),
/// ).unwrap();
/// let pending = table.process_feedback(vec![FeedbackRecord::nack(1, 0)], 3).unwrap().pending;
///
/// let mut by_beam = BTreeMap::new();
/// by_beam.insert(0, pending);
/// let mut cursor = FtPoint::new(0, 0);
/// let mut slot = SlotAllocation::new();
/// let outcome = DlRetxScheduler::new(4, 14)
///     .schedule(&mut cursor, 2, by_beam, &mut table, &mut slot)
///     .unwrap();
/// assert_eq!(outcome.scheduled, 1);
/// assert_eq!(slot.allocations[0].rbg_count(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct DlRetxScheduler {
    bandwidth_rbg: u16,
    symbols_per_slot: u8,
    ordering: Arc<dyn RetxOrdering>,
}

impl DlRetxScheduler {
    /// Creates a scheduler for a grid of `bandwidth_rbg` blocks by
    /// `symbols_per_slot` symbols, ordering by largest previous allocation.
    pub fn new(bandwidth_rbg: u16, symbols_per_slot: u8) -> Self {
        Self {
            bandwidth_rbg,
            symbols_per_slot,
            ordering: Arc::new(LargestFirst),
        }
    }

    /// Sets the ordering policy.
    pub fn with_ordering(mut self, ordering: Arc<dyn RetxOrdering>) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn ordering(&self) -> &dyn RetxOrdering {
        self.ordering.as_ref()
    }

    /// Schedules pending downlink retransmissions into `slot`.
    ///
    /// `cursor` is the first free point of the slot and is advanced past
    /// the symbols consumed. Committed processes move to
    /// `WaitingFeedback`; deferred ones keep their pending state.
    pub fn schedule(
        &self,
        cursor: &mut FtPoint,
        available_symbols: u8,
        pending: PendingByBeam,
        table: &mut HarqProcessTable,
        slot: &mut SlotAllocation,
    ) -> HarqResult<RetxOutcome> {
        let total = pending_count(&pending);
        let mut outcome = RetxOutcome {
            pending: total,
            ..RetxOutcome::default()
        };
        if total == 0 {
            return Ok(outcome);
        }
        self.check_cursor(cursor, available_symbols)?;

        let beam_count = pending.values().filter(|items| !items.is_empty()).count();
        if beam_count == 0 {
            return Err(HarqError::configuration("pending work without a beam group"));
        }
        let symbols_per_beam = (usize::from(available_symbols) / beam_count) as u8;
        info!(
            "DL retx: {total} pending over {beam_count} beam(s), {symbols_per_beam} symbol(s) per beam"
        );

        let mut deferred_keys: Vec<(ConnectionId, ProcessId)> = Vec::new();
        let mut submitted: Vec<FeedbackRecord> = Vec::with_capacity(total);
        let mut served: HashSet<ConnectionId> = HashSet::new();

        for (beam, mut items) in pending {
            if items.is_empty() {
                continue;
            }
            order_pending(&mut items, table, self.ordering.as_ref());

            let mut beam_used = false;
            for item in &items {
                let key = (item.connection, item.process);
                if symbols_per_beam == 0 || served.contains(&item.connection) {
                    deferred_keys.push(key);
                    continue;
                }

                let (handle, process, last) = pending_process(table, item)?;
                let area = last.rbg_symbols();
                if area == 0 {
                    return Err(HarqError::invariant(format!(
                        "DL {item}: previous transmission occupies no blocks"
                    )));
                }
                let need = area.div_ceil(u32::from(symbols_per_beam));
                let free = u32::from(self.bandwidth_rbg.saturating_sub(cursor.rbg));
                if need > free {
                    debug!("DL {item}: needs {need} RBG, {free} left in beam {beam}, deferred");
                    deferred_keys.push(key);
                    continue;
                }
                let need = need as u16;

                let streams = last
                    .streams
                    .iter()
                    .enumerate()
                    .map(|(i, s)| {
                        if process.is_stream_nacked(i as u8) {
                            s.retransmission()
                        } else {
                            StreamTx::NotScheduled
                        }
                    })
                    .collect::<Vec<_>>();
                let tb = TransportBlockDescriptor::new(item.connection, item.process, Direction::Downlink)
                    .with_symbols(cursor.symbol, symbols_per_beam)
                    .with_rbg_range(self.bandwidth_rbg, cursor.rbg, need);
                let tb = TransportBlockDescriptor { streams, ..tb };

                debug!(
                    "DL retx {item}: beam {beam}, sym [{}, {}), RBG [{}, {}), rv {}",
                    tb.symbol_start,
                    tb.symbol_end(),
                    cursor.rbg,
                    cursor.rbg + need,
                    tb.streams.iter().map(StreamTx::rv).max().unwrap_or(0)
                );
                table.mark_retransmitted(handle, tb.clone())?;
                slot.push_back(tb);
                cursor.rbg += need;
                served.insert(item.connection);
                beam_used = true;
                outcome.scheduled += 1;
            }

            if beam_used {
                cursor.symbol += symbols_per_beam;
                cursor.rbg = 0;
                outcome.used_symbols += symbols_per_beam;
            }
            submitted.extend(items);
        }

        outcome.deferred = rematch_deferred(&deferred_keys, &submitted)?;
        slot.used_symbols = slot.used_symbols.saturating_add(outcome.used_symbols);
        info!(
            "DL retx: {} scheduled, {} deferred, {} symbol(s) used",
            outcome.scheduled,
            outcome.deferred.len(),
            outcome.used_symbols
        );
        Ok(outcome)
    }

    fn check_cursor(&self, cursor: &FtPoint, available_symbols: u8) -> HarqResult<()> {
        let end = u16::from(cursor.symbol) + u16::from(available_symbols);
        if end > u16::from(self.symbols_per_slot) {
            return Err(HarqError::invariant(format!(
                "DL cursor at symbol {} with {} available overruns {} symbols",
                cursor.symbol, available_symbols, self.symbols_per_slot
            )));
        }
        if cursor.rbg > self.bandwidth_rbg {
            return Err(HarqError::invariant(format!(
                "DL cursor at RBG {} beyond bandwidth {}",
                cursor.rbg, self.bandwidth_rbg
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BeamId, HarqStatus};
    use crate::scheduler::ordering::Fifo;
    use std::collections::BTreeMap;

    const BW: u16 = 4;

    fn send(table: &mut HarqProcessTable, conn: ConnectionId, rbg: u16, symbols: u8) {
        table
            .start_transmission(
                TransportBlockDescriptor::new(conn, 0, Direction::Downlink)
                    .with_symbols(0, symbols)
                    .with_rbg_range(BW, 0, rbg)
                    .with_stream(StreamTx::new_data(10, 200)),
            )
            .unwrap();
    }

    fn nack_all(table: &mut HarqProcessTable, conns: &[ConnectionId]) -> Vec<FeedbackRecord> {
        let fb = conns.iter().map(|&c| FeedbackRecord::nack(c, 0)).collect();
        table.process_feedback(fb, 3).unwrap().pending
    }

    fn one_beam(items: Vec<FeedbackRecord>) -> PendingByBeam {
        let mut map: BTreeMap<BeamId, Vec<FeedbackRecord>> = BTreeMap::new();
        map.insert(0, items);
        map
    }

    #[test]
    fn test_three_connections_one_beam() {
        let mut table = HarqProcessTable::new(Direction::Downlink, 16);
        for conn in 1..=3 {
            send(&mut table, conn, 2, 2);
        }
        let pending = nack_all(&mut table, &[1, 2, 3]);
        let mut cursor = FtPoint::new(0, 0);
        let mut slot = SlotAllocation::new();

        let outcome = DlRetxScheduler::new(BW, 14)
            .schedule(&mut cursor, 2, one_beam(pending), &mut table, &mut slot)
            .unwrap();

        assert_eq!(outcome.scheduled, 2);
        assert_eq!(outcome.deferred, vec![FeedbackRecord::nack(3, 0)]);
        assert!(outcome.is_balanced());
        assert_eq!(outcome.used_symbols, 2);
        assert_eq!(slot.used_symbols, 2);
        assert_eq!(slot.occupied_rbg_symbols(), 8);
        assert!(slot.first_overlap().is_none());
        assert_eq!(slot.allocations[0].rbg_mask, vec![true, true, false, false]);
        assert_eq!(slot.allocations[1].rbg_mask, vec![false, false, true, true]);
        assert_eq!(cursor, FtPoint::new(2, 0));

        assert_eq!(table.process(1, 0).unwrap().status, HarqStatus::WaitingFeedback);
        assert_eq!(table.process(3, 0).unwrap().status, HarqStatus::ReceivedFeedback);
    }

    #[test]
    fn test_each_beam_gets_its_share() {
        let mut table = HarqProcessTable::new(Direction::Downlink, 16);
        let mut pending = PendingByBeam::new();
        for conn in 1..=3u16 {
            send(&mut table, conn, 1, 4);
            pending.insert(u32::from(conn) * 10, nack_all(&mut table, &[conn]));
        }
        let mut cursor = FtPoint::new(2, 0);
        let mut slot = SlotAllocation::new();

        let outcome = DlRetxScheduler::new(BW, 14)
            .schedule(&mut cursor, 12, pending, &mut table, &mut slot)
            .unwrap();

        assert_eq!(outcome.scheduled, 3);
        assert!(outcome.deferred.is_empty());
        assert_eq!(outcome.used_symbols, 12);
        let starts: Vec<u8> = slot.allocations.iter().map(|a| a.symbol_start).collect();
        assert_eq!(starts, vec![2, 6, 10]);
        // 1 RBG x 4 symbols at 4 symbols per beam keeps 1 RBG.
        assert!(slot.allocations.iter().all(|a| a.rbg_count() == 1 && a.symbol_count == 4));
        assert_eq!(cursor.symbol, 14);
    }

    #[test]
    fn test_shrinking_budget_widens_allocation() {
        let mut table = HarqProcessTable::new(Direction::Downlink, 16);
        send(&mut table, 1, 1, 3);
        let pending = nack_all(&mut table, &[1]);
        let mut cursor = FtPoint::default();
        let mut slot = SlotAllocation::new();
        DlRetxScheduler::new(BW, 14)
            .schedule(&mut cursor, 2, one_beam(pending), &mut table, &mut slot)
            .unwrap();
        // ceil(1 * 3 / 2) = 2 blocks.
        assert_eq!(slot.allocations[0].rbg_count(), 2);
    }

    #[test]
    fn test_largest_first_ordering() {
        // Conn 2 spans 4 symbols, conn 1 only 2.
        let mut table = HarqProcessTable::new(Direction::Downlink, 16);
        send(&mut table, 1, 1, 2);
        send(&mut table, 2, 2, 4);
        let pending = nack_all(&mut table, &[1, 2]);
        let mut slot = SlotAllocation::new();
        let outcome = DlRetxScheduler::new(BW, 14)
            .schedule(&mut FtPoint::default(), 2, one_beam(pending), &mut table, &mut slot)
            .unwrap();
        assert_eq!(slot.allocations[0].connection, 2);
        assert_eq!(outcome.deferred, vec![FeedbackRecord::nack(1, 0)]);

        // FIFO serves the small block first; the large one no longer fits.
        let mut table = HarqProcessTable::new(Direction::Downlink, 16);
        send(&mut table, 1, 1, 2);
        send(&mut table, 2, 2, 4);
        let pending = nack_all(&mut table, &[1, 2]);
        let mut slot = SlotAllocation::new();
        let outcome = DlRetxScheduler::new(BW, 14)
            .with_ordering(Arc::new(Fifo))
            .schedule(&mut FtPoint::default(), 2, one_beam(pending), &mut table, &mut slot)
            .unwrap();
        assert_eq!(slot.allocations[0].connection, 1);
        assert_eq!(outcome.deferred, vec![FeedbackRecord::nack(2, 0)]);
    }

    #[test]
    fn test_one_allocation_per_connection_per_beam() {
        let mut table = HarqProcessTable::new(Direction::Downlink, 16);
        for pid in 0..2 {
            table
                .start_transmission(
                    TransportBlockDescriptor::new(5, pid, Direction::Downlink)
                        .with_symbols(0, 2)
                        .with_rbg_range(BW, 0, 1)
                        .with_stream(StreamTx::new_data(3, 40)),
                )
                .unwrap();
        }
        let pending = table
            .process_feedback(vec![FeedbackRecord::nack(5, 0), FeedbackRecord::nack(5, 1)], 3)
            .unwrap()
            .pending;
        let mut slot = SlotAllocation::new();
        let outcome = DlRetxScheduler::new(BW, 14)
            .schedule(&mut FtPoint::default(), 2, one_beam(pending), &mut table, &mut slot)
            .unwrap();
        assert_eq!(outcome.scheduled, 1);
        assert_eq!(outcome.deferred, vec![FeedbackRecord::nack(5, 1)]);
    }

    #[test]
    fn test_one_allocation_per_connection_across_beams() {
        let mut table = HarqProcessTable::new(Direction::Downlink, 16);
        for pid in 0..2 {
            table
                .start_transmission(
                    TransportBlockDescriptor::new(5, pid, Direction::Downlink)
                        .with_symbols(0, 2)
                        .with_rbg_range(BW, 0, 1)
                        .with_stream(StreamTx::new_data(3, 40)),
                )
                .unwrap();
        }
        let mut pending = PendingByBeam::new();
        for (beam, pid) in [(0, 0), (1, 1)] {
            let fb = vec![FeedbackRecord::nack(5, pid)];
            pending.insert(beam, table.process_feedback(fb, 3).unwrap().pending);
        }
        let mut slot = SlotAllocation::new();
        let outcome = DlRetxScheduler::new(BW, 14)
            .schedule(&mut FtPoint::default(), 4, pending, &mut table, &mut slot)
            .unwrap();
        assert_eq!(outcome.scheduled, 1);
        assert_eq!(outcome.deferred, vec![FeedbackRecord::nack(5, 1)]);
        assert_eq!(slot.allocations.len(), 1);
        assert_eq!(outcome.used_symbols, 2);
    }

    #[test]
    fn test_more_beams_than_symbols() {
        let mut table = HarqProcessTable::new(Direction::Downlink, 16);
        let mut pending = PendingByBeam::new();
        for conn in 1..=256u16 {
            send(&mut table, conn, 1, 1);
            pending.insert(u32::from(conn), nack_all(&mut table, &[conn]));
        }
        let mut slot = SlotAllocation::new();
        let outcome = DlRetxScheduler::new(BW, 14)
            .schedule(&mut FtPoint::default(), 14, pending, &mut table, &mut slot)
            .unwrap();
        assert_eq!(outcome.pending, 256);
        assert_eq!(outcome.scheduled, 0);
        assert_eq!(outcome.deferred.len(), 256);
        assert!(outcome.is_balanced());
        assert!(slot.is_empty());
    }

    #[test]
    fn test_acked_streams_not_transmitted() {
        let mut table = HarqProcessTable::new(Direction::Downlink, 16);
        table
            .start_transmission(
                TransportBlockDescriptor::new(1, 0, Direction::Downlink)
                    .with_symbols(0, 2)
                    .with_rbg_range(BW, 0, 2)
                    .with_stream(StreamTx::new_data(12, 400))
                    .with_stream(StreamTx::new_data(9, 250)),
            )
            .unwrap();
        let pending = table
            .process_feedback(vec![FeedbackRecord::new(1, 0, vec![true, false])], 3)
            .unwrap()
            .pending;
        let mut slot = SlotAllocation::new();
        DlRetxScheduler::new(BW, 14)
            .schedule(&mut FtPoint::default(), 2, one_beam(pending), &mut table, &mut slot)
            .unwrap();
        let streams = &slot.allocations[0].streams;
        assert_eq!(streams[0], StreamTx::NotScheduled);
        assert_eq!(
            streams[1],
            StreamTx::Scheduled {
                scheme: 9,
                size_bytes: 250,
                rv: 1,
                new_data: false
            }
        );
    }

    #[test]
    fn test_no_symbols_defers_everything() {
        let mut table = HarqProcessTable::new(Direction::Downlink, 16);
        send(&mut table, 1, 1, 1);
        send(&mut table, 2, 1, 1);
        let mut pending = PendingByBeam::new();
        pending.insert(0, nack_all(&mut table, &[1]));
        pending.insert(1, nack_all(&mut table, &[2]));
        let mut slot = SlotAllocation::new();
        let outcome = DlRetxScheduler::new(BW, 14)
            .schedule(&mut FtPoint::default(), 1, pending, &mut table, &mut slot)
            .unwrap();
        assert_eq!(outcome.scheduled, 0);
        assert_eq!(outcome.deferred.len(), 2);
        assert!(slot.is_empty());
    }

    #[test]
    fn test_cursor_overrun() {
        let mut table = HarqProcessTable::new(Direction::Downlink, 16);
        send(&mut table, 1, 1, 1);
        let pending = nack_all(&mut table, &[1]);
        let err = DlRetxScheduler::new(BW, 14)
            .schedule(
                &mut FtPoint::new(12, 0),
                4,
                one_beam(pending),
                &mut table,
                &mut SlotAllocation::new(),
            )
            .unwrap_err();
        assert!(matches!(err, HarqError::InvariantViolation(_)));
    }

    #[test]
    fn test_unknown_process_is_invariant_violation() {
        let mut table = HarqProcessTable::new(Direction::Downlink, 16);
        let err = DlRetxScheduler::new(BW, 14)
            .schedule(
                &mut FtPoint::default(),
                2,
                one_beam(vec![FeedbackRecord::nack(8, 0)]),
                &mut table,
                &mut SlotAllocation::new(),
            )
            .unwrap_err();
        assert!(matches!(err, HarqError::InvariantViolation(_)));
    }

    #[test]
    fn test_empty_pending() {
        let mut table = HarqProcessTable::new(Direction::Downlink, 16);
        let outcome = DlRetxScheduler::new(BW, 14)
            .schedule(
                &mut FtPoint::default(),
                14,
                PendingByBeam::new(),
                &mut table,
                &mut SlotAllocation::new(),
            )
            .unwrap();
        assert_eq!(outcome, RetxOutcome::default());
    }
}
