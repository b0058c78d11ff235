//! Per-slot orchestration.
//!
//! [`LinkEngine`] owns everything one cell needs across slots: the
//! configuration, the shared curve table, link adaptation, the HARQ
//! history and one process table per direction. The external driver calls
//! it once per slot, in this order:
//!
//! 1. [`start_slot`](LinkEngine::start_slot): advance timers, abandon
//!    processes that waited too long.
//! 2. [`process_feedback`](LinkEngine::process_feedback): apply decoder
//!    ACK/NACKs; NACKs become pending retransmissions.
//! 3. [`schedule_dl_retransmissions`](LinkEngine::schedule_dl_retransmissions)
//!    / [`schedule_ul_retransmissions`](LinkEngine::schedule_ul_retransmissions):
//!    place retransmissions, collect deferred items for the next slot.
//! 4. New data: [`compute_mcs_from_quality`](LinkEngine::compute_mcs_from_quality),
//!    [`compute_tb_size`](LinkEngine::compute_tb_size),
//!    [`begin_new_transmission`](LinkEngine::begin_new_transmission).
//!
//! On the receiving side, [`decode`](LinkEngine::decode) evaluates an
//! attempt against its history and records the outcome.

use log::{debug, info, warn};
use rand::Rng;
use std::sync::Arc;

use crate::amc::{Amc, McsSelection, PayloadSizeTable, SpectralPayloadTable};
use crate::config::EngineConfig;
use crate::error::HarqResult;
use crate::error_model::{CurveErrorModel, CurveTable, ErrorModel, ErrorModelOutput};
use crate::harq::{FeedbackOutcome, HarqHandle, HarqHistoryStore, HarqProcessTable};
use crate::models::{
    ChannelQuality, ConnectionId, Direction, FeedbackRecord, FtPoint, ProcessId, Scheme,
    SlotAllocation, TransportBlockDescriptor,
};
use crate::scheduler::{
    group_by_beam, BeamGroupProvider, DlRetxScheduler, PendingByBeam, RetxKpi, RetxOutcome,
    UlRetxScheduler,
};
use crate::validation::{into_harq_error, validate_config};

/// Result of one simulated decode attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecodeOutcome {
    /// The block decoded; its history was cleared.
    Decoded(ErrorModelOutput),
    /// The block failed; the attempt was added to its history.
    Failed(ErrorModelOutput),
    /// The block had already decoded; the copy was ignored.
    Duplicate,
}

impl DecodeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DecodeOutcome::Decoded(_))
    }

    /// Feedback to report for a single-stream block.
    ///
    /// Duplicates produce no feedback.
    pub fn feedback(&self, connection: ConnectionId, process: ProcessId) -> Option<FeedbackRecord> {
        match self {
            DecodeOutcome::Decoded(_) => Some(FeedbackRecord::ack(connection, process)),
            DecodeOutcome::Failed(_) => Some(FeedbackRecord::nack(connection, process)),
            DecodeOutcome::Duplicate => None,
        }
    }
}

/// Link adaptation and HARQ engine for one cell.
#[derive(Debug, Clone)]
pub struct LinkEngine {
    config: EngineConfig,
    error_model: Arc<dyn ErrorModel>,
    amc: Amc,
    history: HarqHistoryStore,
    downlink: HarqProcessTable,
    uplink: HarqProcessTable,
    sidelink: HarqProcessTable,
    dl_scheduler: DlRetxScheduler,
    ul_scheduler: UlRetxScheduler,
    slot: u64,
}

impl LinkEngine {
    /// Builds an engine over a shared curve table.
    ///
    /// # Errors
    /// `HarqError::Configuration` listing every problem of `config`.
    pub fn new(config: EngineConfig, curves: Arc<CurveTable>) -> HarqResult<Self> {
        validate_config(&config).map_err(into_harq_error)?;

        let error_model: Arc<dyn ErrorModel> = Arc::new(CurveErrorModel::new(curves));
        let payload: Arc<dyn PayloadSizeTable> =
            Arc::new(SpectralPayloadTable::new(config.ref_subcarriers_per_rb));
        let amc = Amc::new(Arc::clone(&error_model))
            .with_mode(config.amc_mode)
            .with_payload_table(payload)
            .with_reference_ber(config.reference_ber)
            .with_target_bler(config.target_bler);
        let processes = config.num_harq_processes;

        info!(
            "link engine: {} RBG x {} symbols, {} HARQ processes, max RV {}",
            config.bandwidth_rbg,
            config.symbols_per_slot,
            processes,
            config.max_retransmissions
        );

        Ok(Self {
            error_model,
            amc,
            history: HarqHistoryStore::new(config.max_history_len),
            downlink: HarqProcessTable::new(Direction::Downlink, processes),
            uplink: HarqProcessTable::new(Direction::Uplink, processes),
            sidelink: HarqProcessTable::new(Direction::Sidelink, processes),
            dl_scheduler: DlRetxScheduler::new(config.bandwidth_rbg, config.symbols_per_slot)
                .with_ordering(config.dl_retx_ordering.policy()),
            ul_scheduler: UlRetxScheduler::new(config.symbols_per_slot),
            slot: 0,
            config,
        })
    }

    /// Replaces the payload-size table used for transport block sizing.
    pub fn with_payload_table(mut self, payload: Arc<dyn PayloadSizeTable>) -> Self {
        self.amc = self.amc.with_payload_table(payload);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn amc(&self) -> &Amc {
        &self.amc
    }

    pub fn history(&self) -> &HarqHistoryStore {
        &self.history
    }

    /// Slots started so far.
    pub fn current_slot(&self) -> u64 {
        self.slot
    }

    /// Process table of a direction.
    pub fn processes(&self, direction: Direction) -> &HarqProcessTable {
        match direction {
            Direction::Downlink => &self.downlink,
            Direction::Uplink => &self.uplink,
            Direction::Sidelink => &self.sidelink,
        }
    }

    fn processes_mut(&mut self, direction: Direction) -> &mut HarqProcessTable {
        match direction {
            Direction::Downlink => &mut self.downlink,
            Direction::Uplink => &mut self.uplink,
            Direction::Sidelink => &mut self.sidelink,
        }
    }

    // ======================== Link adaptation ========================

    /// Chooses a scheme for the given quality samples.
    pub fn compute_mcs_from_quality(&self, quality: &ChannelQuality) -> HarqResult<McsSelection> {
        self.amc.mcs_from_quality(quality)
    }

    /// Transport block size of `rb_count` blocks at `scheme` (bytes).
    pub fn compute_tb_size(
        &self,
        scheme: Scheme,
        rb_count: u32,
        direction: Direction,
    ) -> HarqResult<u32> {
        self.amc.tb_size(scheme, rb_count, direction)
    }

    // ======================== Decoding ========================

    /// Evaluates the next attempt of a block against its history without
    /// recording it.
    pub fn evaluate_decode(
        &self,
        direction: Direction,
        connection: ConnectionId,
        process: ProcessId,
        scheme: Scheme,
        sinr: f64,
    ) -> HarqResult<ErrorModelOutput> {
        let history = self.history.history(direction, connection, process);
        self.error_model.combine(scheme, history, sinr)
    }

    /// Records a failed attempt.
    pub fn record_decode_outcome(
        &mut self,
        direction: Direction,
        connection: ConnectionId,
        process: ProcessId,
        output: ErrorModelOutput,
    ) {
        self.history.append(direction, connection, process, output);
    }

    /// Simulates one decode attempt.
    ///
    /// The attempt is combined with the block's history and succeeds when
    /// a uniform draw is at least the combined BLER. A failure is added to
    /// the history; a success clears it and, on sidelink, marks the block
    /// as decoded so later copies are ignored.
    pub fn decode<R: Rng>(
        &mut self,
        rng: &mut R,
        direction: Direction,
        connection: ConnectionId,
        process: ProcessId,
        scheme: Scheme,
        sinr: f64,
    ) -> HarqResult<DecodeOutcome> {
        if tracks_decoded(direction) && self.history.is_decoded(direction, connection, process) {
            debug!("{direction} conn {connection} pid {process}: already decoded, copy ignored");
            return Ok(DecodeOutcome::Duplicate);
        }

        let output = self.evaluate_decode(direction, connection, process, scheme, sinr)?;
        let draw: f64 = rng.random();
        if draw < output.bler {
            debug!(
                "{direction} conn {connection} pid {process}: failed (bler {:.3}, draw {draw:.3})",
                output.bler
            );
            self.record_decode_outcome(direction, connection, process, output);
            Ok(DecodeOutcome::Failed(output))
        } else {
            debug!(
                "{direction} conn {connection} pid {process}: decoded (bler {:.3}, draw {draw:.3})",
                output.bler
            );
            self.history.reset(direction, connection, process);
            if tracks_decoded(direction) {
                self.history.mark_decoded(direction, connection, process);
            }
            Ok(DecodeOutcome::Decoded(output))
        }
    }

    // ======================== HARQ control ========================

    /// Advances the slot: ticks every waiting process and abandons those
    /// that reached the feedback timeout.
    ///
    /// Returns the abandoned processes.
    pub fn start_slot(&mut self) -> Vec<(Direction, ConnectionId, ProcessId)> {
        self.slot += 1;
        let timeout = self.config.harq_timeout_slots;
        let mut abandoned = Vec::new();
        for direction in [Direction::Downlink, Direction::Uplink, Direction::Sidelink] {
            let table = self.processes_mut(direction);
            table.tick();
            let expired: Vec<HarqHandle> = table.expired(timeout);
            let mut keys = Vec::with_capacity(expired.len());
            for handle in expired {
                if let Some(key) = table.reset(handle) {
                    keys.push(key);
                }
            }
            for (connection, process) in keys {
                warn!(
                    "{direction} conn {connection} pid {process}: no feedback in {timeout} slots, abandoned"
                );
                self.history.reset(direction, connection, process);
                abandoned.push((direction, connection, process));
            }
        }
        abandoned
    }

    /// Starts a new-data transmission on the first free process of the
    /// descriptor's connection.
    ///
    /// Returns `None` when every process of the connection is busy.
    ///
    /// Processes of the connection still in `ReceivedFeedback` are not
    /// consulted: call this after the slot's retransmission scheduling so
    /// retransmissions take the grid first. New data may then go out on
    /// another idle process while a deferred retransmission waits.
    pub fn begin_new_transmission(
        &mut self,
        tb: TransportBlockDescriptor,
    ) -> HarqResult<Option<HarqHandle>> {
        let direction = tb.direction;
        let connection = tb.connection;
        let table = self.processes_mut(direction);
        let Some(handle) = table.start_new_transmission(tb)? else {
            return Ok(None);
        };
        let process = table.get(handle).map(|p| p.id);
        if let Some(process) = process {
            self.history.reset(direction, connection, process);
            self.history.clear_decoded(direction, connection, process);
        }
        Ok(Some(handle))
    }

    /// Applies decoder feedback for one direction.
    ///
    /// Completed and abandoned processes lose their history. On sidelink,
    /// feedback for a block already decoded is dropped.
    pub fn process_feedback(
        &mut self,
        direction: Direction,
        feedback: Vec<FeedbackRecord>,
    ) -> HarqResult<FeedbackOutcome> {
        let feedback: Vec<FeedbackRecord> = if tracks_decoded(direction) {
            feedback
                .into_iter()
                .filter(|r| {
                    let stale = self.history.is_decoded(direction, r.connection, r.process)
                        && self
                            .processes(direction)
                            .process(r.connection, r.process)
                            .map_or(true, |p| p.is_idle());
                    if stale {
                        warn!("{direction} {r}: block already decoded, duplicate feedback dropped");
                    }
                    !stale
                })
                .collect()
        } else {
            feedback
        };

        let max_retx = self.config.max_retransmissions;
        let outcome = self
            .processes_mut(direction)
            .process_feedback(feedback, max_retx)?;
        for &(connection, process) in outcome.completed.iter().chain(&outcome.abandoned) {
            self.history.reset(direction, connection, process);
        }
        Ok(outcome)
    }

    /// Groups pending downlink retransmissions by beam.
    pub fn group_dl_feedback(
        &self,
        pending: Vec<FeedbackRecord>,
        beams: &dyn BeamGroupProvider,
    ) -> HarqResult<PendingByBeam> {
        group_by_beam(pending, beams)
    }

    /// Places pending downlink retransmissions in `slot`.
    pub fn schedule_dl_retransmissions(
        &mut self,
        cursor: &mut FtPoint,
        available_symbols: u8,
        pending: PendingByBeam,
        slot: &mut SlotAllocation,
    ) -> HarqResult<RetxOutcome> {
        self.dl_scheduler
            .schedule(cursor, available_symbols, pending, &mut self.downlink, slot)
    }

    /// Places pending uplink retransmissions in `slot`.
    pub fn schedule_ul_retransmissions(
        &mut self,
        cursor: &mut FtPoint,
        available_symbols: u8,
        pending: Vec<FeedbackRecord>,
        slot: &mut SlotAllocation,
    ) -> HarqResult<RetxOutcome> {
        self.ul_scheduler
            .schedule(cursor, available_symbols, pending, &mut self.uplink, slot)
    }

    /// Indicators of a retransmission pass on this engine's grid.
    pub fn retx_kpi(&self, outcome: &RetxOutcome, slot: &SlotAllocation) -> RetxKpi {
        RetxKpi::calculate(
            outcome,
            slot,
            self.config.bandwidth_rbg,
            self.config.symbols_per_slot,
        )
    }
}

/// Directions whose receivers may see the same block more than once.
fn tracks_decoded(direction: Direction) -> bool {
    direction == Direction::Sidelink
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HarqError;
    use crate::models::{db_to_linear, HarqStatus, StreamTx};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn engine(config: EngineConfig) -> LinkEngine {
        LinkEngine::new(config, Arc::new(CurveTable::awgn_reference())).unwrap()
    }

    fn tb(direction: Direction, conn: ConnectionId) -> TransportBlockDescriptor {
        TransportBlockDescriptor::new(conn, 0, direction)
            .with_symbols(0, 2)
            .with_rbg_range(4, 0, 2)
            .with_stream(StreamTx::new_data(10, 200))
    }

    #[test]
    fn test_invalid_config_fails_at_setup() {
        let err = LinkEngine::new(
            EngineConfig::default().with_bandwidth_rbg(0),
            Arc::new(CurveTable::awgn_reference()),
        )
        .unwrap_err();
        assert!(matches!(err, HarqError::Configuration(_)));
    }

    #[test]
    fn test_link_adaptation_passthrough() {
        let e = engine(EngineConfig::default());
        let sel = e
            .compute_mcs_from_quality(&ChannelQuality::flat_db(30.0, 8))
            .unwrap();
        assert_eq!(sel.scheme(), Some(28));
        assert_eq!(e.compute_tb_size(10, 100, Direction::Downlink).unwrap(), 159);
        assert!(e.compute_tb_size(29, 1, Direction::Downlink).is_err());
    }

    #[test]
    fn test_decode_failure_then_success() {
        let mut e = engine(EngineConfig::default());
        let mut rng = StdRng::seed_from_u64(7);

        // Far below the waterfall: always fails and is recorded.
        let low = db_to_linear(-30.0);
        let first = e
            .decode(&mut rng, Direction::Downlink, 1, 0, 10, low)
            .unwrap();
        assert!(matches!(first, DecodeOutcome::Failed(o) if o.bler == 1.0));
        assert_eq!(e.history().history(Direction::Downlink, 1, 0).len(), 1);
        assert_eq!(first.feedback(1, 0), Some(FeedbackRecord::nack(1, 0)));

        // Far above: always decodes and clears the history.
        let high = db_to_linear(40.0);
        let second = e
            .decode(&mut rng, Direction::Downlink, 1, 0, 10, high)
            .unwrap();
        assert!(second.is_success());
        assert!(e.history().history(Direction::Downlink, 1, 0).is_empty());
        // Downlink does not track decoded blocks.
        assert!(!e.history().is_decoded(Direction::Downlink, 1, 0));
    }

    #[test]
    fn test_sidelink_duplicate_suppression() {
        let mut e = engine(EngineConfig::default());
        let mut rng = StdRng::seed_from_u64(1);
        let high = db_to_linear(40.0);
        e.begin_new_transmission(tb(Direction::Sidelink, 3)).unwrap();

        let first = e
            .decode(&mut rng, Direction::Sidelink, 3, 0, 10, high)
            .unwrap();
        assert!(first.is_success());
        let again = e
            .decode(&mut rng, Direction::Sidelink, 3, 0, 10, high)
            .unwrap();
        assert_eq!(again, DecodeOutcome::Duplicate);
        assert_eq!(again.feedback(3, 0), None);

        let out = e
            .process_feedback(Direction::Sidelink, vec![FeedbackRecord::ack(3, 0)])
            .unwrap();
        assert_eq!(out.completed, vec![(3, 0)]);
        // A second copy of the ACK is dropped instead of hitting an idle process.
        let out = e
            .process_feedback(Direction::Sidelink, vec![FeedbackRecord::ack(3, 0)])
            .unwrap();
        assert!(out.completed.is_empty());

        // New data on the process forgets the marker.
        e.begin_new_transmission(tb(Direction::Sidelink, 3)).unwrap();
        assert!(!e.history().is_decoded(Direction::Sidelink, 3, 0));
    }

    #[test]
    fn test_nack_keeps_history() {
        let mut e = engine(EngineConfig::default());
        e.begin_new_transmission(tb(Direction::Downlink, 2)).unwrap();
        e.record_decode_outcome(Direction::Downlink, 2, 0, ErrorModelOutput::new(1.0, 0.5));
        let out = e
            .process_feedback(Direction::Downlink, vec![FeedbackRecord::nack(2, 0)])
            .unwrap();
        assert_eq!(out.pending.len(), 1);
        assert_eq!(e.history().history(Direction::Downlink, 2, 0).len(), 1);
        assert_eq!(
            e.processes(Direction::Downlink).process(2, 0).unwrap().status,
            HarqStatus::ReceivedFeedback
        );
    }

    #[test]
    fn test_new_data_leaves_pending_retransmission() {
        let mut e = engine(EngineConfig::default());
        e.begin_new_transmission(tb(Direction::Downlink, 3)).unwrap();
        e.record_decode_outcome(Direction::Downlink, 3, 0, ErrorModelOutput::new(1.0, 0.5));
        e.process_feedback(Direction::Downlink, vec![FeedbackRecord::nack(3, 0)])
            .unwrap();

        let handle = e
            .begin_new_transmission(tb(Direction::Downlink, 3))
            .unwrap()
            .unwrap();
        let table = e.processes(Direction::Downlink);
        assert_eq!(table.get(handle).unwrap().id, 1);
        assert_eq!(table.process(3, 0).unwrap().status, HarqStatus::ReceivedFeedback);
        assert_eq!(e.history().history(Direction::Downlink, 3, 0).len(), 1);
    }

    #[test]
    fn test_timeout_abandons_process() {
        let mut e = engine(EngineConfig::default().with_harq_timeout(2));
        e.begin_new_transmission(tb(Direction::Uplink, 4)).unwrap();
        e.record_decode_outcome(Direction::Uplink, 4, 0, ErrorModelOutput::new(1.0, 0.5));

        assert!(e.start_slot().is_empty());
        let abandoned = e.start_slot();
        assert_eq!(abandoned, vec![(Direction::Uplink, 4, 0)]);
        assert_eq!(e.current_slot(), 2);
        assert!(e.processes(Direction::Uplink).process(4, 0).unwrap().is_idle());
        assert!(e.history().history(Direction::Uplink, 4, 0).is_empty());
    }

    #[test]
    fn test_process_exhaustion() {
        let mut e = engine(EngineConfig::default().with_harq_processes(2));
        assert!(e.begin_new_transmission(tb(Direction::Downlink, 1)).unwrap().is_some());
        assert!(e.begin_new_transmission(tb(Direction::Downlink, 1)).unwrap().is_some());
        assert!(e.begin_new_transmission(tb(Direction::Downlink, 1)).unwrap().is_none());
        assert_eq!(e.processes(Direction::Downlink).active_count(1), 2);
    }
}
