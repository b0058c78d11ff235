//! HARQ process table.
//!
//! Arena of [`HarqProcess`] records for one link direction. Records are
//! addressed by [`HarqHandle`] (an arena index) and looked up by
//! (connection, process id). A connection owns a fixed number of process
//! ids; records are created the first time an id carries new data and are
//! reset, never removed, when the block completes.

use log::{debug, info, warn};
use std::collections::HashMap;

use crate::error::{HarqError, HarqResult};
use crate::models::{
    ConnectionId, Direction, FeedbackRecord, HarqProcess, HarqStatus, ProcessId,
    TransportBlockDescriptor,
};

/// Index of a process record in its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HarqHandle(usize);

impl HarqHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Result of applying a batch of feedback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedbackOutcome {
    /// NACKed processes waiting for a retransmission, in input order.
    pub pending: Vec<FeedbackRecord>,
    /// Processes whose block decoded.
    pub completed: Vec<(ConnectionId, ProcessId)>,
    /// Processes given up after the last redundancy version.
    pub abandoned: Vec<(ConnectionId, ProcessId)>,
}

/// Per-direction process table.
#[derive(Debug, Clone)]
pub struct HarqProcessTable {
    direction: Direction,
    processes_per_connection: u8,
    arena: Vec<HarqProcess>,
    index: HashMap<(ConnectionId, ProcessId), HarqHandle>,
}

impl HarqProcessTable {
    /// Creates a table with `processes_per_connection` ids per connection.
    pub fn new(direction: Direction, processes_per_connection: u8) -> Self {
        Self {
            direction,
            processes_per_connection,
            arena: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn processes_per_connection(&self) -> u8 {
        self.processes_per_connection
    }

    /// Handle of an existing record.
    pub fn handle(&self, connection: ConnectionId, process: ProcessId) -> Option<HarqHandle> {
        self.index.get(&(connection, process)).copied()
    }

    /// Record behind a handle.
    pub fn get(&self, handle: HarqHandle) -> Option<&HarqProcess> {
        self.arena.get(handle.0)
    }

    /// Mutable record behind a handle.
    pub fn get_mut(&mut self, handle: HarqHandle) -> Option<&mut HarqProcess> {
        self.arena.get_mut(handle.0)
    }

    /// Record of a (connection, process) pair.
    pub fn process(&self, connection: ConnectionId, process: ProcessId) -> Option<&HarqProcess> {
        self.handle(connection, process).and_then(|h| self.get(h))
    }

    /// Number of records created so far.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Records of a connection.
    pub fn processes_of(&self, connection: ConnectionId) -> impl Iterator<Item = &HarqProcess> + '_ {
        self.arena.iter().filter(move |p| p.connection == connection)
    }

    /// Number of non-idle processes of a connection.
    pub fn active_count(&self, connection: ConnectionId) -> usize {
        self.processes_of(connection).filter(|p| !p.is_idle()).count()
    }

    /// Lowest process id of the connection free for new data.
    pub fn first_available(&self, connection: ConnectionId) -> Option<ProcessId> {
        (0..self.processes_per_connection)
            .find(|&pid| self.process(connection, pid).map_or(true, HarqProcess::is_idle))
    }

    fn get_or_create(&mut self, connection: ConnectionId, process: ProcessId) -> HarqHandle {
        if let Some(handle) = self.handle(connection, process) {
            return handle;
        }
        let handle = HarqHandle(self.arena.len());
        self.arena.push(HarqProcess::new(connection, process));
        self.index.insert((connection, process), handle);
        handle
    }

    /// Starts a new transmission on the process named by `tb`.
    pub fn start_transmission(&mut self, tb: TransportBlockDescriptor) -> HarqResult<HarqHandle> {
        if tb.process >= self.processes_per_connection {
            return Err(HarqError::invariant(format!(
                "{} conn {} pid {} beyond {} processes",
                self.direction, tb.connection, tb.process, self.processes_per_connection
            )));
        }
        let handle = self.get_or_create(tb.connection, tb.process);
        let record = &mut self.arena[handle.0];
        if !record.is_idle() {
            return Err(HarqError::invariant(format!(
                "{} conn {} pid {} is busy ({:?})",
                self.direction, tb.connection, tb.process, record.status
            )));
        }
        record.status = HarqStatus::WaitingFeedback;
        record.timer = 0;
        record.nacked_streams.clear();
        record.last_tx = Some(tb);
        Ok(handle)
    }

    /// Starts a new transmission on the first free process of the
    /// connection, writing the chosen id into the descriptor.
    ///
    /// Returns `None` when every process of the connection is busy.
    pub fn start_new_transmission(
        &mut self,
        mut tb: TransportBlockDescriptor,
    ) -> HarqResult<Option<HarqHandle>> {
        let Some(pid) = self.first_available(tb.connection) else {
            debug!(
                "{} conn {}: no free HARQ process",
                self.direction, tb.connection
            );
            return Ok(None);
        };
        tb.process = pid;
        self.start_transmission(tb).map(Some)
    }

    /// Records a committed retransmission.
    pub fn mark_retransmitted(
        &mut self,
        handle: HarqHandle,
        tb: TransportBlockDescriptor,
    ) -> HarqResult<()> {
        let direction = self.direction;
        let record = self
            .arena
            .get_mut(handle.0)
            .ok_or_else(|| HarqError::invariant(format!("{direction} handle {} unknown", handle.0)))?;
        if record.status != HarqStatus::ReceivedFeedback {
            return Err(HarqError::invariant(format!(
                "{direction} conn {} pid {} retransmitted while {:?}",
                record.connection, record.id, record.status
            )));
        }
        record.status = HarqStatus::WaitingFeedback;
        record.timer = 0;
        record.last_tx = Some(tb);
        Ok(())
    }

    /// Applies decoder feedback.
    ///
    /// ACKed processes are reset. NACKed processes whose last transmission
    /// already used redundancy version `max_retransmissions` are abandoned
    /// and reset; the rest move to `ReceivedFeedback` and are returned as
    /// pending retransmissions. Feedback for an idle or unknown process is
    /// an invariant violation.
    pub fn process_feedback(
        &mut self,
        feedback: Vec<FeedbackRecord>,
        max_retransmissions: u8,
    ) -> HarqResult<FeedbackOutcome> {
        let mut outcome = FeedbackOutcome::default();
        for record in feedback {
            let handle = self
                .handle(record.connection, record.process)
                .filter(|&h| !self.arena[h.0].is_idle())
                .ok_or_else(|| {
                    HarqError::invariant(format!(
                        "{} feedback for inactive process: {record}",
                        self.direction
                    ))
                })?;
            let process = &mut self.arena[handle.0];
            let key = (record.connection, record.process);

            if record.is_received_ok() {
                process.reset();
                outcome.completed.push(key);
                debug!("{} {record}: process released", self.direction);
            } else if process.max_rv() >= max_retransmissions {
                process.reset();
                outcome.abandoned.push(key);
                warn!(
                    "{} {record}: retransmissions exhausted, block dropped",
                    self.direction
                );
            } else {
                process.status = HarqStatus::ReceivedFeedback;
                process.nacked_streams = record.nack_stream_indexes();
                debug!("{} {record}: waiting for retransmission", self.direction);
                outcome.pending.push(record);
            }
        }
        Ok(outcome)
    }

    /// Advances the timer of every process waiting for feedback.
    pub fn tick(&mut self) {
        for process in self
            .arena
            .iter_mut()
            .filter(|p| p.status == HarqStatus::WaitingFeedback)
        {
            process.timer = process.timer.saturating_add(1);
        }
    }

    /// Non-idle processes whose timer reached `threshold`.
    pub fn expired(&self, threshold: u32) -> Vec<HarqHandle> {
        self.arena
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.is_idle() && p.timer >= threshold)
            .map(|(i, _)| HarqHandle(i))
            .collect()
    }

    /// Returns a process to `Idle`.
    pub fn reset(&mut self, handle: HarqHandle) -> Option<(ConnectionId, ProcessId)> {
        let process = self.arena.get_mut(handle.0)?;
        info!(
            "{} conn {} pid {} reset",
            self.direction, process.connection, process.id
        );
        process.reset();
        Some((process.connection, process.id))
    }
}
