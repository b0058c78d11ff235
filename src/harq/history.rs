//! Decode-attempt history per HARQ process.
//!
//! Keeps, for each direction, connection and process, the error-model
//! output of every failed attempt of the block currently in flight. The
//! history feeds the combining step of the next attempt and is cleared
//! once the block decodes or is abandoned.
//!
//! A separate decoded set per direction remembers (connection, process)
//! pairs whose block already decoded, so duplicate copies arriving later
//! on broadcast-like links can be ignored.

use log::warn;
use std::collections::{HashMap, HashSet};

use crate::error_model::ErrorModelOutput;
use crate::models::{ConnectionId, Direction, ProcessId};

type ProcessHistory = HashMap<ProcessId, Vec<ErrorModelOutput>>;

/// History store owned by the per-slot control flow.
#[derive(Debug, Clone)]
pub struct HarqHistoryStore {
    max_len: usize,
    history: HashMap<Direction, HashMap<ConnectionId, ProcessHistory>>,
    decoded: HashMap<Direction, HashSet<(ConnectionId, ProcessId)>>,
}

impl HarqHistoryStore {
    /// Creates a store keeping at most `max_len` attempts per process.
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len: max_len.max(1),
            history: HashMap::new(),
            decoded: HashMap::new(),
        }
    }

    /// Attempts kept before a forced reset.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    fn entry(
        &mut self,
        direction: Direction,
        connection: ConnectionId,
        process: ProcessId,
    ) -> &mut Vec<ErrorModelOutput> {
        self.history
            .entry(direction)
            .or_default()
            .entry(connection)
            .or_default()
            .entry(process)
            .or_default()
    }

    /// Recorded attempts (empty if none).
    pub fn history(
        &self,
        direction: Direction,
        connection: ConnectionId,
        process: ProcessId,
    ) -> &[ErrorModelOutput] {
        self.history
            .get(&direction)
            .and_then(|d| d.get(&connection))
            .and_then(|c| c.get(&process))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Appends an attempt.
    ///
    /// A process already holding `max_len` attempts is reset first, so the
    /// new attempt starts a fresh history.
    pub fn append(
        &mut self,
        direction: Direction,
        connection: ConnectionId,
        process: ProcessId,
        output: ErrorModelOutput,
    ) {
        let max_len = self.max_len;
        let entry = self.entry(direction, connection, process);
        if entry.len() >= max_len {
            warn!(
                "{direction} conn {connection} pid {process}: history full ({max_len}), resetting"
            );
            entry.clear();
        }
        entry.push(output);
    }

    /// Clears the attempts of a process, keeping its entry.
    pub fn reset(&mut self, direction: Direction, connection: ConnectionId, process: ProcessId) {
        self.entry(direction, connection, process).clear();
    }

    /// Marks a block as decoded.
    pub fn mark_decoded(
        &mut self,
        direction: Direction,
        connection: ConnectionId,
        process: ProcessId,
    ) {
        self.decoded
            .entry(direction)
            .or_default()
            .insert((connection, process));
    }

    /// Whether a block was already decoded.
    pub fn is_decoded(
        &self,
        direction: Direction,
        connection: ConnectionId,
        process: ProcessId,
    ) -> bool {
        self.decoded
            .get(&direction)
            .is_some_and(|set| set.contains(&(connection, process)))
    }

    /// Forgets a decoded marker (e.g. when the process carries new data).
    pub fn clear_decoded(
        &mut self,
        direction: Direction,
        connection: ConnectionId,
        process: ProcessId,
    ) {
        if let Some(set) = self.decoded.get_mut(&direction) {
            set.remove(&(connection, process));
        }
    }
}

impl Default for HarqHistoryStore {
    fn default() -> Self {
        Self::new(4)
    }
}
