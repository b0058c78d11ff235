//! HARQ process record.
//!
//! # State machine
//!
//! ```text
//! Idle --start--> WaitingFeedback --NACK--> ReceivedFeedback
//!   ^                  |    ^                     |
//!   |                 ACK   +------ retransmit ---+
//!   +--- reset --------+  (abandon from any state)
//! ```
//!
//! Processes are never destroyed: a finished process goes back to `Idle`
//! and its id is reused by the next new transmission of the connection.

use serde::{Deserialize, Serialize};

use super::{ConnectionId, ProcessId, TransportBlockDescriptor};

/// Process state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HarqStatus {
    /// Free for a new transmission.
    #[default]
    Idle,
    /// Transmitted, feedback pending.
    WaitingFeedback,
    /// NACK received, retransmission pending.
    ReceivedFeedback,
}

/// One HARQ process of one connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarqProcess {
    pub connection: ConnectionId,
    pub id: ProcessId,
    pub status: HarqStatus,
    /// Last transmission sent on this process.
    pub last_tx: Option<TransportBlockDescriptor>,
    /// Slots spent waiting for feedback.
    pub timer: u32,
    /// Streams reported as failed by the last feedback.
    pub nacked_streams: Vec<u8>,
}

impl HarqProcess {
    /// Creates an idle process.
    pub fn new(connection: ConnectionId, id: ProcessId) -> Self {
        Self {
            connection,
            id,
            status: HarqStatus::Idle,
            last_tx: None,
            timer: 0,
            nacked_streams: Vec::new(),
        }
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.status == HarqStatus::Idle
    }

    /// Whether stream `index` must be retransmitted.
    pub fn is_stream_nacked(&self, index: u8) -> bool {
        self.nacked_streams.contains(&index)
    }

    /// Highest redundancy version among the last transmission's streams.
    pub fn max_rv(&self) -> u8 {
        self.last_tx
            .as_ref()
            .and_then(|tx| tx.streams.iter().map(|s| s.rv()).max())
            .unwrap_or(0)
    }

    /// Symbols used by the last transmission.
    pub fn last_symbol_count(&self) -> u8 {
        self.last_tx.as_ref().map(|tx| tx.symbol_count).unwrap_or(0)
    }

    /// Returns to `Idle`, dropping the stored transmission.
    pub fn reset(&mut self) {
        self.status = HarqStatus::Idle;
        self.last_tx = None;
        self.timer = 0;
        self.nacked_streams.clear();
    }
}
