//! HARQ feedback records produced by the decoder side.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ConnectionId, ProcessId};

/// Per-stream decode outcome for one HARQ process.
///
/// `acks[i]` is `true` when stream `i` decoded successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub connection: ConnectionId,
    pub process: ProcessId,
    pub acks: Vec<bool>,
}

impl FeedbackRecord {
    pub fn new(connection: ConnectionId, process: ProcessId, acks: Vec<bool>) -> Self {
        Self {
            connection,
            process,
            acks,
        }
    }

    /// Single-stream acknowledgement.
    pub fn ack(connection: ConnectionId, process: ProcessId) -> Self {
        Self::new(connection, process, vec![true])
    }

    /// Single-stream negative acknowledgement.
    pub fn nack(connection: ConnectionId, process: ProcessId) -> Self {
        Self::new(connection, process, vec![false])
    }

    /// Whether every stream decoded.
    pub fn is_received_ok(&self) -> bool {
        self.acks.iter().all(|&ok| ok)
    }

    /// Indexes of the streams that failed.
    pub fn nack_stream_indexes(&self) -> Vec<u8> {
        self.acks
            .iter()
            .enumerate()
            .filter(|(_, &ok)| !ok)
            .map(|(i, _)| i as u8)
            .collect()
    }

    /// Whether the record refers to the given process.
    #[inline]
    pub fn matches(&self, connection: ConnectionId, process: ProcessId) -> bool {
        self.connection == connection && self.process == process
    }
}

impl fmt::Display for FeedbackRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "conn {} pid {} {}",
            self.connection,
            self.process,
            if self.is_received_ok() { "ACK" } else { "NACK" }
        )
    }
}
