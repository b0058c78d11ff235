//! Transport block descriptor.
//!
//! A descriptor is the scheduling decision for one connection and one
//! HARQ process in one slot: where it sits in the time/frequency plane
//! and what each spatial stream carries.

use serde::{Deserialize, Serialize};

use super::{ConnectionId, Direction, ProcessId, Scheme};

/// What a single spatial stream carries in a transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamTx {
    /// The stream is transmitted.
    Scheduled {
        /// Modulation/coding scheme.
        scheme: Scheme,
        /// Transport block size (bytes).
        size_bytes: u32,
        /// Redundancy version.
        rv: u8,
        /// New-data indicator: `true` for a first transmission.
        new_data: bool,
    },
    /// The stream carries nothing (e.g. already acknowledged).
    NotScheduled,
}

impl StreamTx {
    /// A first transmission (RV 0, new data).
    pub fn new_data(scheme: Scheme, size_bytes: u32) -> Self {
        StreamTx::Scheduled {
            scheme,
            size_bytes,
            rv: 0,
            new_data: true,
        }
    }

    /// Same scheme and size, next redundancy version, new-data cleared.
    ///
    /// A stream that is not scheduled stays not scheduled.
    pub fn retransmission(self) -> Self {
        match self {
            StreamTx::Scheduled {
                scheme,
                size_bytes,
                rv,
                ..
            } => StreamTx::Scheduled {
                scheme,
                size_bytes,
                rv: rv.saturating_add(1),
                new_data: false,
            },
            StreamTx::NotScheduled => StreamTx::NotScheduled,
        }
    }

    #[inline]
    pub fn is_scheduled(&self) -> bool {
        matches!(self, StreamTx::Scheduled { .. })
    }

    pub fn scheme(&self) -> Option<Scheme> {
        match self {
            StreamTx::Scheduled { scheme, .. } => Some(*scheme),
            StreamTx::NotScheduled => None,
        }
    }

    /// Size in bytes (0 when not scheduled).
    pub fn size_bytes(&self) -> u32 {
        match self {
            StreamTx::Scheduled { size_bytes, .. } => *size_bytes,
            StreamTx::NotScheduled => 0,
        }
    }

    /// Redundancy version (0 when not scheduled).
    pub fn rv(&self) -> u8 {
        match self {
            StreamTx::Scheduled { rv, .. } => *rv,
            StreamTx::NotScheduled => 0,
        }
    }

    /// New-data flag; `None` when not scheduled.
    pub fn new_data_flag(&self) -> Option<bool> {
        match self {
            StreamTx::Scheduled { new_data, .. } => Some(*new_data),
            StreamTx::NotScheduled => None,
        }
    }
}

/// One scheduled transmission in a slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportBlockDescriptor {
    /// Receiving (DL) or transmitting (UL) connection.
    pub connection: ConnectionId,
    /// HARQ process carrying the block.
    pub process: ProcessId,
    /// Link direction.
    pub direction: Direction,
    /// First OFDM symbol.
    pub symbol_start: u8,
    /// Number of consecutive symbols.
    pub symbol_count: u8,
    /// Frequency-block occupancy, one flag per block of the bandwidth.
    pub rbg_mask: Vec<bool>,
    /// Per-stream content.
    pub streams: Vec<StreamTx>,
}

impl TransportBlockDescriptor {
    /// Creates a descriptor with no streams and an empty mask.
    pub fn new(connection: ConnectionId, process: ProcessId, direction: Direction) -> Self {
        Self {
            connection,
            process,
            direction,
            symbol_start: 0,
            symbol_count: 0,
            rbg_mask: Vec::new(),
            streams: Vec::new(),
        }
    }

    /// Sets the symbol range.
    pub fn with_symbols(mut self, start: u8, count: u8) -> Self {
        self.symbol_start = start;
        self.symbol_count = count;
        self
    }

    /// Marks `count` blocks starting at `first` out of `bandwidth` blocks.
    pub fn with_rbg_range(mut self, bandwidth: u16, first: u16, count: u16) -> Self {
        self.rbg_mask = contiguous_mask(bandwidth, first, count);
        self
    }

    /// Sets the raw frequency-block mask.
    pub fn with_rbg_mask(mut self, mask: Vec<bool>) -> Self {
        self.rbg_mask = mask;
        self
    }

    /// Adds a stream.
    pub fn with_stream(mut self, stream: StreamTx) -> Self {
        self.streams.push(stream);
        self
    }

    /// Number of frequency blocks in use.
    pub fn rbg_count(&self) -> u32 {
        self.rbg_mask.iter().filter(|&&b| b).count() as u32
    }

    /// Occupied time/frequency area in block-symbols.
    pub fn rbg_symbols(&self) -> u32 {
        self.rbg_count() * u32::from(self.symbol_count)
    }

    /// Index of the first occupied block.
    pub fn first_rbg(&self) -> Option<u16> {
        self.rbg_mask.iter().position(|&b| b).map(|i| i as u16)
    }

    /// Exclusive end symbol.
    #[inline]
    pub fn symbol_end(&self) -> u8 {
        self.symbol_start.saturating_add(self.symbol_count)
    }

    /// Whether two descriptors share at least one block-symbol.
    pub fn overlaps(&self, other: &TransportBlockDescriptor) -> bool {
        let time = self.symbol_start < other.symbol_end() && other.symbol_start < self.symbol_end();
        time && self
            .rbg_mask
            .iter()
            .zip(other.rbg_mask.iter())
            .any(|(&a, &b)| a && b)
    }
}

/// Builds a mask with `count` set flags starting at `first`.
pub(crate) fn contiguous_mask(bandwidth: u16, first: u16, count: u16) -> Vec<bool> {
    let end = u32::from(first) + u32::from(count);
    (0..bandwidth)
        .map(|i| first <= i && u32::from(i) < end)
        .collect()
}
