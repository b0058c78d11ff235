//! Link identifiers and direction.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection (radio network temporary) identifier.
pub type ConnectionId = u16;

/// HARQ process identifier, recycled per connection.
pub type ProcessId = u8;

/// Spatial group of non-interfering connections sharing a time budget.
pub type BeamId = u32;

/// Modulation/coding scheme ordinal.
pub type Scheme = u8;

/// Link direction of a transmission.
///
/// `Sidelink` is the broadcast-like class: receivers may see the same
/// block more than once and track already decoded blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    Downlink,
    Uplink,
    Sidelink,
}

impl Direction {
    /// Short label used in log lines.
    pub fn label(self) -> &'static str {
        match self {
            Direction::Downlink => "DL",
            Direction::Uplink => "UL",
            Direction::Sidelink => "SL",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Position in the slot's time/frequency plane.
///
/// `symbol` is the OFDM symbol index inside the slot, `rbg` the index of
/// the first free frequency block on that symbol range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FtPoint {
    pub symbol: u8,
    pub rbg: u16,
}

impl FtPoint {
    pub fn new(symbol: u8, rbg: u16) -> Self {
        Self { symbol, rbg }
    }
}
