//! Slot allocation (per-slot output).
//!
//! Ordered list of transport block descriptors plus the number of
//! symbols consumed. Uplink retransmissions are prepended so they sit in
//! front of the new-data region; everything else is appended.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::{ConnectionId, TransportBlockDescriptor};

/// Allocation decisions for one slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotAllocation {
    /// Transmissions in slot order.
    pub allocations: VecDeque<TransportBlockDescriptor>,
    /// Symbols consumed by the allocations.
    pub used_symbols: u8,
}

impl SlotAllocation {
    /// Creates an empty allocation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a transmission.
    pub fn push_back(&mut self, tb: TransportBlockDescriptor) {
        self.allocations.push_back(tb);
    }

    /// Prepends a transmission.
    pub fn push_front(&mut self, tb: TransportBlockDescriptor) {
        self.allocations.push_front(tb);
    }

    /// Number of transmissions.
    pub fn len(&self) -> usize {
        self.allocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }

    /// Finds the first transmission for a connection.
    pub fn allocation_for(&self, connection: ConnectionId) -> Option<&TransportBlockDescriptor> {
        self.allocations.iter().find(|a| a.connection == connection)
    }

    /// Returns every transmission for a connection.
    pub fn allocations_for(&self, connection: ConnectionId) -> Vec<&TransportBlockDescriptor> {
        self.allocations
            .iter()
            .filter(|a| a.connection == connection)
            .collect()
    }

    /// Block-symbols in use across all transmissions.
    pub fn occupied_rbg_symbols(&self) -> u32 {
        self.allocations.iter().map(|a| a.rbg_symbols()).sum()
    }

    /// First pair of transmissions of different connections sharing
    /// block-symbols, if any.
    pub fn first_overlap(&self) -> Option<(usize, usize)> {
        let items: Vec<&TransportBlockDescriptor> = self.allocations.iter().collect();
        for i in 0..items.len() {
            for j in (i + 1)..items.len() {
                if items[i].connection != items[j].connection && items[i].overlaps(items[j]) {
                    return Some((i, j));
                }
            }
        }
        None
    }

    /// Fraction of the `bandwidth_rbg x symbols` grid in use.
    ///
    /// Returns `None` for an empty grid.
    pub fn grid_utilization(&self, bandwidth_rbg: u16, symbols: u8) -> Option<f64> {
        let grid = u32::from(bandwidth_rbg) * u32::from(symbols);
        if grid == 0 {
            return None;
        }
        Some(self.occupied_rbg_symbols() as f64 / grid as f64)
    }
}
