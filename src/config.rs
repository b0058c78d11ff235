//! Engine configuration.
//!
//! Every field has a default, so a partial JSON/TOML document is enough
//! to describe a deployment:
//!
//! ```
//! use u_harq::config::EngineConfig;
//!
//! let config: EngineConfig = serde_json::from_str(r#"{ "bandwidth_rbg": 17 }"#).unwrap();
//! assert_eq!(config.bandwidth_rbg, 17);
//! assert_eq!(config.symbols_per_slot, 14);
//! ```

use serde::{Deserialize, Serialize};

use crate::amc::AmcMode;
use crate::scheduler::RetxOrderingKind;

/// Static parameters of one engine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// OFDM symbols per slot.
    pub symbols_per_slot: u8,
    /// Frequency blocks in the carrier bandwidth.
    pub bandwidth_rbg: u16,
    /// HARQ process ids per connection and direction.
    pub num_harq_processes: u8,
    /// Highest redundancy version sent; 0 disables retransmission.
    pub max_retransmissions: u8,
    /// Slots a process may wait for feedback before it is abandoned.
    pub harq_timeout_slots: u32,
    /// Decode attempts kept per process before a forced history reset.
    pub max_history_len: usize,
    /// Scheme selection method.
    pub amc_mode: AmcMode,
    /// Bit error rate assumed by the Shannon estimate.
    pub reference_ber: f64,
    /// BLER target of the error-model search.
    pub target_bler: f64,
    /// Reference-signal subcarriers per resource block.
    pub ref_subcarriers_per_rb: u8,
    /// Ordering of pending downlink retransmissions inside a beam.
    pub dl_retx_ordering: RetxOrderingKind,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbols_per_slot: 14,
            bandwidth_rbg: 25,
            num_harq_processes: 16,
            max_retransmissions: 3,
            harq_timeout_slots: 16,
            max_history_len: 4,
            amc_mode: AmcMode::ErrorModel,
            reference_ber: 0.00005,
            target_bler: 0.1,
            ref_subcarriers_per_rb: 1,
            dl_retx_ordering: RetxOrderingKind::LargestFirst,
        }
    }
}

impl EngineConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_symbols_per_slot(mut self, symbols: u8) -> Self {
        self.symbols_per_slot = symbols;
        self
    }

    pub fn with_bandwidth_rbg(mut self, rbg: u16) -> Self {
        self.bandwidth_rbg = rbg;
        self
    }

    /// Sets the number of process ids; the feedback timeout follows it.
    pub fn with_harq_processes(mut self, processes: u8) -> Self {
        self.num_harq_processes = processes;
        self.harq_timeout_slots = u32::from(processes);
        self
    }

    pub fn with_max_retransmissions(mut self, max_rv: u8) -> Self {
        self.max_retransmissions = max_rv;
        self
    }

    pub fn with_harq_timeout(mut self, slots: u32) -> Self {
        self.harq_timeout_slots = slots;
        self
    }

    pub fn with_max_history_len(mut self, len: usize) -> Self {
        self.max_history_len = len;
        self
    }

    pub fn with_amc_mode(mut self, mode: AmcMode) -> Self {
        self.amc_mode = mode;
        self
    }

    pub fn with_reference_ber(mut self, ber: f64) -> Self {
        self.reference_ber = ber;
        self
    }

    pub fn with_target_bler(mut self, target: f64) -> Self {
        self.target_bler = target;
        self
    }

    pub fn with_ref_subcarriers(mut self, subcarriers: u8) -> Self {
        self.ref_subcarriers_per_rb = subcarriers;
        self
    }

    pub fn with_dl_retx_ordering(mut self, ordering: RetxOrderingKind) -> Self {
        self.dl_retx_ordering = ordering;
        self
    }
}
