//! Payload-size tables.
//!
//! The payload table is a collaborator contract: the engine only
//! requires that payload size never decreases when the scheme or the
//! resource count grows, and that it reports the largest code block a
//! payload may be carried in.

use std::fmt::Debug;

use super::tables::{modulation_order, scheme_efficiency};
use crate::error::HarqResult;
use crate::models::{Direction, Scheme};

/// Subcarriers in one resource block.
pub const SUBCARRIERS_PER_RB: u32 = 12;

/// Maximum code block of LDPC base graph 1 (bytes).
const BG1_MAX_CB_BYTES: u32 = 8448 / 8;

/// Maximum code block of LDPC base graph 2 (bytes).
const BG2_MAX_CB_BYTES: u32 = 3840 / 8;

/// Payload threshold below which base graph 2 is always used (bits).
const BG2_PAYLOAD_BITS: u32 = 3824;

/// Maps scheme and resource count to payload bytes.
pub trait PayloadSizeTable: Send + Sync + Debug {
    /// Payload (bytes) of `rb_count` resource blocks at `scheme`.
    fn payload_size(&self, scheme: Scheme, rb_count: u32, direction: Direction) -> HarqResult<u32>;

    /// Largest single code block (bytes) for a payload.
    fn max_code_block_size(&self, payload_bytes: u32, scheme: Scheme) -> HarqResult<u32>;
}

/// Efficiency-driven payload table.
///
/// Payload bits are `useful subcarriers x blocks x efficiency`. Uplink,
/// downlink and sidelink share the same table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralPayloadTable {
    useful_subcarriers: u32,
}

impl SpectralPayloadTable {
    /// Creates a table with `ref_subcarriers` reference-signal subcarriers
    /// removed from every block.
    pub fn new(ref_subcarriers: u8) -> Self {
        Self {
            useful_subcarriers: SUBCARRIERS_PER_RB.saturating_sub(u32::from(ref_subcarriers)),
        }
    }

    pub fn useful_subcarriers(&self) -> u32 {
        self.useful_subcarriers
    }
}

impl Default for SpectralPayloadTable {
    fn default() -> Self {
        Self::new(1)
    }
}

impl PayloadSizeTable for SpectralPayloadTable {
    fn payload_size(&self, scheme: Scheme, rb_count: u32, _direction: Direction) -> HarqResult<u32> {
        let efficiency = scheme_efficiency(scheme)?;
        let bits = f64::from(self.useful_subcarriers) * f64::from(rb_count) * efficiency;
        Ok((bits / 8.0).floor() as u32)
    }

    fn max_code_block_size(&self, payload_bytes: u32, scheme: Scheme) -> HarqResult<u32> {
        let rate = scheme_efficiency(scheme)? / f64::from(modulation_order(scheme));
        if payload_bytes.saturating_mul(8) <= BG2_PAYLOAD_BITS || rate <= 0.25 {
            Ok(BG2_MAX_CB_BYTES)
        } else {
            Ok(BG1_MAX_CB_BYTES)
        }
    }
}
