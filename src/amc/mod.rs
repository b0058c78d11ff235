//! Adaptive modulation and coding.
//!
//! Picks a modulation/coding scheme from channel quality and sizes the
//! transport block for a resource count.
//!
//! # Modes
//!
//! - **Shannon**: per block `s = log2(1 + sinr / (-ln(5 BER) / 1.5))`,
//!   averaged over blocks with signal; the chosen scheme is the highest
//!   whose efficiency is strictly below the average.
//! - **Error model**: starting at scheme 0, climb while the first-attempt
//!   BLER at the mean SINR stays within the target (10 % by default);
//!   keep the last scheme that met it.
//!
//! # Transport block size
//!
//! The payload table gives the raw payload. A 3-byte CRC is removed once;
//! when the block is larger than one code block, one CRC per code block
//! is removed instead.
//!
//! # Reference
//! Goldsmith & Chua (1998), "Adaptive Coded Modulation for Fading
//! Channels" (the BER-gap efficiency estimate)

mod payload;
mod tables;

pub use payload::{PayloadSizeTable, SpectralPayloadTable, SUBCARRIERS_PER_RB};
pub use tables::{
    cqi_at_most, cqi_efficiency, cqi_from_efficiency, modulation_order, scheme_efficiency,
    scheme_from_cqi, scheme_from_efficiency, MAX_CQI, MAX_SCHEME,
};

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{HarqError, HarqResult};
use crate::error_model::ErrorModel;
use crate::models::{linear_to_db, ChannelQuality, Direction, Scheme};

/// CRC appended to transport and code blocks (bytes).
pub const CRC_BYTES: u32 = 3;

/// Scheme selection method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AmcMode {
    /// Closed-form efficiency estimate.
    Shannon,
    /// Iterate the error model against the BLER target.
    #[default]
    ErrorModel,
}

/// Outcome of scheme selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum McsSelection {
    /// A scheme the link can carry.
    Usable {
        scheme: Scheme,
        /// Efficiency of the chosen scheme (bits per resource element).
        spectral_efficiency: f64,
        /// Wideband channel-quality index to report.
        cqi: u8,
    },
    /// Even scheme 0 misses the BLER target.
    NoUsableScheme,
}

impl McsSelection {
    /// The chosen scheme, if any.
    pub fn scheme(&self) -> Option<Scheme> {
        match self {
            McsSelection::Usable { scheme, .. } => Some(*scheme),
            McsSelection::NoUsableScheme => None,
        }
    }

    /// Reported CQI (0 when no scheme is usable).
    pub fn cqi(&self) -> u8 {
        match self {
            McsSelection::Usable { cqi, .. } => *cqi,
            McsSelection::NoUsableScheme => 0,
        }
    }
}

/// Link adaptation unit.
#[derive(Debug, Clone)]
pub struct Amc {
    mode: AmcMode,
    error_model: Arc<dyn ErrorModel>,
    payload: Arc<dyn PayloadSizeTable>,
    reference_ber: f64,
    target_bler: f64,
    max_scheme: Scheme,
}

impl Amc {
    /// Creates an error-model AMC with the default payload table.
    pub fn new(error_model: Arc<dyn ErrorModel>) -> Self {
        let max_scheme = error_model.max_scheme().min(MAX_SCHEME);
        Self {
            mode: AmcMode::default(),
            error_model,
            payload: Arc::new(SpectralPayloadTable::default()),
            reference_ber: 0.00005,
            target_bler: 0.1,
            max_scheme,
        }
    }

    /// Sets the selection mode.
    pub fn with_mode(mut self, mode: AmcMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the payload table.
    pub fn with_payload_table(mut self, payload: Arc<dyn PayloadSizeTable>) -> Self {
        self.payload = payload;
        self
    }

    /// Sets the reference BER of the Shannon estimate.
    pub fn with_reference_ber(mut self, ber: f64) -> Self {
        self.reference_ber = ber;
        self
    }

    /// Sets the BLER target of the error-model search.
    pub fn with_target_bler(mut self, target: f64) -> Self {
        self.target_bler = target;
        self
    }

    pub fn mode(&self) -> AmcMode {
        self.mode
    }

    /// Highest selectable scheme.
    pub fn max_scheme(&self) -> Scheme {
        self.max_scheme
    }

    /// Chooses a scheme for the given quality samples.
    pub fn mcs_from_quality(&self, quality: &ChannelQuality) -> HarqResult<McsSelection> {
        match self.mode {
            AmcMode::Shannon => self.select_shannon(quality),
            AmcMode::ErrorModel => self.select_error_model(quality),
        }
    }

    /// Efficiency estimate of one linear SINR sample.
    pub fn shannon_efficiency(&self, sinr: f64) -> f64 {
        let gap = -(5.0 * self.reference_ber).ln() / 1.5;
        (1.0 + sinr / gap).log2()
    }

    fn select_shannon(&self, quality: &ChannelQuality) -> HarqResult<McsSelection> {
        let mut total = 0.0;
        let mut blocks = 0usize;
        for sinr in quality.active() {
            let s = self.shannon_efficiency(sinr);
            trace!(
                "block sinr {:.2} dB efficiency {s:.3}",
                linear_to_db(sinr)
            );
            total += s;
            blocks += 1;
        }
        let average = if blocks == 0 { 0.0 } else { total / blocks as f64 };

        let scheme = scheme_from_efficiency(average, self.max_scheme);
        let cqi = cqi_from_efficiency(average);
        debug!("shannon: mean efficiency {average:.3} -> scheme {scheme} cqi {cqi}");
        Ok(McsSelection::Usable {
            scheme,
            spectral_efficiency: scheme_efficiency(scheme)?,
            cqi,
        })
    }

    fn select_error_model(&self, quality: &ChannelQuality) -> HarqResult<McsSelection> {
        let sinr = quality.mean_linear();
        let mut best: Option<Scheme> = None;
        for scheme in 0..=self.max_scheme {
            let bler = self.error_model.lookup(scheme, 0, sinr)?;
            if bler > self.target_bler {
                break;
            }
            best = Some(scheme);
        }

        let Some(scheme) = best else {
            debug!(
                "error model: no scheme meets {:.2} at {:.2} dB",
                self.target_bler,
                linear_to_db(sinr)
            );
            return Ok(McsSelection::NoUsableScheme);
        };

        let spectral_efficiency = scheme_efficiency(scheme)?;
        let cqi = if scheme == self.max_scheme {
            MAX_CQI
        } else {
            cqi_at_most(spectral_efficiency)
        };
        debug!(
            "error model: {:.2} dB -> scheme {scheme} cqi {cqi}",
            linear_to_db(sinr)
        );
        Ok(McsSelection::Usable {
            scheme,
            spectral_efficiency,
            cqi,
        })
    }

    /// Scheme for a reported CQI.
    pub fn mcs_from_cqi(&self, cqi: u8) -> HarqResult<Scheme> {
        scheme_from_cqi(cqi, self.max_scheme)
    }

    /// Raw payload of `rb_count` blocks (bytes).
    pub fn payload_size(&self, scheme: Scheme, rb_count: u32, direction: Direction) -> HarqResult<u32> {
        self.check_scheme(scheme)?;
        self.payload.payload_size(scheme, rb_count, direction)
    }

    /// Transport block size after CRC and segmentation overhead (bytes).
    pub fn tb_size(&self, scheme: Scheme, rb_count: u32, direction: Direction) -> HarqResult<u32> {
        let payload = self.payload_size(scheme, rb_count, direction)?;
        let mut tb = if payload >= CRC_BYTES {
            payload - CRC_BYTES
        } else {
            payload
        };

        let code_block = self.payload.max_code_block_size(payload, scheme)?;
        if code_block > 0 && tb > code_block {
            let segments = tb.div_ceil(code_block);
            tb = payload.saturating_sub(segments * CRC_BYTES);
            trace!("tb of {payload} bytes split in {segments} code blocks");
        }
        debug!("scheme {scheme} blocks {rb_count} {direction}: tb {tb} bytes");
        Ok(tb)
    }

    fn check_scheme(&self, scheme: Scheme) -> HarqResult<()> {
        if scheme > self.max_scheme {
            return Err(HarqError::InvalidScheme {
                scheme,
                max: self.max_scheme,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_model::{CurveErrorModel, CurveTable};
    use crate::models::{db_to_linear, NO_SIGNAL};
    use proptest::prelude::*;

    fn amc(mode: AmcMode) -> Amc {
        let model = CurveErrorModel::new(Arc::new(CurveTable::awgn_reference()));
        Amc::new(Arc::new(model)).with_mode(mode)
    }

    #[test]
    fn test_shannon_extremes() {
        let a = amc(AmcMode::Shannon);
        let high = a.mcs_from_quality(&ChannelQuality::flat_db(40.0, 10)).unwrap();
        assert_eq!(high.scheme(), Some(28));
        assert_eq!(high.cqi(), 15);

        let low = a.mcs_from_quality(&ChannelQuality::flat_db(-20.0, 10)).unwrap();
        assert_eq!(low.scheme(), Some(0));
    }

    #[test]
    fn test_shannon_ignores_missing_samples() {
        let a = amc(AmcMode::Shannon);
        let sinr = db_to_linear(12.0);
        let with_gaps =
            ChannelQuality::from_optional(&[Some(sinr), None, Some(sinr), None]);
        let flat = ChannelQuality::from_linear(vec![sinr, sinr]);
        assert_eq!(
            a.mcs_from_quality(&with_gaps).unwrap(),
            a.mcs_from_quality(&flat).unwrap()
        );

        let silent = ChannelQuality::from_linear(vec![NO_SIGNAL; 4]);
        let sel = a.mcs_from_quality(&silent).unwrap();
        assert_eq!(sel.scheme(), Some(0));
        assert_eq!(sel.cqi(), 0);
    }

    #[test]
    fn test_shannon_strictly_below_average() {
        let a = amc(AmcMode::Shannon);
        let sel = a.mcs_from_quality(&ChannelQuality::flat_db(10.0, 4)).unwrap();
        let average = a.shannon_efficiency(db_to_linear(10.0));
        match sel {
            McsSelection::Usable {
                scheme,
                spectral_efficiency,
                ..
            } => {
                assert!(spectral_efficiency < average);
                if scheme < MAX_SCHEME {
                    assert!(scheme_efficiency(scheme + 1).unwrap() >= average);
                }
            }
            McsSelection::NoUsableScheme => panic!("shannon mode always selects"),
        }
    }

    #[test]
    fn test_error_model_extremes() {
        let a = amc(AmcMode::ErrorModel);
        let high = a.mcs_from_quality(&ChannelQuality::flat_db(30.0, 4)).unwrap();
        assert_eq!(high.scheme(), Some(28));
        assert_eq!(high.cqi(), 15);

        let low = a.mcs_from_quality(&ChannelQuality::flat_db(-20.0, 4)).unwrap();
        assert_eq!(low, McsSelection::NoUsableScheme);
        assert_eq!(low.cqi(), 0);

        let silent = ChannelQuality::from_linear(vec![NO_SIGNAL; 4]);
        assert_eq!(
            a.mcs_from_quality(&silent).unwrap(),
            McsSelection::NoUsableScheme
        );
    }

    #[test]
    fn test_tb_size_crc_and_segmentation() {
        let a = amc(AmcMode::ErrorModel);
        // 162-byte payload, single code block.
        assert_eq!(a.tb_size(10, 100, Direction::Downlink).unwrap(), 159);
        // 7631-byte payload, eight 1056-byte code blocks.
        assert_eq!(a.tb_size(28, 1000, Direction::Downlink).unwrap(), 7607);
        // Payload smaller than the CRC is left as is.
        assert_eq!(a.tb_size(0, 1, Direction::Uplink).unwrap(), 0);
    }

    #[test]
    fn test_invalid_inputs() {
        let a = amc(AmcMode::ErrorModel);
        assert!(matches!(
            a.tb_size(29, 10, Direction::Downlink),
            Err(HarqError::InvalidScheme { scheme: 29, max: 28 })
        ));
        assert!(matches!(
            a.mcs_from_cqi(16),
            Err(HarqError::OutOfRange { .. })
        ));
        assert_eq!(a.mcs_from_cqi(15).unwrap(), 28);
    }

    proptest! {
        #[test]
        fn prop_error_model_meets_target(db in -15.0f64..30.0) {
            let a = amc(AmcMode::ErrorModel);
            let model = CurveErrorModel::new(Arc::new(CurveTable::awgn_reference()));
            let sinr = db_to_linear(db);
            match a.mcs_from_quality(&ChannelQuality::from_linear(vec![sinr])).unwrap() {
                McsSelection::Usable { scheme, .. } => {
                    prop_assert!(model.lookup(scheme, 0, sinr).unwrap() <= 0.1);
                    if scheme < 28 {
                        prop_assert!(model.lookup(scheme + 1, 0, sinr).unwrap() > 0.1);
                    }
                }
                McsSelection::NoUsableScheme => {
                    prop_assert!(model.lookup(0, 0, sinr).unwrap() > 0.1);
                }
            }
        }

        #[test]
        fn prop_payload_monotonic(scheme in 0u8..28, blocks in 1u32..500) {
            let a = amc(AmcMode::Shannon);
            let base = a.payload_size(scheme, blocks, Direction::Downlink).unwrap();
            prop_assert!(a.payload_size(scheme + 1, blocks, Direction::Downlink).unwrap() >= base);
            prop_assert!(a.payload_size(scheme, blocks + 1, Direction::Downlink).unwrap() >= base);
        }
    }
}
