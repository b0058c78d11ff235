//! Channel-quality samples.
//!
//! Linear SINR per resource block of an allocation. A block without a
//! usable measurement carries the sentinel [`NO_SIGNAL`] instead of being
//! left out, so consumers never branch on absence.

use serde::{Deserialize, Serialize};

/// Linear SINR recorded for a block that carried no signal.
pub const NO_SIGNAL: f64 = 0.0;

/// Converts dB to linear.
#[inline]
pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 10.0)
}

/// Converts linear to dB (`-inf` for zero).
#[inline]
pub fn linear_to_db(linear: f64) -> f64 {
    10.0 * linear.log10()
}

/// Per-block SINR samples of one allocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelQuality {
    /// Linear SINR per block; [`NO_SIGNAL`] for missing values.
    pub samples: Vec<f64>,
}

impl ChannelQuality {
    /// Creates from linear samples. Non-finite or negative values are
    /// replaced by [`NO_SIGNAL`].
    pub fn from_linear(samples: Vec<f64>) -> Self {
        Self {
            samples: samples
                .into_iter()
                .map(|s| if s.is_finite() && s > 0.0 { s } else { NO_SIGNAL })
                .collect(),
        }
    }

    /// Creates from dB samples.
    pub fn from_db(samples_db: &[f64]) -> Self {
        Self::from_linear(samples_db.iter().map(|&db| db_to_linear(db)).collect())
    }

    /// Creates from possibly missing linear samples.
    pub fn from_optional(samples: &[Option<f64>]) -> Self {
        Self::from_linear(samples.iter().map(|s| s.unwrap_or(NO_SIGNAL)).collect())
    }

    /// Flat quality: `blocks` samples of the same dB value.
    pub fn flat_db(db: f64, blocks: usize) -> Self {
        Self::from_linear(vec![db_to_linear(db); blocks])
    }

    /// Samples that carried a signal.
    pub fn active(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied().filter(|&s| s != NO_SIGNAL)
    }

    /// Number of blocks that carried a signal.
    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    /// Mean linear SINR over blocks with signal ([`NO_SIGNAL`] if none).
    pub fn mean_linear(&self) -> f64 {
        let n = self.active_count();
        if n == 0 {
            return NO_SIGNAL;
        }
        self.active().sum::<f64>() / n as f64
    }
}
