//! Spectral-efficiency tables.
//!
//! Efficiency (bits per resource element) of every modulation/coding
//! scheme and of every channel-quality index, plus the conversions
//! between them.
//!
//! # Reference
//! 3GPP TS 36.213, Table 7.2.3-1 (CQI) and Table 7.1.7.1-1 (MCS)

use crate::error::{HarqError, HarqResult};
use crate::models::Scheme;

/// Highest scheme in the efficiency table.
pub const MAX_SCHEME: Scheme = 28;

/// Highest channel-quality index.
pub const MAX_CQI: u8 = 15;

const SCHEME_EFFICIENCY: [f64; 29] = [
    0.15, 0.19, 0.23, 0.31, 0.38, 0.49, 0.6, 0.74, 0.88, 1.03, 1.18, 1.33, 1.48, 1.7, 1.91, 2.16,
    2.41, 2.57, 2.73, 3.03, 3.32, 3.61, 3.9, 4.21, 4.52, 4.82, 5.12, 5.33, 5.55,
];

const CQI_EFFICIENCY: [f64; 16] = [
    0.0, 0.15, 0.23, 0.38, 0.6, 0.88, 1.18, 1.48, 1.91, 2.41, 2.73, 3.32, 3.9, 4.52, 5.12, 5.55,
];

/// Efficiency of a scheme.
pub fn scheme_efficiency(scheme: Scheme) -> HarqResult<f64> {
    SCHEME_EFFICIENCY
        .get(usize::from(scheme))
        .copied()
        .ok_or(HarqError::InvalidScheme {
            scheme,
            max: MAX_SCHEME,
        })
}

/// Efficiency of a channel-quality index.
pub fn cqi_efficiency(cqi: u8) -> HarqResult<f64> {
    CQI_EFFICIENCY
        .get(usize::from(cqi))
        .copied()
        .ok_or(HarqError::OutOfRange {
            quantity: "cqi",
            value: i64::from(cqi),
            min: 0,
            max: i64::from(MAX_CQI),
        })
}

/// Bits per modulation symbol of a scheme.
pub fn modulation_order(scheme: Scheme) -> u8 {
    match scheme {
        0..=9 => 2,
        10..=16 => 4,
        _ => 6,
    }
}

/// Highest CQI whose efficiency is strictly below `efficiency`.
pub fn cqi_from_efficiency(efficiency: f64) -> u8 {
    let mut cqi = 0;
    while cqi < MAX_CQI && CQI_EFFICIENCY[usize::from(cqi) + 1] < efficiency {
        cqi += 1;
    }
    cqi
}

/// Highest scheme up to `max` whose efficiency is strictly below
/// `efficiency` (scheme 0 if none is).
pub fn scheme_from_efficiency(efficiency: f64, max: Scheme) -> Scheme {
    let max = max.min(MAX_SCHEME);
    let mut scheme = 0;
    while scheme < max && SCHEME_EFFICIENCY[usize::from(scheme) + 1] < efficiency {
        scheme += 1;
    }
    scheme
}

/// Highest scheme up to `max` whose efficiency does not exceed the
/// efficiency of `cqi`.
pub fn scheme_from_cqi(cqi: u8, max: Scheme) -> HarqResult<Scheme> {
    let efficiency = cqi_efficiency(cqi)?;
    let max = max.min(MAX_SCHEME);
    let mut scheme = 0;
    while scheme < max && SCHEME_EFFICIENCY[usize::from(scheme) + 1] <= efficiency {
        scheme += 1;
    }
    Ok(scheme)
}

/// Highest CQI whose efficiency does not exceed `efficiency`.
pub fn cqi_at_most(efficiency: f64) -> u8 {
    let mut cqi = 0;
    while cqi < MAX_CQI && CQI_EFFICIENCY[usize::from(cqi) + 1] <= efficiency {
        cqi += 1;
    }
    cqi
}
