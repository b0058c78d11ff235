//! Empirical BLER curves.
//!
//! Each row maps SINR to block error rate for one (scheme, attempt) pair.
//! Samples sit on a uniform dB grid `[min_db, max_db]` with spacing
//! `step_db`; values between grid points are interpolated linearly in
//! linear-SINR space.
//!
//! # Layout
//!
//! Rows are stored scheme-major: `index = scheme * depth + attempt`, where
//! `depth` is the number of transmission attempts covered per scheme.
//! Attempts at or beyond `depth` use the deepest row.
//!
//! The table is immutable after construction and is meant to be shared
//! through an `Arc`.

use log::trace;
use serde::{Deserialize, Serialize};

use crate::error::{HarqError, HarqResult};
use crate::models::{db_to_linear, linear_to_db, Scheme};

/// Number of schemes in the reference table.
pub const REFERENCE_SCHEMES: u8 = 29;

/// Attempts covered per scheme in the reference table.
pub const REFERENCE_DEPTH: u8 = 4;

const REFERENCE_STEP_DB: f64 = 0.2;
const REFERENCE_POINTS: usize = 17;
const REFERENCE_SLOPE_DB: f64 = 0.3;

/// One sampled curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveRow {
    pub scheme: Scheme,
    pub attempt: u8,
    /// SINR of the first sample (dB).
    pub min_db: f64,
    /// SINR of the last sample (dB).
    pub max_db: f64,
    /// Grid spacing (dB).
    pub step_db: f64,
    /// BLER per grid point, from worst to best quality.
    pub bler: Vec<f64>,
}

impl CurveRow {
    /// Linear SINR of grid point `index`.
    #[inline]
    fn sinr_at(&self, index: usize) -> f64 {
        db_to_linear(self.min_db + index as f64 * self.step_db)
    }

    /// BLER at a linear SINR.
    ///
    /// Below the first grid point the block always fails (1.0); above the
    /// last it always succeeds (0.0).
    pub fn bler_at(&self, sinr: f64) -> f64 {
        let sinr_db = linear_to_db(sinr);
        // NaN and -inf land here too.
        if !(sinr_db >= self.min_db) {
            return 1.0;
        }
        if sinr_db > self.max_db {
            return 0.0;
        }

        let last = self.bler.len() - 1;
        let pos = (sinr_db - self.min_db) / self.step_db;
        let i1 = (pos.floor() as usize).min(last);
        let i2 = (pos.ceil() as usize).min(last);
        if i1 == i2 {
            return self.bler[i1];
        }

        let (s1, s2) = (self.sinr_at(i1), self.sinr_at(i2));
        let (b1, b2) = (self.bler[i1], self.bler[i2]);
        let bler = b1 + (b2 - b1) * (sinr - s1) / (s2 - s1);
        bler.clamp(b2, b1)
    }

    /// Linear SINR at which the curve reaches `bler`.
    ///
    /// Scans from the worst grid point for the first sample at or below
    /// the target and interpolates against its predecessor. Targets below
    /// the last sample map to the last grid point.
    pub fn sinr_for(&self, bler: f64) -> f64 {
        let Some(index) = self.bler.iter().position(|&b| b <= bler) else {
            return self.sinr_at(self.bler.len() - 1);
        };

        if index > 0 && self.bler[index] < bler {
            let (s1, s2) = (self.sinr_at(index - 1), self.sinr_at(index));
            let (b1, b2) = (self.bler[index - 1], self.bler[index]);
            s1 + (bler - b1) * (s2 - s1) / (b2 - b1)
        } else {
            self.sinr_at(index)
        }
    }

    fn validate(&self) -> HarqResult<()> {
        let id = format!("scheme {} attempt {}", self.scheme, self.attempt);
        if !(self.step_db > 0.0) {
            return Err(HarqError::curve(format!("{id}: step must be positive")));
        }
        if !(self.max_db > self.min_db) {
            return Err(HarqError::curve(format!("{id}: empty SINR range")));
        }
        let expected = ((self.max_db - self.min_db) / self.step_db).round() as usize + 1;
        if self.bler.len() != expected {
            return Err(HarqError::curve(format!(
                "{id}: {} samples, grid needs {expected}",
                self.bler.len()
            )));
        }
        if self.bler.iter().any(|b| !(0.0..=1.0).contains(b)) {
            return Err(HarqError::curve(format!("{id}: BLER outside [0, 1]")));
        }
        if self.bler.windows(2).any(|w| w[1] > w[0]) {
            return Err(HarqError::curve(format!(
                "{id}: BLER must not increase with SINR"
            )));
        }
        Ok(())
    }
}

/// Immutable (scheme, attempt) → curve mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveTable {
    depth: u8,
    max_scheme: Scheme,
    rows: Vec<CurveRow>,
}

impl CurveTable {
    /// Builds a table from rows in any order.
    ///
    /// Every scheme `0..=max` must have exactly `depth` rows, one per
    /// attempt, and every row must be a well-formed curve.
    pub fn from_rows(mut rows: Vec<CurveRow>) -> HarqResult<Self> {
        if rows.is_empty() {
            return Err(HarqError::curve("no rows"));
        }
        let max_scheme = rows.iter().map(|r| r.scheme).max().unwrap_or(0);
        let depth = rows
            .iter()
            .map(|r| r.attempt)
            .max()
            .unwrap_or(0)
            .checked_add(1)
            .ok_or_else(|| HarqError::curve("attempt index 255 exceeds curve depth"))?;
        let expected = (usize::from(max_scheme) + 1) * usize::from(depth);
        if rows.len() != expected {
            return Err(HarqError::curve(format!(
                "{} rows for {} schemes x {} attempts",
                rows.len(),
                usize::from(max_scheme) + 1,
                depth
            )));
        }

        rows.sort_by_key(|r| (r.scheme, r.attempt));
        for (i, row) in rows.iter().enumerate() {
            let scheme = (i / usize::from(depth)) as u8;
            let attempt = (i % usize::from(depth)) as u8;
            if row.scheme != scheme || row.attempt != attempt {
                return Err(HarqError::curve(format!(
                    "missing row for scheme {scheme} attempt {attempt}"
                )));
            }
            row.validate()?;
        }

        Ok(Self {
            depth,
            max_scheme,
            rows,
        })
    }

    /// Reference AWGN table: 29 schemes, 4 attempts, 0.2 dB grid.
    ///
    /// Each row is a logistic waterfall whose midpoint rises with the
    /// scheme and drops by the combining gain `10 log10(attempt + 1)` on
    /// every retransmission. The first sample is pinned to 1 and the last
    /// to 0.
    pub fn awgn_reference() -> Self {
        let mut rows = Vec::with_capacity(usize::from(REFERENCE_SCHEMES) * usize::from(REFERENCE_DEPTH));
        for scheme in 0..REFERENCE_SCHEMES {
            for attempt in 0..REFERENCE_DEPTH {
                let center =
                    -6.0 + 0.85 * f64::from(scheme) - 10.0 * f64::from(attempt + 1).log10();
                let half_span = REFERENCE_STEP_DB * (REFERENCE_POINTS - 1) as f64 / 2.0;
                let min_db = ((center - half_span) / REFERENCE_STEP_DB).round() * REFERENCE_STEP_DB;
                let bler = (0..REFERENCE_POINTS)
                    .map(|i| {
                        if i == 0 {
                            1.0
                        } else if i == REFERENCE_POINTS - 1 {
                            0.0
                        } else {
                            let db = min_db + i as f64 * REFERENCE_STEP_DB;
                            1.0 / (1.0 + ((db - center) / REFERENCE_SLOPE_DB).exp())
                        }
                    })
                    .collect();
                rows.push(CurveRow {
                    scheme,
                    attempt,
                    min_db,
                    max_db: min_db + (REFERENCE_POINTS - 1) as f64 * REFERENCE_STEP_DB,
                    step_db: REFERENCE_STEP_DB,
                    bler,
                });
            }
        }
        Self {
            depth: REFERENCE_DEPTH,
            max_scheme: REFERENCE_SCHEMES - 1,
            rows,
        }
    }

    /// Highest scheme covered.
    pub fn max_scheme(&self) -> Scheme {
        self.max_scheme
    }

    /// Attempts covered per scheme.
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Curve for a scheme and attempt (attempt clamped to the depth).
    pub fn row(&self, scheme: Scheme, attempt: usize) -> HarqResult<&CurveRow> {
        if scheme > self.max_scheme {
            return Err(HarqError::InvalidScheme {
                scheme,
                max: self.max_scheme,
            });
        }
        let covered = usize::from(self.depth) - 1;
        if attempt > covered {
            trace!("attempt {attempt} clamped to {covered} for scheme {scheme}");
        }
        let index = usize::from(scheme) * usize::from(self.depth) + attempt.min(covered);
        Ok(&self.rows[index])
    }

    /// BLER for a linear SINR.
    pub fn lookup(&self, scheme: Scheme, attempt: usize, sinr: f64) -> HarqResult<f64> {
        Ok(self.row(scheme, attempt)?.bler_at(sinr))
    }

    /// Linear SINR reaching a BLER.
    pub fn inverse_lookup(&self, scheme: Scheme, attempt: usize, bler: f64) -> HarqResult<f64> {
        Ok(self.row(scheme, attempt)?.sinr_for(bler))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(bler: Vec<f64>) -> CurveRow {
        let n = bler.len();
        CurveRow {
            scheme: 0,
            attempt: 0,
            min_db: 0.0,
            max_db: (n - 1) as f64,
            step_db: 1.0,
            bler,
        }
    }

    #[test]
    fn test_saturation() {
        let table = CurveTable::awgn_reference();
        let r = table.row(10, 0).unwrap();
        assert_eq!(r.bler_at(db_to_linear(r.min_db - 0.1)), 1.0);
        assert_eq!(r.bler_at(db_to_linear(r.max_db + 0.1)), 0.0);
        assert_eq!(r.bler_at(0.0), 1.0);
        assert_eq!(r.bler_at(f64::NAN), 1.0);
    }

    #[test]
    fn test_interpolation_between_points() {
        let r = row(vec![1.0, 0.5, 0.0]);
        // Grid points hit exactly.
        assert!((r.bler_at(db_to_linear(1.0)) - 0.5).abs() < 1e-9);
        // Midway in linear SINR between 0 dB and 1 dB.
        let mid = (db_to_linear(0.0) + db_to_linear(1.0)) / 2.0;
        assert!((r.bler_at(mid) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_inverse_lookup() {
        let r = row(vec![1.0, 0.5, 0.0]);
        assert!((r.sinr_for(0.5) - db_to_linear(1.0)).abs() < 1e-9);
        let s = r.sinr_for(0.75);
        assert!((r.bler_at(s) - 0.75).abs() < 1e-9);
        // Target below every sample except the last.
        assert!((r.sinr_for(0.0) - db_to_linear(2.0)).abs() < 1e-9);
    }

    #[test]
    fn test_reference_layout() {
        let table = CurveTable::awgn_reference();
        assert_eq!(table.max_scheme(), 28);
        assert_eq!(table.depth(), 4);
        let r = table.row(7, 2).unwrap();
        assert_eq!((r.scheme, r.attempt), (7, 2));
        assert_eq!(r.bler.len(), REFERENCE_POINTS);
        assert_eq!(r.bler[0], 1.0);
        assert_eq!(*r.bler.last().unwrap(), 0.0);
    }

    #[test]
    fn test_attempt_clamp() {
        let table = CurveTable::awgn_reference();
        let deepest = table.row(5, 3).unwrap();
        assert_eq!(table.row(5, 9).unwrap(), deepest);
    }

    #[test]
    fn test_invalid_scheme() {
        let table = CurveTable::awgn_reference();
        assert_eq!(
            table.lookup(29, 0, 1.0),
            Err(HarqError::InvalidScheme { scheme: 29, max: 28 })
        );
    }

    #[test]
    fn test_retransmission_rows_need_less_sinr() {
        let table = CurveTable::awgn_reference();
        let first = table.inverse_lookup(12, 0, 0.1).unwrap();
        let second = table.inverse_lookup(12, 1, 0.1).unwrap();
        assert!(second < first);
    }

    #[test]
    fn test_from_rows_validation() {
        let good = row(vec![1.0, 0.5, 0.0]);
        assert!(CurveTable::from_rows(vec![good.clone()]).is_ok());

        let mut rising = good.clone();
        rising.bler = vec![0.5, 1.0, 0.0];
        assert!(matches!(
            CurveTable::from_rows(vec![rising]),
            Err(HarqError::InvalidCurve(_))
        ));

        let mut short = good.clone();
        short.bler = vec![1.0, 0.0];
        assert!(CurveTable::from_rows(vec![short]).is_err());

        // Schemes 0 and 2 without 1.
        let mut gap = good.clone();
        gap.scheme = 2;
        assert!(matches!(
            CurveTable::from_rows(vec![good.clone(), gap]),
            Err(HarqError::InvalidCurve(_))
        ));

        let mut pair = good.clone();
        pair.scheme = 1;
        assert!(CurveTable::from_rows(vec![good, pair]).is_ok());

        assert!(CurveTable::from_rows(Vec::new()).is_err());
    }

    #[test]
    fn test_from_rows_rejects_last_attempt_index() {
        let mut deep = row(vec![1.0, 0.5, 0.0]);
        deep.attempt = u8::MAX;
        assert!(matches!(
            CurveTable::from_rows(vec![deep]),
            Err(HarqError::InvalidCurve(_))
        ));
    }

    #[test]
    fn test_from_rows_sorts() {
        let mut a = row(vec![1.0, 0.5, 0.0]);
        let mut b = a.clone();
        a.attempt = 1;
        b.attempt = 0;
        let table = CurveTable::from_rows(vec![a, b]).unwrap();
        assert_eq!(table.depth(), 2);
        assert_eq!(table.row(0, 1).unwrap().attempt, 1);
    }
}
