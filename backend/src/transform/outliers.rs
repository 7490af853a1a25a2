//! IQR-based outlier clamping (winsorization) of `unit_price`.
//!
//! Fences are `[Q1 - k·IQR, Q3 + k·IQR]` computed on the pre-clamp
//! distribution; values outside are moved to the nearest fence, never
//! removed.

use super::impute::CleanRow;
use super::stats::quantile;
use crate::config::TransformConfig;
use crate::models::OutlierReport;
use crate::schema::Field;

/// Inclusive fences derived from a distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IqrFences {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrFences {
    /// Compute fences; `None` when there is no value to describe.
    pub fn compute(values: &[f64], config: &TransformConfig) -> Option<Self> {
        let q1 = quantile(values, config.lower_quantile)?;
        let q3 = quantile(values, config.upper_quantile)?;
        let iqr = q3 - q1;
        Some(Self {
            q1,
            q3,
            lower: q1 - config.iqr_multiplier * iqr,
            upper: q3 + config.iqr_multiplier * iqr,
        })
    }

    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.lower, self.upper)
    }
}

/// Clamp `unit_price` of every row into its IQR fences.
pub fn clamp_unit_price(rows: &mut [CleanRow], config: &TransformConfig) -> OutlierReport {
    let prices: Vec<f64> = rows.iter().map(|r| r.unit_price).collect();
    let Some(fences) = IqrFences::compute(&prices, config) else {
        return OutlierReport {
            column: Field::UnitPrice.name().to_string(),
            ..Default::default()
        };
    };

    let mut clamped = 0;
    for row in rows.iter_mut() {
        if !fences.contains(row.unit_price) {
            row.unit_price = fences.clamp(row.unit_price);
            clamped += 1;
        }
    }

    OutlierReport {
        column: Field::UnitPrice.name().to_string(),
        q1: fences.q1,
        q3: fences.q3,
        iqr: fences.iqr(),
        lower_bound: fences.lower,
        upper_bound: fences.upper,
        clamped,
    }
}
