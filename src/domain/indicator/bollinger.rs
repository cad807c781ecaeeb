//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n points
//! - Upper: Middle + (num_std × StdDev)
//! - Lower: Middle - (num_std × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//!
//! Default parameters: window=20, num_std=2.0
//! Warmup: first (window-1) points are missing.

use super::{Series, sma, stddev};
use crate::domain::error::MeridianError;

pub const DEFAULT_WINDOW: usize = 20;
pub const DEFAULT_NUM_STD: f64 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub upper: Series,
    pub middle: Series,
    pub lower: Series,
}

impl BollingerBands {
    /// upper - lower at each point.
    pub fn bandwidth(&self) -> Series {
        self.upper
            .iter()
            .zip(&self.lower)
            .map(|(u, l)| Some((*u)? - (*l)?))
            .collect()
    }
}

pub fn bollinger_bands(
    series: &[f64],
    window: usize,
    num_std: f64,
) -> Result<BollingerBands, MeridianError> {
    if !num_std.is_finite() || num_std < 0.0 {
        return Err(MeridianError::invalid_parameter(
            "num_std",
            "must be a non-negative number",
        ));
    }

    let middle = sma(series, window)?;
    let deviation = stddev(series, window)?;

    let mut upper = Vec::with_capacity(series.len());
    let mut lower = Vec::with_capacity(series.len());
    for (m, sd) in middle.iter().zip(&deviation) {
        match (m, sd) {
            (Some(m), Some(sd)) => {
                upper.push(Some(m + num_std * sd));
                lower.push(Some(m - num_std * sd));
            }
            _ => {
                upper.push(None);
                lower.push(None);
            }
        }
    }

    Ok(BollingerBands {
        upper,
        middle,
        lower,
    })
}
