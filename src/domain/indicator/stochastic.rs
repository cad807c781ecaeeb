//! Stochastic oscillator.
//!
//! %K = 100 × (C - LL(k)) / (HH(k) - LL(k)), where HH/LL are the highest high
//! and lowest low over the trailing k points. A flat window (HH == LL) yields
//! %K = 50, the midpoint of the range.
//! %D = SMA(d) of %K.
//!
//! Default parameters: k_window=14, d_window=3
//! Warmup: k-1 points for %K, k+d-2 points for %D.

use super::sma::sma_of_defined;
use super::{Series, check_window};
use crate::domain::error::MeridianError;

pub const DEFAULT_K_WINDOW: usize = 14;
pub const DEFAULT_D_WINDOW: usize = 3;

const FLAT_RANGE_K: f64 = 50.0;

#[derive(Debug, Clone, PartialEq)]
pub struct StochasticSeries {
    pub k: Series,
    pub d: Series,
}

pub fn stochastic(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    k_window: usize,
    d_window: usize,
) -> Result<StochasticSeries, MeridianError> {
    let len = close.len();
    for other in [high.len(), low.len()] {
        if other != len {
            return Err(MeridianError::DimensionMismatch {
                expected: len,
                actual: other,
            });
        }
    }
    check_window("k_window", k_window, len)?;
    check_window("d_window", d_window, len)?;

    let k: Series = (0..len)
        .map(|i| {
            if i + 1 < k_window {
                return None;
            }
            let start = i + 1 - k_window;
            let highest = high[start..=i].iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let lowest = low[start..=i].iter().copied().fold(f64::INFINITY, f64::min);
            let range = highest - lowest;
            if range == 0.0 {
                Some(FLAT_RANGE_K)
            } else {
                Some(100.0 * (close[i] - lowest) / range)
            }
        })
        .collect();

    let d = sma_of_defined(&k, d_window);

    Ok(StochasticSeries { k, d })
}
