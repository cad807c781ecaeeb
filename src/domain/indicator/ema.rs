//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seed with the SMA of the first n points, then
//! EMA[i] = P[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) points are missing.

use super::{Series, check_window, defined_run, realign};
use crate::domain::error::MeridianError;

pub fn ema(series: &[f64], window: usize) -> Result<Series, MeridianError> {
    check_window("window", window, series.len())?;
    Ok(recursive_ema(series, window))
}

/// One step of the EMA recursion. Continuing a series with this function
/// from its last value gives exactly what a full recomputation would.
pub fn ema_next(prev: f64, value: f64, window: usize) -> f64 {
    let k = 2.0 / (window as f64 + 1.0);
    value * k + prev * (1.0 - k)
}

/// EMA over a derived series whose leading points are missing; the seed is
/// the SMA of the first `window` defined points.
pub(crate) fn ema_of_defined(values: &[Option<f64>], window: usize) -> Series {
    let (start, run) = defined_run(values);
    realign(values.len(), start, recursive_ema(&run, window))
}

fn recursive_ema(values: &[f64], window: usize) -> Series {
    let mut out = Vec::with_capacity(values.len());
    if window == 0 {
        out.resize(values.len(), None);
        return out;
    }

    let mut ema = 0.0;
    let mut sum = 0.0;

    for (i, &value) in values.iter().enumerate() {
        if i + 1 < window {
            sum += value;
            out.push(None);
        } else if i + 1 == window {
            sum += value;
            ema = sum / window as f64;
            out.push(Some(ema));
        } else {
            ema = ema_next(ema, value, window);
            out.push(Some(ema));
        }
    }

    out
}
