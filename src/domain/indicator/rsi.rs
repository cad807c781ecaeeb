//! RSI (Relative Strength Index) indicator.
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over the first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n, i.e. factor 1/n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100 (this includes a perfectly flat window).
//!
//! Warmup: first n points are missing (n changes are needed for the seed).

use super::{Series, check_window};
use crate::domain::error::MeridianError;

pub fn rsi(series: &[f64], window: usize) -> Result<Series, MeridianError> {
    check_window("window", window, series.len())?;

    let mut values: Series = vec![None; series.len()];
    if series.len() <= window {
        return Ok(values);
    }

    let (gains, losses): (Vec<f64>, Vec<f64>) = series
        .windows(2)
        .map(|w| {
            let change = w[1] - w[0];
            (change.max(0.0), (-change).max(0.0))
        })
        .unzip();

    let n = window as f64;
    let mut avg_gain = gains[..window].iter().sum::<f64>() / n;
    let mut avg_loss = losses[..window].iter().sum::<f64>() / n;
    values[window] = Some(rsi_value(avg_gain, avg_loss));

    for i in window..gains.len() {
        avg_gain = (avg_gain * (n - 1.0) + gains[i]) / n;
        avg_loss = (avg_loss * (n - 1.0) + losses[i]) / n;
        values[i + 1] = Some(rsi_value(avg_gain, avg_loss));
    }

    Ok(values)
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}
