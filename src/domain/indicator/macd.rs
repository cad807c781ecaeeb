//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line, seeded once the line is defined
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Warmup: max(fast, slow) - 1 points for the line, plus signal - 1 for
//! the signal line and histogram.

use super::ema::ema_of_defined;
use super::{Series, check_window, ema};
use crate::domain::error::MeridianError;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub line: Series,
    pub signal: Series,
    pub histogram: Series,
}

pub fn macd(
    series: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> Result<MacdSeries, MeridianError> {
    check_window("fast", fast, series.len())?;
    check_window("slow", slow, series.len())?;
    check_window("signal", signal, series.len())?;

    let ema_fast = ema(series, fast)?;
    let ema_slow = ema(series, slow)?;

    let line: Series = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();

    let signal_line = ema_of_defined(&line, signal);

    let histogram = line
        .iter()
        .zip(&signal_line)
        .map(|(l, s)| Some((*l)? - (*s)?))
        .collect();

    Ok(MacdSeries {
        line,
        signal: signal_line,
        histogram,
    })
}
