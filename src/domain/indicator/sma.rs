//! Simple Moving Average indicator.
//!
//! SMA(n)[i] = mean(P[i-n+1..=i]). Warmup: first (n-1) points are missing.

use super::{Series, check_window, defined_run, realign};
use crate::domain::error::MeridianError;

pub fn sma(series: &[f64], window: usize) -> Result<Series, MeridianError> {
    check_window("window", window, series.len())?;
    Ok(rolling_mean(series, window))
}

/// SMA over a derived series whose leading points are missing.
///
/// Yields all-missing output when fewer than `window` points are defined.
pub(crate) fn sma_of_defined(values: &[Option<f64>], window: usize) -> Series {
    let (start, run) = defined_run(values);
    realign(values.len(), start, rolling_mean(&run, window))
}

fn rolling_mean(values: &[f64], window: usize) -> Series {
    (0..values.len())
        .map(|i| {
            if window == 0 || i + 1 < window {
                None
            } else {
                let slice = &values[i + 1 - window..=i];
                Some(slice.iter().sum::<f64>() / window as f64)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_warmup() {
        let out = sma(&[10.0, 20.0, 30.0, 40.0, 50.0], 3).unwrap();
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert!(out[2].is_some());
        assert_eq!(out.len(), 5);
    }

    #[test]
    fn sma_basic_calculation() {
        let out = sma(&[10.0, 20.0, 30.0, 40.0, 50.0], 3).unwrap();
        assert!((out[2].unwrap() - 20.0).abs() < f64::EPSILON);
        assert!((out[3].unwrap() - 30.0).abs() < f64::EPSILON);
        assert!((out[4].unwrap() - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sma_window_1_is_identity() {
        let input = [3.0, 1.5, 7.25];
        let out = sma(&input, 1).unwrap();
        assert_eq!(out, vec![Some(3.0), Some(1.5), Some(7.25)]);
    }

    #[test]
    fn sma_window_equal_to_length() {
        let out = sma(&[2.0, 4.0, 6.0], 3).unwrap();
        assert_eq!(out, vec![None, None, Some(4.0)]);
    }

    #[test]
    fn sma_zero_window() {
        let err = sma(&[1.0, 2.0], 0).unwrap_err();
        assert!(matches!(err, MeridianError::InvalidParameter { .. }));
    }

    #[test]
    fn sma_window_longer_than_series() {
        let err = sma(&[1.0, 2.0], 3).unwrap_err();
        assert!(matches!(err, MeridianError::InvalidParameter { .. }));
    }

    #[test]
    fn sma_empty_series() {
        assert!(sma(&[], 1).is_err());
    }

    #[test]
    fn sma_of_defined_skips_leading_missing() {
        let values = vec![None, None, Some(2.0), Some(4.0), Some(6.0)];
        let out = sma_of_defined(&values, 2);
        assert_eq!(out, vec![None, None, None, Some(3.0), Some(5.0)]);
    }

    #[test]
    fn sma_of_defined_short_run_is_all_missing() {
        let values = vec![None, Some(2.0)];
        let out = sma_of_defined(&values, 3);
        assert_eq!(out, vec![None, None]);
    }
}
