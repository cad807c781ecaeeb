//! Rolling standard deviation indicator.
//!
//! Population standard deviation over the trailing n points.
//! STDDEV(n)[i] = sqrt(sum((P[i-j] - SMA(n)[i])^2 for j in 0..n) / n)
//! Warmup: first (n-1) points are missing.

use super::{Series, check_window};
use crate::domain::error::MeridianError;

pub fn stddev(series: &[f64], window: usize) -> Result<Series, MeridianError> {
    check_window("window", window, series.len())?;

    let values = (0..series.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            let slice = &series[i + 1 - window..=i];
            let mean = slice.iter().sum::<f64>() / window as f64;
            let variance = slice
                .iter()
                .map(|v| {
                    let diff = v - mean;
                    diff * diff
                })
                .sum::<f64>()
                / window as f64;
            Some(variance.sqrt())
        })
        .collect();

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stddev_warmup() {
        let out = stddev(&[10.0, 20.0, 30.0, 40.0, 50.0], 3).unwrap();
        assert!(out[0].is_none());
        assert!(out[1].is_none());
        assert!(out[2..].iter().all(Option::is_some));
    }

    #[test]
    fn stddev_constant_values() {
        let out = stddev(&[100.0; 5], 3).unwrap();
        assert_eq!(out[2], Some(0.0));
        assert_eq!(out[4], Some(0.0));
    }

    #[test]
    fn stddev_basic_calculation() {
        let out = stddev(&[10.0, 20.0, 30.0], 3).unwrap();
        let mean: f64 = 20.0;
        let expected = (((10.0 - mean).powi(2) + (20.0 - mean).powi(2) + (30.0 - mean).powi(2))
            / 3.0)
            .sqrt();
        assert!((out[2].unwrap() - expected).abs() < 1e-10);
    }

    #[test]
    fn stddev_known_values() {
        let out = stddev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 8).unwrap();
        assert!((out[7].unwrap() - 2.0).abs() < 1e-10);
    }

    #[test]
    fn stddev_invalid_window() {
        assert!(stddev(&[1.0], 2).is_err());
    }
}
