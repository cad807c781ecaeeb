//! Technical indicator implementations.
//!
//! Every indicator is a pure function from one or more input series to one or
//! more output series of the same length. Output index `i` lines up with input
//! index `i`; points without enough history are `None`.
//!
//! - `Series`: an aligned output series with missing warmup points
//! - `IndicatorKind`: indicator identity + parameters, parsed from `SMA(20)` style strings
//! - `compute`: evaluate an `IndicatorKind` against a price table into named columns

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod stddev;
pub mod stochastic;

pub use bollinger::{BollingerBands, bollinger_bands};
pub use ema::{ema, ema_next};
pub use macd::{MacdSeries, macd};
pub use rsi::rsi;
pub use sma::sma;
pub use stddev::stddev;
pub use stochastic::{StochasticSeries, stochastic};

use std::fmt;
use std::str::FromStr;

use crate::domain::error::MeridianError;
use crate::domain::ohlcv::PriceTable;

/// Largest accepted Bollinger `num_std`, in hundredths.
const MAX_NUM_STD_X100: u32 = 100_000;

/// Output series. `None` marks a point with insufficient history.
pub type Series = Vec<Option<f64>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorKind {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Bollinger {
        window: usize,
        num_std_x100: u32,
    },
    Stochastic {
        k_window: usize,
        d_window: usize,
    },
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorKind::Sma(window) => write!(f, "SMA({})", window),
            IndicatorKind::Ema(window) => write!(f, "EMA({})", window),
            IndicatorKind::Rsi(window) => write!(f, "RSI({})", window),
            IndicatorKind::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorKind::Bollinger {
                window,
                num_std_x100,
            } => {
                let num_std = *num_std_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", window, num_std)
            }
            IndicatorKind::Stochastic { k_window, d_window } => {
                write!(f, "STOCHASTIC({},{})", k_window, d_window)
            }
        }
    }
}

impl FromStr for IndicatorKind {
    type Err = MeridianError;

    /// Parses `NAME` or `NAME(a,b,...)`, case-insensitive. Omitted arguments
    /// fall back to the conventional defaults.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let (name, args) = match text.find('(') {
            Some(open) => {
                let inner = text[open + 1..]
                    .strip_suffix(')')
                    .ok_or_else(|| parse_error(text, "missing closing parenthesis"))?;
                let args = inner
                    .split(',')
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(|a| {
                        a.parse::<f64>()
                            .map_err(|_| parse_error(text, &format!("'{}' is not a number", a)))
                    })
                    .collect::<Result<Vec<f64>, _>>()?;
                (text[..open].trim().to_uppercase(), args)
            }
            None => (text.to_uppercase(), Vec::new()),
        };

        let window_arg = |idx: usize, default: usize| -> Result<usize, MeridianError> {
            match args.get(idx) {
                None => Ok(default),
                Some(&v) if v >= 1.0 && v.fract() == 0.0 => Ok(v as usize),
                Some(&v) => Err(parse_error(text, &format!("{} is not a positive integer", v))),
            }
        };

        let max_args = match name.as_str() {
            "SMA" | "EMA" | "RSI" => 1,
            "MACD" => 3,
            "BOLLINGER" | "BB" | "STOCHASTIC" | "STOCH" => 2,
            _ => return Err(parse_error(text, "unknown indicator")),
        };
        if args.len() > max_args {
            return Err(parse_error(
                text,
                &format!("expected at most {} arguments", max_args),
            ));
        }

        match name.as_str() {
            "SMA" => Ok(IndicatorKind::Sma(window_arg(0, 20)?)),
            "EMA" => Ok(IndicatorKind::Ema(window_arg(0, 20)?)),
            "RSI" => Ok(IndicatorKind::Rsi(window_arg(0, 14)?)),
            "MACD" => Ok(IndicatorKind::Macd {
                fast: window_arg(0, macd::DEFAULT_FAST)?,
                slow: window_arg(1, macd::DEFAULT_SLOW)?,
                signal: window_arg(2, macd::DEFAULT_SIGNAL)?,
            }),
            "BOLLINGER" | "BB" => {
                let num_std = args.get(1).copied().unwrap_or(bollinger::DEFAULT_NUM_STD);
                if !num_std.is_finite() || num_std < 0.0 {
                    return Err(parse_error(text, "num_std must be non-negative"));
                }
                let hundredths = (num_std * 100.0).round();
                if (num_std * 100.0 - hundredths).abs() > 1e-6 {
                    return Err(parse_error(text, "num_std allows at most two decimal places"));
                }
                if hundredths > f64::from(MAX_NUM_STD_X100) {
                    return Err(parse_error(text, "num_std is too large"));
                }
                Ok(IndicatorKind::Bollinger {
                    window: window_arg(0, bollinger::DEFAULT_WINDOW)?,
                    num_std_x100: hundredths as u32,
                })
            }
            _ => Ok(IndicatorKind::Stochastic {
                k_window: window_arg(0, stochastic::DEFAULT_K_WINDOW)?,
                d_window: window_arg(1, stochastic::DEFAULT_D_WINDOW)?,
            }),
        }
    }
}

fn parse_error(text: &str, reason: &str) -> MeridianError {
    MeridianError::invalid_parameter("indicator", format!("{}: {}", text, reason))
}

/// Evaluate `kind` over a price table, returning one named column per output series.
pub fn compute(
    kind: IndicatorKind,
    table: &PriceTable,
) -> Result<Vec<(String, Series)>, MeridianError> {
    let name = kind.to_string();
    let closes = table.closes();
    let columns = match kind {
        IndicatorKind::Sma(window) => vec![(name, sma(&closes, window)?)],
        IndicatorKind::Ema(window) => vec![(name, ema(&closes, window)?)],
        IndicatorKind::Rsi(window) => vec![(name, rsi(&closes, window)?)],
        IndicatorKind::Macd { fast, slow, signal } => {
            let out = macd(&closes, fast, slow, signal)?;
            vec![
                (format!("{}.line", name), out.line),
                (format!("{}.signal", name), out.signal),
                (format!("{}.histogram", name), out.histogram),
            ]
        }
        IndicatorKind::Bollinger {
            window,
            num_std_x100,
        } => {
            let out = bollinger_bands(&closes, window, num_std_x100 as f64 / 100.0)?;
            vec![
                (format!("{}.upper", name), out.upper),
                (format!("{}.middle", name), out.middle),
                (format!("{}.lower", name), out.lower),
            ]
        }
        IndicatorKind::Stochastic { k_window, d_window } => {
            let out = stochastic(&table.highs(), &table.lows(), &closes, k_window, d_window)?;
            vec![
                (format!("{}.k", name), out.k),
                (format!("{}.d", name), out.d),
            ]
        }
    };
    Ok(columns)
}

/// Reject a zero window or one longer than the input.
pub(crate) fn check_window(name: &str, window: usize, len: usize) -> Result<(), MeridianError> {
    if window == 0 {
        return Err(MeridianError::invalid_parameter(name, "must be positive"));
    }
    if window > len {
        return Err(MeridianError::invalid_parameter(
            name,
            format!("{} exceeds series length {}", window, len),
        ));
    }
    Ok(())
}

/// Split a derived series into its leading-missing prefix length and the
/// contiguous run of defined values that follows.
pub(crate) fn defined_run(values: &[Option<f64>]) -> (usize, Vec<f64>) {
    let start = values.iter().position(Option::is_some).unwrap_or(values.len());
    let run = values[start..].iter().map_while(|v| *v).collect();
    (start, run)
}

/// Re-embed a series computed over `defined_run` output back at its offset.
pub(crate) fn realign(total: usize, start: usize, inner: Series) -> Series {
    let mut out = vec![None; start];
    out.extend(inner);
    out.resize(total, None);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::PriceBar;
    use chrono::NaiveDate;

    fn table(prices: &[f64]) -> PriceTable {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let bars = prices
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                timestamp: start + chrono::Duration::days(i as i64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1000.0,
            })
            .collect();
        PriceTable::new(bars).unwrap()
    }

    #[test]
    fn kind_display_sma() {
        assert_eq!(IndicatorKind::Sma(20).to_string(), "SMA(20)");
    }

    #[test]
    fn kind_display_macd() {
        let kind = IndicatorKind::Macd {
            fast: 12,
            slow: 26,
            signal: 9,
        };
        assert_eq!(kind.to_string(), "MACD(12,26,9)");
    }

    #[test]
    fn kind_display_bollinger() {
        let kind = IndicatorKind::Bollinger {
            window: 20,
            num_std_x100: 250,
        };
        assert_eq!(kind.to_string(), "BOLLINGER(20,2.5)");
    }

    #[test]
    fn parse_round_trips_display() {
        for text in ["SMA(20)", "EMA(5)", "RSI(14)", "MACD(12,26,9)", "STOCHASTIC(14,3)"] {
            let kind: IndicatorKind = text.parse().unwrap();
            assert_eq!(kind.to_string(), text);
        }
    }

    #[test]
    fn parse_applies_defaults() {
        assert_eq!("rsi".parse::<IndicatorKind>().unwrap(), IndicatorKind::Rsi(14));
        assert_eq!(
            "MACD".parse::<IndicatorKind>().unwrap(),
            IndicatorKind::Macd {
                fast: 12,
                slow: 26,
                signal: 9
            }
        );
        assert_eq!(
            "bb(10)".parse::<IndicatorKind>().unwrap(),
            IndicatorKind::Bollinger {
                window: 10,
                num_std_x100: 200
            }
        );
        assert_eq!(
            "stoch".parse::<IndicatorKind>().unwrap(),
            IndicatorKind::Stochastic {
                k_window: 14,
                d_window: 3
            }
        );
    }

    #[test]
    fn parse_bollinger_width_precision() {
        assert_eq!(
            "BOLLINGER(20,2.55)".parse::<IndicatorKind>().unwrap(),
            IndicatorKind::Bollinger {
                window: 20,
                num_std_x100: 255
            }
        );
        for text in ["BOLLINGER(20,2.555)", "BOLLINGER(20,1e12)", "BOLLINGER(20,-1)"] {
            let err = text.parse::<IndicatorKind>().unwrap_err();
            assert!(matches!(err, MeridianError::InvalidParameter { .. }), "{}", text);
        }
    }

    #[test]
    fn parse_rejects_unknown_name() {
        let err = "VWAP(3)".parse::<IndicatorKind>().unwrap_err();
        assert!(matches!(err, MeridianError::InvalidParameter { .. }));
    }

    #[test]
    fn parse_rejects_fractional_window() {
        assert!("SMA(2.5)".parse::<IndicatorKind>().is_err());
        assert!("SMA(0)".parse::<IndicatorKind>().is_err());
        assert!("SMA(abc)".parse::<IndicatorKind>().is_err());
        assert!("SMA(3".parse::<IndicatorKind>().is_err());
    }

    #[test]
    fn parse_rejects_extra_arguments() {
        assert!("SMA(3,4)".parse::<IndicatorKind>().is_err());
    }

    #[test]
    fn kind_hash_eq() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(IndicatorKind::Sma(20), "sma20");
        map.insert(IndicatorKind::Ema(20), "ema20");

        assert_eq!(map.get(&IndicatorKind::Sma(20)), Some(&"sma20"));
        assert_eq!(map.get(&IndicatorKind::Ema(20)), Some(&"ema20"));
        assert_eq!(map.get(&IndicatorKind::Sma(50)), None);
    }

    #[test]
    fn compute_names_columns() {
        let t = table(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let cols = compute(
            IndicatorKind::Bollinger {
                window: 3,
                num_std_x100: 200,
            },
            &t,
        )
        .unwrap();
        let names: Vec<&str> = cols.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec!["BOLLINGER(3,2).upper", "BOLLINGER(3,2).middle", "BOLLINGER(3,2).lower"]
        );
        assert!(cols.iter().all(|(_, s)| s.len() == 5));
    }

    #[test]
    fn compute_propagates_parameter_errors() {
        let t = table(&[1.0, 2.0]);
        assert!(compute(IndicatorKind::Sma(5), &t).is_err());
    }

    #[test]
    fn check_window_bounds() {
        assert!(check_window("window", 0, 10).is_err());
        assert!(check_window("window", 11, 10).is_err());
        assert!(check_window("window", 10, 10).is_ok());
    }

    #[test]
    fn defined_run_and_realign() {
        let values = vec![None, None, Some(1.0), Some(2.0), Some(3.0)];
        let (start, run) = defined_run(&values);
        assert_eq!(start, 2);
        assert_eq!(run, vec![1.0, 2.0, 3.0]);

        let back = realign(5, start, vec![None, Some(9.0)]);
        assert_eq!(back, vec![None, None, None, Some(9.0), None]);
    }
}
