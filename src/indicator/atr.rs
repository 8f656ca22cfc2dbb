use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::Indicator;
use crate::model::Candle;

/// Average True Range with Wilder's smoothing.
///
/// `TR = max(H-L, |H-prevC|, |L-prevC|)`; the first candle has no previous
/// close and contributes `H-L`.
pub struct Atr {
    period: usize,
}

impl Atr {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        if period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "period must be > 0".into(),
            });
        }
        Ok(Self { period })
    }
}

fn true_ranges(candles: &[Candle]) -> Vec<f64> {
    candles
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let hl = c.high - c.low;
            match i.checked_sub(1).map(|p| candles[p].close) {
                Some(prev_close) => hl
                    .max((c.high - prev_close).abs())
                    .max((c.low - prev_close).abs()),
                None => hl,
            }
        })
        .collect()
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        "atr"
    }

    fn required_candles(&self) -> usize {
        self.period
    }

    fn calculate(&self, candles: &[Candle]) -> Result<Vec<f64>, Report<IndicatorError>> {
        if candles.len() < self.period {
            bail!(IndicatorError::InsufficientData {
                required: self.period,
                available: candles.len(),
            });
        }

        let ranges = true_ranges(candles);
        let period = self.period as f64;

        let mut atr = ranges[..self.period].iter().sum::<f64>() / period;
        let mut results = Vec::with_capacity(ranges.len() - self.period + 1);
        results.push(atr);

        for &tr in &ranges[self.period..] {
            atr = (atr * (period - 1.0) + tr) / period;
            results.push(atr);
        }

        Ok(results)
    }
}
