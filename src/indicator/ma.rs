use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::{Indicator, close_prices};
use crate::model::Candle;

/// Exponential Moving Average over close prices, `k = 2 / (period + 1)`.
///
/// The average starts at the first close and runs over the whole series;
/// values before index `period - 1` are warm-up and are not returned.
pub struct Ema {
    period: usize,
}

impl Ema {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        if period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "period must be > 0".into(),
            });
        }
        Ok(Self { period })
    }

    fn smooth(&self, prices: &[f64]) -> Result<Vec<f64>, Report<IndicatorError>> {
        if prices.len() < self.period {
            bail!(IndicatorError::InsufficientData {
                required: self.period,
                available: prices.len(),
            });
        }

        let k = 2.0 / (self.period as f64 + 1.0);
        let mut ema = prices[0];
        let mut results = Vec::with_capacity(prices.len() - self.period + 1);
        for (index, &price) in prices.iter().enumerate() {
            if index > 0 {
                ema = price * k + ema * (1.0 - k);
            }
            if index + 1 >= self.period {
                results.push(ema);
            }
        }

        Ok(results)
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        "ema"
    }

    fn required_candles(&self) -> usize {
        self.period
    }

    fn calculate(&self, candles: &[Candle]) -> Result<Vec<f64>, Report<IndicatorError>> {
        self.smooth(&close_prices(candles))
    }
}
