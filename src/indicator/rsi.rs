use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::{Indicator, close_prices};
use crate::model::Candle;

/// RSI (Relative Strength Index) using Wilder's smoothing (`alpha = 1 / period`).
///
/// The first candle counts as an unchanged close and both averages start at
/// that zero move. Values before index `period - 1` are warm-up and are not
/// returned.
pub struct Rsi {
    period: usize,
}

impl Rsi {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        if period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "period must be > 0".into(),
            });
        }
        Ok(Self { period })
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        "rsi"
    }

    fn required_candles(&self) -> usize {
        self.period
    }

    fn calculate(&self, candles: &[Candle]) -> Result<Vec<f64>, Report<IndicatorError>> {
        let prices = close_prices(candles);
        if prices.len() < self.required_candles() {
            bail!(IndicatorError::InsufficientData {
                required: self.required_candles(),
                available: prices.len(),
            });
        }

        let deltas = std::iter::once(0.0_f64).chain(prices.windows(2).map(|w| w[1] - w[0]));
        let alpha = 1.0 / self.period as f64;
        let (mut avg_gain, mut avg_loss) = (0.0_f64, 0.0_f64);
        let mut results = Vec::with_capacity(prices.len() - self.period + 1);

        for (index, delta) in deltas.enumerate() {
            avg_gain = alpha * delta.max(0.0) + (1.0 - alpha) * avg_gain;
            avg_loss = alpha * (-delta).max(0.0) + (1.0 - alpha) * avg_loss;
            if index + 1 >= self.period {
                results.push(rsi_value(avg_gain, avg_loss));
            }
        }

        Ok(results)
    }
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    (100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
}
