use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::{Indicator, volumes};
use crate::model::Candle;

/// Volume Moving Average: simple average of trading volume over a period.
///
/// The leading candles use a partial window, so every candle gets a value.
pub struct VolumeMA {
    period: usize,
}

impl VolumeMA {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        if period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "period must be > 0".into(),
            });
        }
        Ok(Self { period })
    }
}

impl Indicator for VolumeMA {
    fn name(&self) -> &str {
        "volume_ma"
    }

    fn required_candles(&self) -> usize {
        1
    }

    /// Returns volume MA values, one per candle.
    fn calculate(&self, candles: &[Candle]) -> Result<Vec<f64>, Report<IndicatorError>> {
        let vols = volumes(candles);
        if vols.is_empty() {
            bail!(IndicatorError::InsufficientData {
                required: 1,
                available: 0,
            });
        }

        let mut sum = 0.0;
        Ok(vols
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                sum += v;
                if i >= self.period {
                    sum -= vols[i - self.period];
                }
                sum / (i + 1).min(self.period) as f64
            })
            .collect())
    }
}
