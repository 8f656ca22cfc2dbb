use error_stack::{Report, ResultExt};

use crate::error::IndicatorError;
use crate::indicator::Indicator;
use crate::indicator::atr::Atr;
use crate::indicator::ma::Ema;
use crate::indicator::rsi::Rsi;
use crate::indicator::volume::VolumeMA;
use crate::model::Candle;

pub const FAST_EMA_PERIOD: usize = 50;
pub const SLOW_EMA_PERIOD: usize = 200;
pub const RSI_PERIOD: usize = 14;
pub const ATR_PERIOD: usize = 14;
pub const VOLUME_MA_PERIOD: usize = 20;

/// Indicator values for one candle index. `None` means not enough history yet.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IndicatorSnapshot {
    pub fast_ema: Option<f64>,
    pub slow_ema: Option<f64>,
    pub rsi: Option<f64>,
    pub atr: Option<f64>,
    pub volume_ma: Option<f64>,
}

/// The fixed indicator set evaluated on every candle series.
pub struct IndicatorSet {
    fast_ema: Ema,
    slow_ema: Ema,
    rsi: Rsi,
    atr: Atr,
    volume_ma: VolumeMA,
}

impl IndicatorSet {
    pub fn standard() -> Result<Self, Report<IndicatorError>> {
        Ok(Self {
            fast_ema: Ema::new(FAST_EMA_PERIOD)?,
            slow_ema: Ema::new(SLOW_EMA_PERIOD)?,
            rsi: Rsi::new(RSI_PERIOD)?,
            atr: Atr::new(ATR_PERIOD)?,
            volume_ma: VolumeMA::new(VOLUME_MA_PERIOD)?,
        })
    }

    /// Compute one snapshot per candle, aligned by index.
    pub fn compute(
        &self,
        candles: &[Candle],
    ) -> Result<Vec<IndicatorSnapshot>, Report<IndicatorError>> {
        let fast_ema = aligned(&self.fast_ema, candles)?;
        let slow_ema = aligned(&self.slow_ema, candles)?;
        let rsi = aligned(&self.rsi, candles)?;
        let atr = aligned(&self.atr, candles)?;
        let volume_ma = aligned(&self.volume_ma, candles)?;

        Ok((0..candles.len())
            .map(|i| IndicatorSnapshot {
                fast_ema: fast_ema[i],
                slow_ema: slow_ema[i],
                rsi: rsi[i],
                atr: atr[i],
                volume_ma: volume_ma[i],
            })
            .collect())
    }
}

/// Run `indicator` and right-align its output against `candles`.
///
/// Too little history yields an all-`None` series instead of an error.
fn aligned(
    indicator: &dyn Indicator,
    candles: &[Candle],
) -> Result<Vec<Option<f64>>, Report<IndicatorError>> {
    if candles.len() < indicator.required_candles() {
        return Ok(vec![None; candles.len()]);
    }
    let values = indicator
        .calculate(candles)
        .attach_with(|| format!("indicator: {}", indicator.name()))?;
    Ok(align_series(candles.len(), values))
}

fn align_series(total_len: usize, values: Vec<f64>) -> Vec<Option<f64>> {
    let offset = total_len.saturating_sub(values.len());
    let mut output = vec![None; total_len];
    for (index, value) in values.into_iter().take(total_len).enumerate() {
        output[offset + index] = Some(value);
    }
    output
}
