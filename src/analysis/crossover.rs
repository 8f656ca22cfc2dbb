use crate::analysis::snapshot::IndicatorSnapshot;

/// Fast/slow EMA crossover state over the last two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Crossover {
    pub bullish: bool,
    pub bearish: bool,
}

impl Crossover {
    pub fn detect(snapshots: &[IndicatorSnapshot]) -> Self {
        Self {
            bullish: detect_bullish_cross(snapshots),
            bearish: detect_bearish_cross(snapshots),
        }
    }
}

/// `(fast, slow)` at the second-to-last and last index, if all four are defined.
fn last_two(snapshots: &[IndicatorSnapshot]) -> Option<((f64, f64), (f64, f64))> {
    let [.., prev, last] = snapshots else {
        return None;
    };
    Some((
        (prev.fast_ema?, prev.slow_ema?),
        (last.fast_ema?, last.slow_ema?),
    ))
}

/// Fast EMA moved from at-or-below the slow EMA to strictly above it.
pub fn detect_bullish_cross(snapshots: &[IndicatorSnapshot]) -> bool {
    last_two(snapshots).is_some_and(|((prev_fast, prev_slow), (fast, slow))| {
        fast > slow && prev_fast <= prev_slow
    })
}

/// Fast EMA moved from at-or-above the slow EMA to strictly below it.
pub fn detect_bearish_cross(snapshots: &[IndicatorSnapshot]) -> bool {
    last_two(snapshots).is_some_and(|((prev_fast, prev_slow), (fast, slow))| {
        fast < slow && prev_fast >= prev_slow
    })
}
