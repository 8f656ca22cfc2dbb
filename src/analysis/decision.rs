use serde::Deserialize;

use crate::analysis::crossover::Crossover;
use crate::analysis::snapshot::IndicatorSnapshot;
use crate::model::{AnalysisResult, Candle, Verdict, round_price};

/// Momentum used when RSI has no value yet.
pub const NEUTRAL_MOMENTUM: f64 = 50.0;
/// Fraction of the entry price used as volatility when ATR has no value yet.
pub const FALLBACK_VOLATILITY_RATIO: f64 = 0.002;

fn default_rsi_long_below() -> f64 {
    40.0
}

fn default_rsi_short_above() -> f64 {
    60.0
}

fn default_volume_multiplier() -> f64 {
    1.2
}

fn default_stop_atr_multiplier() -> f64 {
    1.5
}

fn default_reward_risk() -> f64 {
    2.0
}

/// Thresholds of the crossover rule set.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SignalRules {
    #[serde(default = "default_rsi_long_below")]
    pub rsi_long_below: f64,
    #[serde(default = "default_rsi_short_above")]
    pub rsi_short_above: f64,
    #[serde(default = "default_volume_multiplier")]
    pub volume_multiplier: f64,
    #[serde(default = "default_stop_atr_multiplier")]
    pub stop_atr_multiplier: f64,
    #[serde(default = "default_reward_risk")]
    pub reward_risk: f64,
}

impl Default for SignalRules {
    fn default() -> Self {
        Self {
            rsi_long_below: default_rsi_long_below(),
            rsi_short_above: default_rsi_short_above(),
            volume_multiplier: default_volume_multiplier(),
            stop_atr_multiplier: default_stop_atr_multiplier(),
            reward_risk: default_reward_risk(),
        }
    }
}

/// Everything the rule set looks at for the latest primary candle.
#[derive(Debug, Clone, Copy)]
pub struct DecisionInput<'a> {
    pub last: &'a Candle,
    pub snapshot: &'a IndicatorSnapshot,
    pub crossover: Crossover,
    pub volume_confirmed: bool,
    pub secondary_confirmed: bool,
}

impl SignalRules {
    /// Last volume above `volume_multiplier` times its baseline.
    /// A zero or missing baseline does not block.
    pub fn volume_confirmed(&self, last: &Candle, snapshot: &IndicatorSnapshot) -> bool {
        match snapshot.volume_ma {
            Some(baseline) if baseline > 0.0 => last.volume > baseline * self.volume_multiplier,
            _ => true,
        }
    }

    /// Apply the rule set. LONG is checked before SHORT; the first match wins.
    pub fn decide(&self, symbol: &str, input: &DecisionInput<'_>) -> AnalysisResult {
        let entry = input.last.close;
        let momentum = input.snapshot.rsi.unwrap_or(NEUTRAL_MOMENTUM);
        let volatility = input
            .snapshot
            .atr
            .unwrap_or((entry * FALLBACK_VOLATILITY_RATIO).max(0.0));
        let has_volatility = volatility.is_finite() && volatility > 0.0;

        let long = input.crossover.bullish
            && momentum < self.rsi_long_below
            && input.volume_confirmed
            && input.secondary_confirmed;
        // SHORT wants the secondary timeframe *not* confirming.
        let short = input.crossover.bearish
            && momentum > self.rsi_short_above
            && input.volume_confirmed
            && !input.secondary_confirmed;

        let mut result = AnalysisResult {
            symbol: symbol.to_owned(),
            verdict: Verdict::NoSignal,
            entry: round_price(entry),
            stop: None,
            take_profit: None,
            momentum,
            volatility,
            last_volume: input.last.volume,
            reasoning: String::new(),
            error: None,
        };

        // Levels that collapse onto the entry after rounding are not tradable.
        let mut below_precision = false;
        if (long || short) && has_volatility {
            let risk = volatility * self.stop_atr_multiplier;
            let (verdict, stop, take_profit, reasons) = if long {
                (
                    Verdict::Long,
                    entry - risk,
                    entry + risk * self.reward_risk,
                    vec![
                        "EMA50 crossed above EMA200".to_owned(),
                        format!("RSI {momentum:.1} (<{})", self.rsi_long_below),
                        "volume confirmed".to_owned(),
                        "secondary timeframe above EMA50".to_owned(),
                    ],
                )
            } else {
                (
                    Verdict::Short,
                    entry + risk,
                    entry - risk * self.reward_risk,
                    vec![
                        "EMA50 crossed below EMA200".to_owned(),
                        format!("RSI {momentum:.1} (>{})", self.rsi_short_above),
                        "volume confirmed".to_owned(),
                        "secondary timeframe below EMA50".to_owned(),
                    ],
                )
            };
            let (stop, take_profit) = (round_price(stop), round_price(take_profit));
            let ordered = match verdict {
                Verdict::Long => stop < result.entry && result.entry < take_profit,
                _ => take_profit < result.entry && result.entry < stop,
            };
            if ordered {
                result.verdict = verdict;
                result.stop = Some(stop);
                result.take_profit = Some(take_profit);
                result.reasoning = reasons.join(" | ");
                return result;
            }
            below_precision = true;
        }

        let mut reasons = self.no_signal_reasons(input, momentum, has_volatility);
        if below_precision {
            reasons.push("volatility below price precision".to_owned());
        }
        result.reasoning = reasons.join(" | ");
        result
    }

    fn no_signal_reasons(
        &self,
        input: &DecisionInput<'_>,
        momentum: f64,
        has_volatility: bool,
    ) -> Vec<String> {
        let mut reasons = vec!["No clean EMA cross + confirmations".to_owned()];
        let cross = input.crossover;

        if cross.bullish {
            reasons.push("EMA50 crossed above EMA200".to_owned());
            if momentum >= self.rsi_long_below {
                reasons.push(format!(
                    "RSI {momentum:.1} not below {}",
                    self.rsi_long_below
                ));
            }
            if !input.secondary_confirmed {
                reasons.push("secondary timeframe not confirming".to_owned());
            }
        } else if cross.bearish {
            reasons.push("EMA50 crossed below EMA200".to_owned());
            if momentum <= self.rsi_short_above {
                reasons.push(format!(
                    "RSI {momentum:.1} not above {}",
                    self.rsi_short_above
                ));
            }
            if input.secondary_confirmed {
                reasons.push("secondary timeframe still above EMA50".to_owned());
            }
        } else {
            return reasons;
        }

        if !input.volume_confirmed {
            reasons.push("volume below baseline".to_owned());
        }
        if !has_volatility {
            reasons.push("volatility unavailable".to_owned());
        }
        reasons
    }
}

/// Run crossover, volume check and rule set over an aligned primary series.
///
/// Returns `None` for an empty series or when `snapshots` is not aligned with `candles`.
pub fn evaluate_primary(
    rules: &SignalRules,
    symbol: &str,
    candles: &[Candle],
    snapshots: &[IndicatorSnapshot],
    secondary_confirmed: bool,
) -> Option<AnalysisResult> {
    if candles.len() != snapshots.len() {
        return None;
    }
    let last = candles.last()?;
    let snapshot = snapshots.last()?;

    let input = DecisionInput {
        last,
        snapshot,
        crossover: Crossover::detect(snapshots),
        volume_confirmed: rules.volume_confirmed(last, snapshot),
        secondary_confirmed,
    };
    Some(rules.decide(symbol, &input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::candle;

    const ROUNDING: f64 = 1e-7;

    /// 400 candles closing at `entry`, with the EMA50 crossing above (or below)
    /// the EMA200 between the last two indices.
    fn crossing_series(
        bullish: bool,
        entry: f64,
        rsi: f64,
        atr: f64,
        volume_ratio: f64,
    ) -> (Vec<Candle>, Vec<IndicatorSnapshot>) {
        let n = 400;
        let candles: Vec<Candle> = (0..n)
            .map(|i| {
                let volume = if i == n - 1 { volume_ratio * 10.0 } else { 10.0 };
                candle(i, entry, entry + 1.0, entry - 1.0, entry, volume)
            })
            .collect();
        let (before, after) = if bullish { (99.0, 101.0) } else { (101.0, 99.0) };
        let snapshots: Vec<IndicatorSnapshot> = (0..n)
            .map(|i| IndicatorSnapshot {
                fast_ema: Some(if i == n - 1 { after } else { before }),
                slow_ema: Some(100.0),
                rsi: Some(rsi),
                atr: Some(atr),
                volume_ma: Some(10.0),
            })
            .collect();
        (candles, snapshots)
    }

    fn assert_levels_consistent(result: &AnalysisResult) {
        match result.verdict {
            Verdict::Long => {
                let (stop, tp) = (result.stop.unwrap(), result.take_profit.unwrap());
                assert!(stop < result.entry && result.entry < tp);
                assert!(((tp - result.entry) - 2.0 * (result.entry - stop)).abs() < ROUNDING);
            }
            Verdict::Short => {
                let (stop, tp) = (result.stop.unwrap(), result.take_profit.unwrap());
                assert!(tp < result.entry && result.entry < stop);
                assert!(((result.entry - tp) - 2.0 * (stop - result.entry)).abs() < ROUNDING);
            }
            Verdict::NoSignal | Verdict::Error => {
                assert!(result.stop.is_none());
                assert!(result.take_profit.is_none());
            }
        }
    }

    #[test]
    fn long_on_bullish_cross_with_confirmations() {
        let (candles, snapshots) = crossing_series(true, 100.0, 30.0, 2.0, 2.0);
        let result =
            evaluate_primary(&SignalRules::default(), "BTCUSDT", &candles, &snapshots, true)
                .unwrap();
        assert_eq!(result.verdict, Verdict::Long);
        assert_eq!(result.entry, 100.0);
        assert_eq!(result.stop, Some(97.0));
        assert_eq!(result.take_profit, Some(106.0));
        assert_eq!(result.momentum, 30.0);
        assert_eq!(result.volatility, 2.0);
        assert_eq!(result.last_volume, 20.0);
        assert!(result.reasoning.contains("RSI 30.0 (<40)"));
        assert!(result.reasoning.contains("volume confirmed"));
        assert_levels_consistent(&result);
    }

    #[test]
    fn no_signal_when_momentum_too_high_for_long() {
        let (candles, snapshots) = crossing_series(true, 100.0, 55.0, 2.0, 2.0);
        let result =
            evaluate_primary(&SignalRules::default(), "BTCUSDT", &candles, &snapshots, true)
                .unwrap();
        assert_eq!(result.verdict, Verdict::NoSignal);
        assert!(result.reasoning.contains("RSI 55.0 not below 40"));
        assert_levels_consistent(&result);
    }

    #[test]
    fn long_blocked_without_volume() {
        let (candles, snapshots) = crossing_series(true, 100.0, 30.0, 2.0, 1.1);
        let result =
            evaluate_primary(&SignalRules::default(), "BTCUSDT", &candles, &snapshots, true)
                .unwrap();
        assert_eq!(result.verdict, Verdict::NoSignal);
        assert!(result.reasoning.contains("volume below baseline"));
    }

    #[test]
    fn long_blocked_without_secondary_confirmation() {
        let (candles, snapshots) = crossing_series(true, 100.0, 30.0, 2.0, 2.0);
        let result =
            evaluate_primary(&SignalRules::default(), "BTCUSDT", &candles, &snapshots, false)
                .unwrap();
        assert_eq!(result.verdict, Verdict::NoSignal);
    }

    #[test]
    fn short_requires_secondary_not_confirming() {
        let (candles, snapshots) = crossing_series(false, 100.0, 70.0, 2.0, 2.0);
        let rules = SignalRules::default();

        let short = evaluate_primary(&rules, "ETHUSDT", &candles, &snapshots, false).unwrap();
        assert_eq!(short.verdict, Verdict::Short);
        assert_eq!(short.stop, Some(103.0));
        assert_eq!(short.take_profit, Some(94.0));
        assert_levels_consistent(&short);

        let blocked = evaluate_primary(&rules, "ETHUSDT", &candles, &snapshots, true).unwrap();
        assert_eq!(blocked.verdict, Verdict::NoSignal);
        assert!(blocked.reasoning.contains("secondary timeframe still above EMA50"));
    }

    #[test]
    fn no_cross_means_no_signal() {
        let (candles, mut snapshots) = crossing_series(true, 100.0, 30.0, 2.0, 2.0);
        let last = snapshots.len() - 1;
        snapshots[last - 1].fast_ema = Some(100.5);
        let result =
            evaluate_primary(&SignalRules::default(), "BTCUSDT", &candles, &snapshots, true)
                .unwrap();
        assert_eq!(result.verdict, Verdict::NoSignal);
        assert_eq!(result.reasoning, "No clean EMA cross + confirmations");
    }

    #[test]
    fn missing_volume_baseline_confirms() {
        let rules = SignalRules::default();
        let last = candle(0, 1.0, 1.0, 1.0, 1.0, 0.5);
        let undefined = IndicatorSnapshot::default();
        let zero = IndicatorSnapshot {
            volume_ma: Some(0.0),
            ..Default::default()
        };
        assert!(rules.volume_confirmed(&last, &undefined));
        assert!(rules.volume_confirmed(&last, &zero));
    }

    #[test]
    fn undefined_rsi_defaults_to_neutral() {
        let (candles, mut snapshots) = crossing_series(true, 100.0, 30.0, 2.0, 2.0);
        for s in &mut snapshots {
            s.rsi = None;
        }
        let result =
            evaluate_primary(&SignalRules::default(), "BTCUSDT", &candles, &snapshots, true)
                .unwrap();
        assert_eq!(result.momentum, NEUTRAL_MOMENTUM);
        assert_eq!(result.verdict, Verdict::NoSignal);
    }

    #[test]
    fn undefined_atr_falls_back_to_price_fraction() {
        let (candles, mut snapshots) = crossing_series(true, 100.0, 30.0, 2.0, 2.0);
        for s in &mut snapshots {
            s.atr = None;
        }
        let result =
            evaluate_primary(&SignalRules::default(), "BTCUSDT", &candles, &snapshots, true)
                .unwrap();
        assert_eq!(result.verdict, Verdict::Long);
        assert!((result.volatility - 0.2).abs() < 1e-12);
        assert_eq!(result.stop, Some(99.7));
        assert_eq!(result.take_profit, Some(100.6));
        assert_levels_consistent(&result);
    }

    #[test]
    fn zero_volatility_never_places_levels() {
        let (candles, snapshots) = crossing_series(true, 100.0, 30.0, 0.0, 2.0);
        let result =
            evaluate_primary(&SignalRules::default(), "BTCUSDT", &candles, &snapshots, true)
                .unwrap();
        assert_eq!(result.verdict, Verdict::NoSignal);
        assert!(result.reasoning.contains("volatility unavailable"));
        assert_levels_consistent(&result);
    }

    #[test]
    fn prices_rounded_to_eight_decimals() {
        let (candles, snapshots) = crossing_series(true, 0.123456789123, 30.0, 0.000123456789, 2.0);
        let result =
            evaluate_primary(&SignalRules::default(), "DOGEUSDT", &candles, &snapshots, true)
                .unwrap();
        assert_eq!(result.verdict, Verdict::Long);
        for price in [result.entry, result.stop.unwrap(), result.take_profit.unwrap()] {
            assert_eq!(round_price(price), price);
        }
        assert_levels_consistent(&result);
    }

    #[test]
    fn stop_rounding_onto_entry_is_not_a_signal() {
        let (candles, snapshots) = crossing_series(true, 0.00001234, 30.0, 2e-9, 2.0);
        let result =
            evaluate_primary(&SignalRules::default(), "PEPEUSDT", &candles, &snapshots, true)
                .unwrap();
        assert_eq!(result.verdict, Verdict::NoSignal);
        assert!(result.reasoning.contains("volatility below price precision"));
        assert_levels_consistent(&result);
    }

    #[test]
    fn short_stop_rounding_onto_entry_is_not_a_signal() {
        let (candles, snapshots) = crossing_series(false, 0.00001234, 70.0, 2e-9, 2.0);
        let result =
            evaluate_primary(&SignalRules::default(), "PEPEUSDT", &candles, &snapshots, false)
                .unwrap();
        assert_eq!(result.verdict, Verdict::NoSignal);
        assert!(result.reasoning.contains("volatility below price precision"));
        assert_levels_consistent(&result);
    }

    #[test]
    fn empty_or_misaligned_input_yields_none() {
        let rules = SignalRules::default();
        assert!(evaluate_primary(&rules, "X", &[], &[], true).is_none());
        let (candles, snapshots) = crossing_series(true, 100.0, 30.0, 2.0, 2.0);
        assert!(evaluate_primary(&rules, "X", &candles, &snapshots[1..], true).is_none());
    }

    #[test]
    fn decision_is_deterministic() {
        let (candles, snapshots) = crossing_series(false, 250.5, 72.3, 3.7, 1.5);
        let rules = SignalRules::default();
        let first = evaluate_primary(&rules, "SOLUSDT", &candles, &snapshots, false);
        let second = evaluate_primary(&rules, "SOLUSDT", &candles, &snapshots, false);
        assert_eq!(first, second);
    }
}
