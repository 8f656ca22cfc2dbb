pub mod crossover;
pub mod decision;
pub mod snapshot;

use std::sync::Arc;

use error_stack::{Report, ResultExt, bail};
use tracing::{debug, info, warn};

use crate::error::{AnalysisError, IndicatorError};
use crate::exchange::Exchange;
use crate::model::{AnalysisResult, TimeFrame};
use decision::{SignalRules, evaluate_primary};
use snapshot::IndicatorSet;

/// Secondary confirmation assumed when the confirmation series is unavailable.
pub const DEFAULT_SECONDARY_CONFIRMATION: bool = true;

/// How much history the analyzer asks for.
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub history_limit: usize,
    pub min_candles: usize,
    pub confirmation_timeframe: TimeFrame,
    pub confirmation_limit: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            history_limit: 400,
            min_candles: 60,
            confirmation_timeframe: TimeFrame::Min1,
            confirmation_limit: 120,
        }
    }
}

/// Runs the full per-symbol analysis against an injected candle source.
///
/// Every call allocates its own series; nothing is shared between calls
/// except the read-only exchange handle.
pub struct Analyzer {
    exchange: Arc<dyn Exchange>,
    indicators: IndicatorSet,
    rules: SignalRules,
    settings: AnalysisSettings,
}

impl Analyzer {
    pub fn new(
        exchange: Arc<dyn Exchange>,
        rules: SignalRules,
        settings: AnalysisSettings,
    ) -> Result<Self, Report<IndicatorError>> {
        Ok(Self {
            exchange,
            indicators: IndicatorSet::standard()?,
            rules,
            settings,
        })
    }

    /// Analyze `symbol` on `timeframe`. Failures come back as an `ERROR` result.
    pub async fn analyze(&self, symbol: &str, timeframe: TimeFrame) -> AnalysisResult {
        match self.try_analyze(symbol, timeframe).await {
            Ok(result) => {
                info!(
                    symbol,
                    timeframe = %timeframe,
                    verdict = %result.verdict,
                    momentum = result.momentum,
                    "analysis complete"
                );
                result
            }
            Err(report) => {
                warn!(
                    symbol,
                    timeframe = %timeframe,
                    exchange = self.exchange.name(),
                    error = ?report,
                    "analysis failed"
                );
                AnalysisResult::error(symbol, report.current_context().to_string())
            }
        }
    }

    async fn try_analyze(
        &self,
        symbol: &str,
        timeframe: TimeFrame,
    ) -> Result<AnalysisResult, Report<AnalysisError>> {
        let candles = self
            .exchange
            .fetch_candles(symbol, timeframe, self.settings.history_limit)
            .await
            .map_err(|report| {
                let reason = report.current_context().to_string();
                report.change_context(AnalysisError::Retrieval {
                    timeframe: timeframe.to_string(),
                    reason,
                })
            })?;

        if candles.len() < self.settings.min_candles {
            bail!(AnalysisError::InsufficientData {
                required: self.settings.min_candles,
                available: candles.len(),
            });
        }

        let snapshots = self
            .indicators
            .compute(&candles)
            .change_context(AnalysisError::Computation)?;

        let secondary_confirmed = self.secondary_confirmation(symbol).await;

        evaluate_primary(
            &self.rules,
            symbol,
            &candles,
            &snapshots,
            secondary_confirmed,
        )
        .ok_or_else(|| {
            Report::new(AnalysisError::Computation).attach("indicator series misaligned")
        })
    }

    /// Whether the confirmation timeframe closes above its own fast EMA.
    ///
    /// Best effort: any failure resolves to [`DEFAULT_SECONDARY_CONFIRMATION`].
    pub(crate) async fn secondary_confirmation(&self, symbol: &str) -> bool {
        let timeframe = self.settings.confirmation_timeframe;
        let candles = match self
            .exchange
            .fetch_candles(symbol, timeframe, self.settings.confirmation_limit)
            .await
        {
            Ok(candles) => candles,
            Err(report) => {
                warn!(
                    symbol,
                    timeframe = %timeframe,
                    error = ?report,
                    "confirmation candles unavailable, assuming confirmed"
                );
                return DEFAULT_SECONDARY_CONFIRMATION;
            }
        };

        let snapshots = match self.indicators.compute(&candles) {
            Ok(snapshots) => snapshots,
            Err(report) => {
                warn!(
                    symbol,
                    timeframe = %timeframe,
                    error = ?report,
                    "confirmation indicators failed, assuming confirmed"
                );
                return DEFAULT_SECONDARY_CONFIRMATION;
            }
        };

        match (candles.last(), snapshots.last().and_then(|s| s.fast_ema)) {
            (Some(last), Some(fast_ema)) => last.close > fast_ema,
            _ => {
                debug!(
                    symbol,
                    timeframe = %timeframe,
                    available = candles.len(),
                    "confirmation series too short, assuming confirmed"
                );
                DEFAULT_SECONDARY_CONFIRMATION
            }
        }
    }
}
