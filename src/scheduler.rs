use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::analysis::Analyzer;
use crate::message::format_result;
use crate::model::{AnalysisResult, Mode, TimeFrame, Verdict};
use crate::notifier::Notifier;

/// Spaces out consecutive symbols in a batch. A zero delay never waits.
pub struct Pacer {
    limiter: Option<DefaultDirectRateLimiter>,
}

impl Pacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            limiter: Quota::with_period(delay).map(RateLimiter::direct),
        }
    }

    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

/// Outcome counts of one batch run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub attempted: usize,
    pub signals: usize,
    pub errors: usize,
    pub undelivered: usize,
}

/// Ties the analyzer to a delivery channel for on-demand and batch runs.
pub struct SignalService {
    analyzer: Arc<Analyzer>,
    notifier: Arc<dyn Notifier>,
    timeframe: TimeFrame,
    mode: Mode,
    symbols: Vec<String>,
    channel: String,
    pacer: Pacer,
}

impl SignalService {
    pub fn new(
        analyzer: Arc<Analyzer>,
        notifier: Arc<dyn Notifier>,
        timeframe: TimeFrame,
        mode: Mode,
        symbols: Vec<String>,
        channel: String,
        pacer: Pacer,
    ) -> Self {
        Self {
            analyzer,
            notifier,
            timeframe,
            mode,
            symbols,
            channel,
            pacer,
        }
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Analyze `symbol` in its own task on the configured timeframe.
    pub async fn analyze(&self, symbol: &str) -> AnalysisResult {
        let analyzer = Arc::clone(&self.analyzer);
        let owned = symbol.to_owned();
        let timeframe = self.timeframe;

        match tokio::spawn(async move { analyzer.analyze(&owned, timeframe).await }).await {
            Ok(result) => result,
            Err(join_error) => {
                error!(symbol, error = %join_error, "analysis task aborted");
                AnalysisResult::error(symbol, format!("analysis task failed: {join_error}"))
            }
        }
    }

    pub fn format(&self, result: &AnalysisResult) -> String {
        format_result(result, self.mode)
    }

    /// Analyze every configured symbol in order and post each result to the channel.
    pub async fn run_batch(&self) -> BatchSummary {
        info!(
            symbols = ?self.symbols,
            channel = %self.channel,
            "running signal batch"
        );

        let mut summary = BatchSummary::default();
        for symbol in &self.symbols {
            self.pacer.wait().await;
            summary.attempted += 1;

            let result = self.analyze(symbol).await;
            match result.verdict {
                Verdict::Long | Verdict::Short => summary.signals += 1,
                Verdict::Error => summary.errors += 1,
                Verdict::NoSignal => {}
            }

            let text = self.format(&result);
            if let Err(report) = self.notifier.send(&self.channel, &text).await {
                warn!(symbol = %symbol, error = ?report, "failed to deliver signal");
                summary.undelivered += 1;
            }
        }

        info!(
            attempted = summary.attempted,
            signals = summary.signals,
            errors = summary.errors,
            undelivered = summary.undelivered,
            "signal batch complete"
        );
        summary
    }
}

/// Run a batch after `first_delay`, then every `interval`, until cancelled.
pub async fn run_schedule(
    service: Arc<SignalService>,
    first_delay: Duration,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + first_delay, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        first_delay_secs = first_delay.as_secs_f64(),
        interval_secs = interval.as_secs(),
        "scheduler started"
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = service.run_batch() => {}
        }
    }

    info!("scheduler stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisSettings;
    use crate::analysis::decision::SignalRules;
    use crate::test_support::{FixedExchange, RecordingNotifier, wavy};

    fn service_with(
        failing: &[&str],
        notifier: Arc<RecordingNotifier>,
        symbols: &[&str],
        pacer: Pacer,
    ) -> SignalService {
        let mut exchange = FixedExchange::new(Some(wavy(400)), Some(wavy(120)));
        exchange.failing = failing.iter().map(|s| s.to_string()).collect();
        let analyzer = Analyzer::new(
            Arc::new(exchange),
            SignalRules::default(),
            AnalysisSettings::default(),
        )
        .unwrap();
        SignalService::new(
            Arc::new(analyzer),
            notifier,
            TimeFrame::Min15,
            Mode::Paper,
            symbols.iter().map(|s| s.to_string()).collect(),
            "channel".into(),
            pacer,
        )
    }

    #[tokio::test]
    async fn batch_posts_every_symbol_in_order() {
        let notifier = Arc::new(RecordingNotifier::default());
        let service = service_with(
            &[],
            Arc::clone(&notifier),
            &["BTCUSDT", "ETHUSDT", "SOLUSDT"],
            Pacer::new(Duration::ZERO),
        );

        let summary = service.run_batch().await;
        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.errors, 0);

        let sent = notifier.sent.lock().unwrap().clone();
        let chats: Vec<_> = sent.iter().map(|(chat, _)| chat.as_str()).collect();
        assert_eq!(chats, vec!["channel"; 3]);
        assert!(sent[0].1.starts_with("*BTCUSDT*"));
        assert!(sent[1].1.starts_with("*ETHUSDT*"));
        assert!(sent[2].1.starts_with("*SOLUSDT*"));
    }

    #[tokio::test]
    async fn failed_symbol_is_reported_and_batch_continues() {
        let notifier = Arc::new(RecordingNotifier::default());
        let service = service_with(
            &["ETHUSDT"],
            Arc::clone(&notifier),
            &["BTCUSDT", "ETHUSDT", "SOLUSDT"],
            Pacer::new(Duration::ZERO),
        );

        let summary = service.run_batch().await;
        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.errors, 1);

        let texts = notifier.sent_texts();
        assert_eq!(texts.len(), 3);
        assert!(texts[1].starts_with("*ETHUSDT* - Error: failed to retrieve 15m candles"));
        assert!(texts[2].starts_with("*SOLUSDT*"));
    }

    #[tokio::test]
    async fn delivery_failure_does_not_stop_batch() {
        let notifier = Arc::new(RecordingNotifier::failing_on("*ETHUSDT*"));
        let service = service_with(
            &[],
            Arc::clone(&notifier),
            &["BTCUSDT", "ETHUSDT", "SOLUSDT"],
            Pacer::new(Duration::ZERO),
        );

        let summary = service.run_batch().await;
        assert_eq!(summary.undelivered, 1);
        let texts = notifier.sent_texts();
        assert_eq!(texts.len(), 2);
        assert!(texts[1].starts_with("*SOLUSDT*"));
    }

    #[tokio::test]
    async fn pacer_spaces_consecutive_waits() {
        let pacer = Pacer::new(Duration::from_millis(40));
        let started = std::time::Instant::now();
        for _ in 0..3 {
            pacer.wait().await;
        }
        assert!(started.elapsed() >= Duration::from_millis(70));
    }

    #[tokio::test]
    async fn zero_delay_pacer_never_waits() {
        let pacer = Pacer::new(Duration::ZERO);
        assert!(pacer.limiter.is_none());
        pacer.wait().await;
    }

    #[tokio::test]
    async fn schedule_runs_first_batch_and_stops_on_cancel() {
        let notifier = Arc::new(RecordingNotifier::default());
        let service = Arc::new(service_with(
            &[],
            Arc::clone(&notifier),
            &["BTCUSDT", "ETHUSDT"],
            Pacer::new(Duration::ZERO),
        ));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run_schedule(
            service,
            Duration::from_millis(10),
            Duration::from_secs(3600),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(300)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(notifier.sent_texts().len(), 2);
    }
}
