//! Shared fixtures for unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{TimeZone, Utc};
use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::{DeliveryError, ExchangeError};
use crate::exchange::Exchange;
use crate::model::{Candle, TimeFrame};
use crate::notifier::{Notifier, SentMessage};

pub fn candle(i: usize, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Candle {
    Candle {
        open_time: Utc.timestamp_opt(1_704_067_200, 0).unwrap()
            + chrono::Duration::minutes(i as i64 * 15),
        open,
        high,
        low,
        close,
        volume,
    }
}

pub fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| candle(i, c, c, c, c, 1.0))
        .collect()
}

pub fn candles_with_volumes(vols: &[f64]) -> Vec<Candle> {
    vols.iter()
        .enumerate()
        .map(|(i, &v)| candle(i, 100.0, 100.0, 100.0, 100.0, v))
        .collect()
}

/// Sine-shaped closes around 100 with a constant volume.
pub fn wavy(n: usize) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.2).sin() * 4.0;
            candle(i, close, close + 0.5, close - 0.5, close, 50.0)
        })
        .collect()
}

/// Closes moving by `step` per candle.
pub fn trending(n: usize, step: f64) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let close = 100.0 + i as f64 * step;
            candle(i, close, close + 0.5, close - 0.5, close, 50.0)
        })
        .collect()
}

/// Serves fixed series: `confirmation` for 1m requests, `primary` otherwise.
/// A missing series, or a symbol listed in `failing`, is a retrieval error.
pub struct FixedExchange {
    pub primary: Option<Vec<Candle>>,
    pub confirmation: Option<Vec<Candle>>,
    pub failing: Vec<String>,
}

impl FixedExchange {
    pub fn new(primary: Option<Vec<Candle>>, confirmation: Option<Vec<Candle>>) -> Self {
        Self {
            primary,
            confirmation,
            failing: Vec::new(),
        }
    }
}

impl Exchange for FixedExchange {
    fn name(&self) -> &str {
        "fixed"
    }

    fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: TimeFrame,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<Candle>, Report<ExchangeError>>> {
        let series = if self.failing.iter().any(|s| s == symbol) {
            None
        } else if timeframe == TimeFrame::Min1 {
            self.confirmation.clone()
        } else {
            self.primary.clone()
        };
        Box::pin(async move {
            let series = series.ok_or_else(|| {
                Report::new(ExchangeError::Request {
                    exchange: "fixed".into(),
                })
            })?;
            let start = series.len().saturating_sub(limit);
            Ok(series[start..].to_vec())
        })
    }
}

/// Records every message; sends whose text contains `fail_on` are rejected.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
    pub edits: Mutex<Vec<(i64, String)>>,
    pub fail_on: Option<String>,
    next_id: AtomicI64,
}

impl RecordingNotifier {
    pub fn failing_on(needle: &str) -> Self {
        Self {
            fail_on: Some(needle.to_owned()),
            ..Default::default()
        }
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn edited_texts(&self) -> Vec<String> {
        self.edits
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn send(
        &self,
        chat_id: &str,
        text: &str,
    ) -> BoxFuture<'_, Result<SentMessage, Report<DeliveryError>>> {
        let rejected = self
            .fail_on
            .as_deref()
            .is_some_and(|needle| text.contains(needle));
        let result = if rejected {
            Err(Report::new(DeliveryError::Api {
                endpoint: "sendMessage".into(),
                description: "rejected by test".into(),
            }))
        } else {
            self.sent
                .lock()
                .unwrap()
                .push((chat_id.to_owned(), text.to_owned()));
            Ok(SentMessage {
                chat_id: chat_id.to_owned(),
                message_id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            })
        };
        Box::pin(async move { result })
    }

    fn edit(
        &self,
        message: &SentMessage,
        text: &str,
    ) -> BoxFuture<'_, Result<(), Report<DeliveryError>>> {
        self.edits
            .lock()
            .unwrap()
            .push((message.message_id, text.to_owned()));
        Box::pin(async { Ok(()) })
    }
}
