use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ExchangeError;
use crate::exchange::Exchange;
use crate::model::{Candle, TimeFrame};

const BYBIT_BASE_URL: &str = "https://api.bybit.com";
const EXCHANGE_NAME: &str = "bybit";
/// Largest `limit` the kline endpoint accepts.
pub const MAX_CANDLES_PER_REQUEST: usize = 1000;

/// Bybit v5 public market data (kline endpoint).
pub struct BybitExchange {
    client: reqwest::Client,
    base_url: String,
    category: String,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl BybitExchange {
    /// `category` is the Bybit product line: `"linear"`, `"inverse"` or `"spot"`.
    pub fn new(category: &str, request_timeout: Duration) -> Result<Self, Report<ExchangeError>> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .change_context(ExchangeError::Request {
                exchange: EXCHANGE_NAME.into(),
            })
            .attach("failed to build HTTP client")?;
        // Bybit allows 600 requests per 5s per IP on public endpoints; stay well below.
        let quota = Quota::per_second(nonzero!(10u32));
        Ok(Self {
            client,
            base_url: BYBIT_BASE_URL.to_owned(),
            category: category.to_owned(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }
}

impl Exchange for BybitExchange {
    fn name(&self) -> &str {
        EXCHANGE_NAME
    }

    fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: TimeFrame,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<Candle>, Report<ExchangeError>>> {
        let symbol = symbol.to_owned();
        Box::pin(async move {
            // Wait for rate limiter before making the request
            self.rate_limiter.until_ready().await;

            let url = format!("{}/v5/market/kline", self.base_url);
            let limit_str = limit.clamp(1, MAX_CANDLES_PER_REQUEST).to_string();
            let params = [
                ("category", self.category.as_str()),
                ("symbol", symbol.as_str()),
                ("interval", timeframe.bybit_interval()),
                ("limit", limit_str.as_str()),
            ];

            debug!(symbol = %symbol, timeframe = %timeframe, limit, "requesting bybit klines");

            let response = self
                .client
                .get(&url)
                .query(&params)
                .send()
                .await
                .change_context(ExchangeError::Request {
                    exchange: EXCHANGE_NAME.into(),
                })?;

            if !response.status().is_success() {
                return Err(Report::new(ExchangeError::Request {
                    exchange: EXCHANGE_NAME.into(),
                })
                .attach(format!("HTTP status: {}", response.status())));
            }

            let body: BybitResponse =
                response
                    .json()
                    .await
                    .change_context(ExchangeError::ResponseParse {
                        exchange: EXCHANGE_NAME.into(),
                    })?;

            let candles = body.into_candles()?;

            info!(
                symbol = %symbol,
                timeframe = %timeframe,
                fetched = candles.len(),
                "bybit candle fetch complete"
            );

            Ok(candles)
        })
    }
}

// ── REST response types ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BybitResponse {
    ret_code: i64,
    ret_msg: String,
    #[serde(default)]
    result: Option<BybitKlineResult>,
}

#[derive(Debug, Deserialize)]
struct BybitKlineResult {
    #[serde(default)]
    list: Vec<BybitKlineRow>,
}

/// Bybit kline row: 7-element string array
/// [start_time_ms, open, high, low, close, volume, turnover]
#[derive(Debug, Deserialize)]
struct BybitKlineRow(
    String,                     // 0: start time (ms)
    String,                     // 1: open
    String,                     // 2: high
    String,                     // 3: low
    String,                     // 4: close
    String,                     // 5: volume (base coin)
    #[allow(dead_code)] String, // 6: turnover (quote coin)
);

impl BybitResponse {
    /// Bybit lists newest first; candles are returned oldest first.
    fn into_candles(self) -> Result<Vec<Candle>, Report<ExchangeError>> {
        if self.ret_code != 0 {
            return Err(Report::new(ExchangeError::Api {
                exchange: EXCHANGE_NAME.into(),
                message: self.ret_msg,
            })
            .attach(format!("retCode: {}", self.ret_code)));
        }

        let rows = self.result.map(|r| r.list).unwrap_or_default();
        let mut candles = rows
            .into_iter()
            .map(BybitKlineRow::into_candle)
            .collect::<Result<Vec<_>, _>>()?;
        candles.sort_by_key(|c| c.open_time);
        candles.dedup_by_key(|c| c.open_time);
        Ok(candles)
    }
}

impl BybitKlineRow {
    fn into_candle(self) -> Result<Candle, Report<ExchangeError>> {
        let parse_f64 = |s: &str| -> Result<f64, Report<ExchangeError>> {
            s.parse::<f64>()
                .change_context(ExchangeError::ResponseParse {
                    exchange: EXCHANGE_NAME.into(),
                })
                .attach_with(|| format!("value: {s}"))
        };

        let millis = self
            .0
            .parse::<i64>()
            .change_context(ExchangeError::ResponseParse {
                exchange: EXCHANGE_NAME.into(),
            })?;
        let open_time = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
            Report::new(ExchangeError::ResponseParse {
                exchange: EXCHANGE_NAME.into(),
            })
            .attach(format!("start time out of range: {millis}"))
        })?;

        Ok(Candle {
            open_time,
            open: parse_f64(&self.1)?,
            high: parse_f64(&self.2)?,
            low: parse_f64(&self.3)?,
            close: parse_f64(&self.4)?,
            volume: parse_f64(&self.5)?,
        })
    }
}
