use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Candle timeframe supported by the application.
///
/// String representations match conventional exchange notation (e.g. `"1m"`, `"15m"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeFrame {
    Min1,
    Min3,
    Min5,
    Min15,
    Min30,
    Hour1,
    Hour4,
    Day1,
}

impl TimeFrame {
    /// Parse a config-format string into a `TimeFrame`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(Self::Min1),
            "3m" => Some(Self::Min3),
            "5m" => Some(Self::Min5),
            "15m" => Some(Self::Min15),
            "30m" => Some(Self::Min30),
            "1h" => Some(Self::Hour1),
            "4h" => Some(Self::Hour4),
            "1d" => Some(Self::Day1),
            _ => None,
        }
    }

    /// Return the config-format string representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Min1 => "1m",
            Self::Min3 => "3m",
            Self::Min5 => "5m",
            Self::Min15 => "15m",
            Self::Min30 => "30m",
            Self::Hour1 => "1h",
            Self::Hour4 => "4h",
            Self::Day1 => "1d",
        }
    }

    /// Return the Bybit v5 kline interval code for this timeframe.
    pub fn bybit_interval(self) -> &'static str {
        match self {
            Self::Min1 => "1",
            Self::Min3 => "3",
            Self::Min5 => "5",
            Self::Min15 => "15",
            Self::Min30 => "30",
            Self::Hour1 => "60",
            Self::Hour4 => "240",
            Self::Day1 => "D",
        }
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One OHLCV observation. Series are kept oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Long,
    Short,
    NoSignal,
    Error,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
            Self::NoSignal => write!(f, "NO SIGNAL"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Presentation label attached to delivered signals. Nothing is executed in either mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    #[default]
    Paper,
    Live,
}

impl Mode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PAPER" => Some(Self::Paper),
            "LIVE" => Some(Self::Live),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Paper => write!(f, "PAPER"),
            Self::Live => write!(f, "LIVE"),
        }
    }
}

/// Outcome of one analysis run for one symbol.
///
/// `stop` and `take_profit` are `Some` exactly when the verdict is `Long` or `Short`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub symbol: String,
    pub verdict: Verdict,
    pub entry: f64,
    pub stop: Option<f64>,
    pub take_profit: Option<f64>,
    pub momentum: f64,
    pub volatility: f64,
    pub last_volume: f64,
    pub reasoning: String,
    pub error: Option<String>,
}

impl AnalysisResult {
    pub fn error(symbol: &str, message: impl Into<String>) -> Self {
        Self {
            symbol: symbol.to_owned(),
            verdict: Verdict::Error,
            entry: 0.0,
            stop: None,
            take_profit: None,
            momentum: 50.0,
            volatility: 0.0,
            last_volume: 0.0,
            reasoning: String::new(),
            error: Some(message.into()),
        }
    }
}

/// Round a price to 8 decimal places.
pub fn round_price(value: f64) -> f64 {
    (value * 1e8).round() / 1e8
}
