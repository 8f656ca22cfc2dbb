use std::path::{Path, PathBuf};
use std::time::Duration;

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::analysis::AnalysisSettings;
use crate::analysis::decision::SignalRules;
use crate::error::ConfigError;
use crate::exchange::bybit::MAX_CANDLES_PER_REQUEST;
use crate::model::{Mode, TimeFrame};

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_category() -> String {
    "linear".into()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_timeframe() -> String {
    "15m".into()
}

fn default_confirmation_timeframe() -> String {
    "1m".into()
}

fn default_history_limit() -> usize {
    400
}

fn default_min_candles() -> usize {
    60
}

fn default_confirmation_limit() -> usize {
    120
}

fn default_interval_secs() -> u64 {
    900
}

fn default_first_run_delay_secs() -> u64 {
    10
}

fn default_symbol_delay_ms() -> u64 {
    600
}

fn default_symbols() -> Vec<String> {
    ["BTCUSDT", "ETHUSDT", "SOLUSDT", "ADAUSDT"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub strategy: SignalRules,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            exchange: ExchangeConfig::default(),
            analysis: AnalysisConfig::default(),
            strategy: SignalRules::default(),
            schedule: ScheduleConfig::default(),
            telegram: TelegramConfig::default(),
            symbols: default_symbols(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExchangeConfig {
    /// Bybit product line queried for klines.
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            category: default_category(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ExchangeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    #[serde(default = "default_confirmation_timeframe")]
    pub confirmation_timeframe: String,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_min_candles")]
    pub min_candles: usize,
    #[serde(default = "default_confirmation_limit")]
    pub confirmation_limit: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            timeframe: default_timeframe(),
            confirmation_timeframe: default_confirmation_timeframe(),
            history_limit: default_history_limit(),
            min_candles: default_min_candles(),
            confirmation_limit: default_confirmation_limit(),
        }
    }
}

impl AnalysisConfig {
    /// Primary timeframe plus the analyzer settings this section describes.
    pub fn resolve(&self) -> Result<(TimeFrame, AnalysisSettings), Report<ConfigError>> {
        let timeframe = parse_timeframe("analysis.timeframe", &self.timeframe)?;
        let confirmation_timeframe = parse_timeframe(
            "analysis.confirmation_timeframe",
            &self.confirmation_timeframe,
        )?;
        Ok((
            timeframe,
            AnalysisSettings {
                history_limit: self.history_limit,
                min_candles: self.min_candles,
                confirmation_timeframe,
                confirmation_limit: self.confirmation_limit,
            },
        ))
    }
}

#[derive(Debug, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_first_run_delay_secs")]
    pub first_run_delay_secs: u64,
    #[serde(default = "default_symbol_delay_ms")]
    pub symbol_delay_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            first_run_delay_secs: default_first_run_delay_secs(),
            symbol_delay_ms: default_symbol_delay_ms(),
        }
    }
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn first_run_delay(&self) -> Duration {
        Duration::from_secs(self.first_run_delay_secs)
    }

    pub fn symbol_delay(&self) -> Duration {
        Duration::from_millis(self.symbol_delay_ms)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub channel_id: Option<String>,
    #[serde(default)]
    pub mode: Mode,
}

impl TelegramConfig {
    /// Token and channel, when the bot is configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        Some((self.bot_token.as_deref()?, self.channel_id.as_deref()?))
    }
}

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// The explicit path, else `fallback` when that file exists.
fn config_path(explicit: Option<&Path>, fallback: &Path) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => fallback.is_file().then(|| fallback.to_path_buf()),
    }
}

/// Load the configuration from `path`, else from [`DEFAULT_CONFIG_PATH`] when
/// present, else built-in defaults. Environment overrides are applied and the
/// result is validated.
pub fn load(path: Option<&Path>) -> Result<AppConfig, Report<ConfigError>> {
    let mut config = match config_path(path, Path::new(DEFAULT_CONFIG_PATH)) {
        Some(path) => read(&path)?,
        None => AppConfig::default(),
    };

    apply_overrides(&mut config, |key| std::env::var(key).ok())?;
    normalize_symbols(&mut config);
    validate(&config)?;

    Ok(config)
}

fn read(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    toml::from_str(&content)
        .change_context(ConfigError::Parse {
            reason: "invalid TOML syntax or schema mismatch".into(),
        })
        .attach_with(|| format!("path: {}", path.display()))
}

/// Apply `BOT_TOKEN`, `SIGNAL_CHANNEL_ID`, `MODE` and `SYMBOLS` from `lookup`.
/// Empty values are ignored.
pub fn apply_overrides(
    config: &mut AppConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), Report<ConfigError>> {
    let var = |key: &str| {
        lookup(key)
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    };

    if let Some(token) = var("BOT_TOKEN") {
        config.telegram.bot_token = Some(token);
    }
    if let Some(channel) = var("SIGNAL_CHANNEL_ID") {
        config.telegram.channel_id = Some(channel);
    }
    if let Some(mode) = var("MODE") {
        config.telegram.mode = Mode::from_str(&mode).ok_or_else(|| {
            Report::new(ConfigError::Validation {
                field: format!("MODE: expected PAPER or LIVE, got \"{mode}\""),
            })
        })?;
    }
    if let Some(symbols) = var("SYMBOLS") {
        config.symbols = symbols.split(',').map(String::from).collect();
    }

    Ok(())
}

/// Trim and upper-case every symbol, dropping empty entries.
fn normalize_symbols(config: &mut AppConfig) {
    config.symbols = config
        .symbols
        .iter()
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .collect();
}

fn parse_timeframe(field: &str, value: &str) -> Result<TimeFrame, Report<ConfigError>> {
    TimeFrame::from_str(value).ok_or_else(|| {
        Report::new(ConfigError::Validation {
            field: format!("{field}: unknown timeframe \"{value}\""),
        })
    })
}

fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_log_format(config)?;
    validate_analysis(config)?;
    validate_symbols(config)?;
    validate_schedule(config)?;
    validate_strategy(config)?;
    validate_telegram(config)?;
    Ok(())
}

fn validation(field: String) -> Report<ConfigError> {
    Report::new(ConfigError::Validation { field })
}

fn validate_log_format(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    match config.general.log_format.as_str() {
        "text" | "json" => Ok(()),
        other => Err(validation(format!(
            "general.log_format \"{other}\" must be \"text\" or \"json\""
        ))),
    }
}

fn validate_analysis(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let (_, settings) = config.analysis.resolve()?;

    if settings.min_candles == 0 {
        return Err(validation("analysis.min_candles must be > 0".into()));
    }
    for (field, limit) in [
        ("analysis.history_limit", settings.history_limit),
        ("analysis.confirmation_limit", settings.confirmation_limit),
    ] {
        if limit > MAX_CANDLES_PER_REQUEST {
            return Err(validation(format!(
                "{field} ({limit}) exceeds the exchange maximum of {MAX_CANDLES_PER_REQUEST}"
            )));
        }
    }
    if settings.min_candles > settings.history_limit {
        return Err(validation(format!(
            "analysis.min_candles ({}) exceeds analysis.history_limit ({})",
            settings.min_candles, settings.history_limit
        )));
    }
    if settings.confirmation_limit == 0 {
        return Err(validation("analysis.confirmation_limit must be > 0".into()));
    }
    Ok(())
}

fn validate_symbols(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if config.symbols.is_empty() {
        return Err(validation("symbols: at least one symbol is required".into()));
    }
    if let Some(bad) = config
        .symbols
        .iter()
        .find(|s| s.trim().is_empty() || s.chars().any(char::is_whitespace))
    {
        return Err(validation(format!("symbols: invalid symbol \"{bad}\"")));
    }
    Ok(())
}

fn validate_schedule(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if config.schedule.interval_secs == 0 {
        return Err(validation("schedule.interval_secs must be > 0".into()));
    }
    Ok(())
}

fn validate_strategy(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let rules = &config.strategy;
    let positive = [
        ("strategy.volume_multiplier", rules.volume_multiplier),
        ("strategy.stop_atr_multiplier", rules.stop_atr_multiplier),
        ("strategy.reward_risk", rules.reward_risk),
    ];
    for (field, value) in positive {
        if !(value.is_finite() && value > 0.0) {
            return Err(validation(format!("{field} must be positive, got {value}")));
        }
    }
    if !(0.0..=100.0).contains(&rules.rsi_long_below)
        || !(0.0..=100.0).contains(&rules.rsi_short_above)
    {
        return Err(validation(
            "strategy.rsi_long_below and strategy.rsi_short_above must be within 0..=100".into(),
        ));
    }
    Ok(())
}

fn validate_telegram(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    match (&config.telegram.bot_token, &config.telegram.channel_id) {
        (Some(_), None) => Err(validation(
            "telegram.channel_id is required when a bot token is set".into(),
        )),
        (None, Some(_)) => Err(validation(
            "telegram.bot_token is required when a channel is set".into(),
        )),
        _ => Ok(()),
    }
}
