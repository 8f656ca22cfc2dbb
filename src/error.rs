use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

#[derive(Debug, Display, Error)]
pub enum ExchangeError {
    #[display("request to {exchange} failed")]
    Request { exchange: String },
    #[display("failed to parse response from {exchange}")]
    ResponseParse { exchange: String },
    #[display("{exchange} rejected the request: {message}")]
    Api { exchange: String, message: String },
}

#[derive(Debug, Display, Error)]
pub enum IndicatorError {
    #[display("insufficient data: need {required}, got {available}")]
    InsufficientData { required: usize, available: usize },
    #[display("invalid parameter: {name}")]
    InvalidParameter { name: String },
}

#[derive(Debug, Display, Error)]
pub enum AnalysisError {
    #[display("not enough data: need {required} candles, got {available}")]
    InsufficientData { required: usize, available: usize },
    #[display("failed to retrieve {timeframe} candles: {reason}")]
    Retrieval { timeframe: String, reason: String },
    #[display("indicator computation failed")]
    Computation,
}

#[derive(Debug, Display, Error)]
pub enum DeliveryError {
    #[display("request to {endpoint} failed")]
    Request { endpoint: String },
    #[display("failed to parse response from {endpoint}")]
    ResponseParse { endpoint: String },
    #[display("{endpoint} returned an error: {description}")]
    Api {
        endpoint: String,
        description: String,
    },
}
