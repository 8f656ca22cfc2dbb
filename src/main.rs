mod analysis;
mod bot;
mod command;
mod config;
mod error;
mod exchange;
mod indicator;
mod message;
mod model;
mod notifier;
mod scheduler;
#[cfg(test)]
mod test_support;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use analysis::Analyzer;
use config::AppConfig;
use exchange::bybit::BybitExchange;
use message::format_result;
use model::TimeFrame;
use notifier::Notifier;
use notifier::telegram::TelegramBot;
use notifier::terminal::TerminalNotifier;
use scheduler::{Pacer, SignalService, run_schedule};

/// Chat id used for results when no Telegram channel is configured.
const TERMINAL_CHANNEL: &str = "terminal";

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("startup error")]
    Startup,
    #[display("runtime error")]
    Runtime,
}

#[derive(Parser)]
#[command(name = "cross-signals", about = "EMA crossover signal notifier")]
struct Cli {
    /// Path to the TOML configuration file. Defaults to `config.toml` when present,
    /// else built-in defaults.
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run the scheduler and, when configured, the Telegram command bot (default)
    Run,
    /// Analyze one symbol once and print the result
    Analyze {
        symbol: String,
        /// Override the configured primary timeframe, e.g. "1h"
        #[arg(short, long)]
        timeframe: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref().map(Path::new))
        .change_context(AppError::Config)?;

    init_tracing(&config);

    let (timeframe, settings) = config
        .analysis
        .resolve()
        .change_context(AppError::Config)?;

    let exchange = BybitExchange::new(
        &config.exchange.category,
        config.exchange.request_timeout(),
    )
    .change_context(AppError::Startup)?;
    let analyzer = Arc::new(
        Analyzer::new(Arc::new(exchange), config.strategy.clone(), settings)
            .change_context(AppError::Startup)?,
    );

    match cli.command.unwrap_or(CliCommand::Run) {
        CliCommand::Analyze {
            symbol,
            timeframe: override_tf,
        } => {
            let timeframe = match override_tf {
                Some(tf) => TimeFrame::from_str(&tf).ok_or_else(|| {
                    Report::new(AppError::Config).attach(format!("unknown timeframe \"{tf}\""))
                })?,
                None => timeframe,
            };
            analyze_once(&analyzer, &symbol.to_ascii_uppercase(), timeframe, &config).await
        }
        CliCommand::Run => serve(analyzer, timeframe, config).await,
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}

async fn analyze_once(
    analyzer: &Analyzer,
    symbol: &str,
    timeframe: TimeFrame,
    config: &AppConfig,
) -> Result<(), Report<AppError>> {
    let result = analyzer.analyze(symbol, timeframe).await;
    let json = serde_json::to_string_pretty(&result).change_context(AppError::Runtime)?;
    println!("{json}");
    println!();
    println!("{}", format_result(&result, config.telegram.mode));
    Ok(())
}

async fn serve(
    analyzer: Arc<Analyzer>,
    timeframe: TimeFrame,
    config: AppConfig,
) -> Result<(), Report<AppError>> {
    let (telegram, notifier, channel) = match config.telegram.credentials() {
        Some((token, channel)) => {
            let bot = Arc::new(TelegramBot::new(token).change_context(AppError::Startup)?);
            let notifier: Arc<dyn Notifier> = bot.clone();
            (Some(bot), notifier, channel.to_owned())
        }
        None => {
            tracing::warn!("telegram not configured; signals go to the log only");
            let notifier: Arc<dyn Notifier> = Arc::new(TerminalNotifier::default());
            (None, notifier, TERMINAL_CHANNEL.to_owned())
        }
    };

    let service = Arc::new(SignalService::new(
        analyzer,
        notifier,
        timeframe,
        config.telegram.mode,
        config.symbols.clone(),
        channel,
        Pacer::new(config.schedule.symbol_delay()),
    ));

    info!(
        symbols = ?config.symbols,
        timeframe = %timeframe,
        mode = %config.telegram.mode,
        "starting signal notifier"
    );

    let cancel = CancellationToken::new();
    let mut task_handles = Vec::new();

    task_handles.push(tokio::spawn(run_schedule(
        Arc::clone(&service),
        config.schedule.first_run_delay(),
        config.schedule.interval(),
        cancel.clone(),
    )));

    if let Some(telegram) = telegram {
        task_handles.push(tokio::spawn(bot::run_bot(
            telegram,
            Arc::clone(&service),
            cancel.clone(),
        )));
    }

    // ── Shutdown ──────────────────────────────────────────────────────────────
    tokio::signal::ctrl_c()
        .await
        .change_context(AppError::Runtime)?;

    info!("ctrl+c received, shutting down");
    cancel.cancel();

    for handle in task_handles {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    info!("shutdown complete");
    Ok(())
}
