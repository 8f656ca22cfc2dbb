use crate::model::{AnalysisResult, Mode, Verdict};

/// Render an analysis result as a Markdown chat message.
pub fn format_result(result: &AnalysisResult, mode: Mode) -> String {
    match result.verdict {
        Verdict::Error => format!(
            "*{}* - Error: {}",
            result.symbol,
            result.error.as_deref().unwrap_or("unknown error")
        ),
        Verdict::NoSignal => format!(
            "*{}* - _No clear signal_\nRSI: {:.1}\nReason: {}",
            result.symbol, result.momentum, result.reasoning
        ),
        Verdict::Long | Verdict::Short => format!(
            "*{}* - *{}*\nEntry: `{}`\nStop: `{}`\nTP: `{}`\nRSI: {:.1}\nMode: {}\nReason: {}",
            result.symbol,
            result.verdict,
            result.entry,
            price_or_dash(result.stop),
            price_or_dash(result.take_profit),
            result.momentum,
            mode,
            result.reasoning
        ),
    }
}

fn price_or_dash(price: Option<f64>) -> String {
    price.map_or_else(|| "-".to_owned(), |p| p.to_string())
}

pub fn help_text(mode: Mode) -> String {
    format!(
        "Crossover signals ({mode} mode)\n\nCommands:\n\
         /signal <SYMBOL> - get single symbol analysis\n\
         /run_signals - run the scheduled batch now\n\
         Signals are posted to the configured channel on a schedule."
    )
}
