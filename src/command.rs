/// A chat command understood by the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    /// `None` when the symbol argument is missing.
    Signal(Option<String>),
    RunSignals,
}

impl Command {
    /// Parse a message text such as `/signal btcusdt` or `/signal@my_bot BTCUSDT`.
    ///
    /// Returns `None` for plain text and unknown commands.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split_whitespace();
        let head = parts.next()?.strip_prefix('/')?;
        let name = head.split('@').next().unwrap_or(head);

        match name.to_ascii_lowercase().as_str() {
            "start" | "help" => Some(Self::Start),
            "signal" => Some(Self::Signal(
                parts.next().map(|s| s.trim().to_ascii_uppercase()),
            )),
            "run_signals" => Some(Self::RunSignals),
            _ => None,
        }
    }
}
