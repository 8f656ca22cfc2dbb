use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::message::help_text;
use crate::notifier::telegram::{TelegramBot, Update};
use crate::scheduler::SignalService;

const POLL_BACKOFF: Duration = Duration::from_secs(5);

pub const USAGE_SIGNAL: &str = "Usage: /signal BTCUSDT";
pub const MANUAL_RUN_REPLY: &str = "Running signals now (manual trigger)...";

/// Long-poll Telegram for commands until cancelled. Each command runs in its own task.
pub async fn run_bot(
    telegram: Arc<TelegramBot>,
    service: Arc<SignalService>,
    cancel: CancellationToken,
) {
    info!("command bot started");
    let mut offset = 0_i64;

    loop {
        let polled = tokio::select! {
            _ = cancel.cancelled() => break,
            polled = telegram.get_updates(offset) => polled,
        };

        let updates = match polled {
            Ok(updates) => updates,
            Err(report) => {
                warn!(error = ?report, "telegram poll failed, retrying");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(POLL_BACKOFF) => continue,
                }
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some((chat_id, command)) = command_from(&update) else {
                continue;
            };
            debug!(chat = %chat_id, ?command, "command received");

            let service = Arc::clone(&service);
            tokio::spawn(async move {
                handle_command(&service, &chat_id, command).await;
            });
        }
    }

    info!("command bot stopped");
}

fn command_from(update: &Update) -> Option<(String, Command)> {
    let message = update.message.as_ref()?;
    let command = Command::parse(message.text.as_deref()?)?;
    Some((message.chat.id.to_string(), command))
}

/// Answer one command in `chat_id`. Delivery failures are logged.
pub async fn handle_command(service: &SignalService, chat_id: &str, command: Command) {
    let notifier = service.notifier();

    match command {
        Command::Start => {
            if let Err(report) = notifier.send(chat_id, &help_text(service.mode())).await {
                warn!(chat = chat_id, error = ?report, "failed to send help");
            }
        }
        Command::Signal(None) => {
            if let Err(report) = notifier.send(chat_id, USAGE_SIGNAL).await {
                warn!(chat = chat_id, error = ?report, "failed to send usage");
            }
        }
        Command::Signal(Some(symbol)) => {
            let pending = match notifier
                .send(chat_id, &format!("Analyzing {symbol} ..."))
                .await
            {
                Ok(sent) => sent,
                Err(report) => {
                    warn!(chat = chat_id, symbol = %symbol, error = ?report, "failed to acknowledge");
                    return;
                }
            };

            let result = service.analyze(&symbol).await;
            let text = service.format(&result);
            if let Err(report) = notifier.edit(&pending, &text).await {
                warn!(chat = chat_id, symbol = %symbol, error = ?report, "failed to deliver result");
            }
        }
        Command::RunSignals => {
            if let Err(report) = notifier.send(chat_id, MANUAL_RUN_REPLY).await {
                warn!(chat = chat_id, error = ?report, "failed to acknowledge manual run");
            }
            service.run_batch().await;
        }
    }
}
