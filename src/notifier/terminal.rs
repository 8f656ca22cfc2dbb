use std::sync::atomic::{AtomicI64, Ordering};

use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::DeliveryError;
use crate::notifier::{Notifier, SentMessage};

/// Writes messages to the log instead of a chat. Used when no bot token is configured.
#[derive(Default)]
pub struct TerminalNotifier {
    next_id: AtomicI64,
}

impl Notifier for TerminalNotifier {
    fn send(
        &self,
        chat_id: &str,
        text: &str,
    ) -> BoxFuture<'_, Result<SentMessage, Report<DeliveryError>>> {
        let message_id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::warn!(chat = chat_id, message_id, "SIGNAL:\n{}", text);
        let sent = SentMessage {
            chat_id: chat_id.to_owned(),
            message_id,
        };
        Box::pin(async move { Ok(sent) })
    }

    fn edit(
        &self,
        message: &SentMessage,
        text: &str,
    ) -> BoxFuture<'_, Result<(), Report<DeliveryError>>> {
        tracing::warn!(
            chat = %message.chat_id,
            message_id = message.message_id,
            "SIGNAL (update):\n{}",
            text
        );
        Box::pin(async { Ok(()) })
    }
}
