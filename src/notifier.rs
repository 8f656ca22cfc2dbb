pub mod telegram;
pub mod terminal;

use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::DeliveryError;

/// Handle to a delivered message, used to edit it later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub chat_id: String,
    pub message_id: i64,
}

/// Sink for formatted analysis messages.
pub trait Notifier: Send + Sync {
    fn send(
        &self,
        chat_id: &str,
        text: &str,
    ) -> BoxFuture<'_, Result<SentMessage, Report<DeliveryError>>>;

    /// Replace the text of a message sent earlier.
    fn edit(
        &self,
        message: &SentMessage,
        text: &str,
    ) -> BoxFuture<'_, Result<(), Report<DeliveryError>>>;
}
