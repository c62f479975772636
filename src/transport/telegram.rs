//! Telegram adapter built on teloxide.

use async_trait::async_trait;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::Message as TelegramMessage;
use tracing::{debug, error};

use crate::dispatcher::ConversationDispatcher;
use crate::error::TransportError;
use crate::transport::{InboundEvent, Transport};

#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), TransportError> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .map_err(|e| TransportError {
                chat_id,
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

/// Polls Telegram until Ctrl-C. Updates for one chat are handled in order;
/// on shutdown the dispatcher waits for handlers already running.
pub async fn run_polling(bot: Bot, dispatcher: Arc<ConversationDispatcher>) {
    let handler = Update::filter_message().endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .default_handler(|_| async {})
        .dependencies(dptree::deps![dispatcher])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn handle_message(
    msg: TelegramMessage,
    dispatcher: Arc<ConversationDispatcher>,
) -> ResponseResult<()> {
    let Some(event) = inbound_event(&msg) else {
        debug!("Ignoring non-text update in chat {}", msg.chat.id.0);
        return Ok(());
    };

    let chat_id = event.chat_id;
    match dispatcher.handle(event).await {
        Ok(outcome) => debug!("Chat {} handled: {:?}", chat_id, outcome),
        Err(e) => error!("Failed to handle message in chat {}: {}", chat_id, e),
    }
    Ok(())
}

/// Converts a Telegram message into an [`InboundEvent`]; non-text messages yield `None`.
pub fn inbound_event(msg: &TelegramMessage) -> Option<InboundEvent> {
    let text = msg.text()?.to_string();
    let (username, first_name) = msg
        .from
        .as_ref()
        .map(|user| (user.username.clone().unwrap_or_default(), user.first_name.clone()))
        .unwrap_or_default();

    Some(InboundEvent {
        chat_id: msg.chat.id.0,
        username,
        first_name,
        command: parse_command(&text),
        text,
    })
}

/// `/Start@my_bot now` → `start`.
pub fn parse_command(text: &str) -> Option<String> {
    let rest = text.strip_prefix('/')?;
    let token = rest.split(char::is_whitespace).next()?;
    let name = token.split('@').next().unwrap_or(token);
    if name.is_empty() {
        return None;
    }
    Some(name.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("/start"), Some("start".to_string()));
        assert_eq!(parse_command("/help please"), Some("help".to_string()));
        assert_eq!(parse_command("/Start@telecust_bot"), Some("start".to_string()));
        assert_eq!(parse_command("/order 20"), Some("order".to_string()));
    }

    #[test]
    fn test_parse_command_rejects_plain_text() {
        assert_eq!(parse_command("start"), None);
        assert_eq!(parse_command("/"), None);
        assert_eq!(parse_command("/ start"), None);
        assert_eq!(parse_command("/@bot"), None);
        assert_eq!(parse_command(" /start"), None);
    }
}
