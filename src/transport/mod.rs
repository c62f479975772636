use async_trait::async_trait;

use crate::error::TransportError;

pub mod telegram;

pub use telegram::TelegramTransport;

/// One inbound text message from the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub chat_id: i64,
    /// Best effort; empty when the platform does not provide one.
    pub username: String,
    pub first_name: String,
    pub text: String,
    /// Lower-cased command name without the leading slash, e.g. `start`.
    pub command: Option<String>,
}

/// Outbound side of the chat platform. Failures are reported, never retried.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), TransportError>;
}
