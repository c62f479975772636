use async_trait::async_trait;

use crate::error::CompletionError;

pub mod client;

pub use client::LlmClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

/// One turn of a completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTurn {
    pub role: PromptRole,
    pub content: String,
}

impl PromptTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::Assistant,
            content: content.into(),
        }
    }
}

/// Turns an ordered prompt into reply text.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// False when the provider lacks credentials; callers should not call
    /// [`CompletionProvider::complete`] at all in that case.
    fn is_configured(&self) -> bool {
        true
    }

    async fn complete(&self, turns: Vec<PromptTurn>) -> Result<String, CompletionError>;
}
