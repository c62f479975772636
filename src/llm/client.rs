use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::CompletionError;
use crate::llm::{CompletionProvider, PromptRole, PromptTurn};

/// OpenAI-compatible chat completion client.
pub struct LlmClient {
    chat_client: Client<OpenAIConfig>,
    chat_model: String,
    configured: bool,
    timeout: Duration,
}

impl LlmClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let api_base = config.openai_api_base.trim_end_matches('/');
        let mut chat_config = OpenAIConfig::new().with_api_base(api_base);

        let configured = match &config.openai_api_key {
            Some(key) => {
                chat_config = chat_config.with_api_key(key);
                info!(
                    "LLM: Using {} with model {} (key {})",
                    api_base,
                    config.openai_model,
                    mask_key(key)
                );
                true
            }
            None => {
                warn!("LLM: OPENAI_API_KEY not set, assistant replies are disabled");
                false
            }
        };

        let timeout = Duration::from_secs(config.llm_timeout_secs);
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            chat_client: Client::with_config(chat_config).with_http_client(http_client),
            chat_model: config.openai_model.clone(),
            configured,
            timeout,
        })
    }
}

#[async_trait]
impl CompletionProvider for LlmClient {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn complete(&self, turns: Vec<PromptTurn>) -> Result<String, CompletionError> {
        if !self.configured {
            return Err(CompletionError::NotConfigured);
        }

        let messages = turns
            .into_iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>, _>>()?;
        debug!("LLM: Sending {} messages to {}", messages.len(), self.chat_model);

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.chat_model)
            .messages(messages)
            .build()?;

        let response = match self.chat_client.chat().create(request).await {
            Ok(response) => response,
            Err(OpenAIError::Reqwest(e)) if e.is_timeout() => {
                return Err(CompletionError::Timeout(self.timeout.as_secs()));
            }
            Err(e) => return Err(e.into()),
        };

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or(CompletionError::EmptyChoices)?;

        choice
            .message
            .content
            .filter(|content| !content.is_empty())
            .ok_or(CompletionError::EmptyContent)
    }
}

fn to_request_message(turn: PromptTurn) -> Result<ChatCompletionRequestMessage, CompletionError> {
    let message = match turn.role {
        PromptRole::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(turn.content)
            .build()?
            .into(),
        PromptRole::User => ChatCompletionRequestUserMessageArgs::default()
            .content(turn.content)
            .build()?
            .into(),
        PromptRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(turn.content)
            .build()?
            .into(),
    };
    Ok(message)
}

/// Shows only the first and last four characters of a key.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}****{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_key: Option<&str>) -> Config {
        Config {
            telegram_token: "test".to_string(),
            openai_api_key: api_key.map(str::to_string),
            openai_api_base: "http://127.0.0.1:9/v1/".to_string(),
            openai_model: "test-model".to_string(),
            database_url: ":memory:".to_string(),
            history_limit: 10,
            llm_timeout_secs: 1,
        }
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("short"), "****");
        assert_eq!(mask_key("12345678"), "****");
        assert_eq!(mask_key("sk-abcdef123456"), "sk-a****3456");
    }

    #[tokio::test]
    async fn test_unconfigured_client_never_calls_out() {
        let client = LlmClient::new(&config(None)).unwrap();
        assert!(!client.is_configured());

        let result = client.complete(vec![PromptTurn::user("halo")]).await;
        assert!(matches!(result, Err(CompletionError::NotConfigured)));
    }

    #[test]
    fn test_request_message_roles() {
        let system = to_request_message(PromptTurn::system("s")).unwrap();
        let user = to_request_message(PromptTurn::user("u")).unwrap();
        let assistant = to_request_message(PromptTurn::assistant("a")).unwrap();

        assert!(matches!(system, ChatCompletionRequestMessage::System(_)));
        assert!(matches!(user, ChatCompletionRequestMessage::User(_)));
        assert!(matches!(assistant, ChatCompletionRequestMessage::Assistant(_)));
    }
}
