//! Conversation context assembly for assistant replies
//!
//! Turns the stored transcript into a bounded two-role history, wraps it with the
//! knowledge-base system instruction and asks the completion provider for a reply.
//! Provider failures never reach the caller of [`ContextAssembler::build_reply`];
//! they degrade to a fixed apology.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::db::{Message, SenderRole};
use crate::error::{CompletionError, Error, Result};
use crate::llm::{CompletionProvider, PromptTurn};
use crate::services::MessageLog;
use crate::system_prompt::build_system_prompt;

/// Sent (and recorded) when the provider fails for any reason.
pub const APOLOGY_REPLY: &str = "Maaf, saya sedang mengalami kendala. Bisa ulangi pertanyaannya?";

/// Sent when no API key is configured.
pub const NOT_CONFIGURED_REPLY: &str = "Maaf, sistem AI belum dikonfigurasi. Silakan hubungi admin.";

pub struct ContextAssembler {
    log: MessageLog,
    provider: Arc<dyn CompletionProvider>,
    history_limit: usize,
    timeout: Duration,
}

impl ContextAssembler {
    pub fn new(
        log: MessageLog,
        provider: Arc<dyn CompletionProvider>,
        history_limit: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            log,
            provider,
            history_limit,
            timeout,
        }
    }

    /// Always yields text to send: the model's reply, or one of the fixed
    /// fallback sentences.
    pub async fn build_reply(&self, query: &str, knowledge_base: &str, conversation_id: i64) -> String {
        match self.try_build_reply(query, knowledge_base, conversation_id).await {
            Ok(reply) => reply,
            Err(Error::Configuration(reason)) => {
                error!("Assistant not configured: {}", reason);
                NOT_CONFIGURED_REPLY.to_string()
            }
            Err(e) => {
                error!(
                    "Completion failed for conversation {}: {}",
                    conversation_id, e
                );
                APOLOGY_REPLY.to_string()
            }
        }
    }

    /// Same as [`Self::build_reply`] but reports why the provider was not usable.
    pub async fn try_build_reply(
        &self,
        query: &str,
        knowledge_base: &str,
        conversation_id: i64,
    ) -> Result<String> {
        if !self.provider.is_configured() {
            return Err(Error::Configuration(CompletionError::NotConfigured.to_string()));
        }

        let history = match self.log.recent_messages(conversation_id, self.history_limit).await {
            Ok(history) => history,
            Err(e) => {
                warn!(
                    "Could not load history for conversation {}: {}",
                    conversation_id, e
                );
                Vec::new()
            }
        };
        debug!(
            "Loaded {} messages of history for conversation {}",
            history.len(),
            conversation_id
        );

        let turns = build_prompt(knowledge_base, &history, query);
        info!(
            "Querying completion provider for conversation {} ({} history turns)",
            conversation_id,
            turns.len() - 2
        );

        let reply = match tokio::time::timeout(self.timeout, self.provider.complete(turns)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(CompletionError::NotConfigured)) => {
                return Err(Error::Configuration(CompletionError::NotConfigured.to_string()));
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(CompletionError::Timeout(self.timeout.as_secs()).into()),
        };

        debug!("Completion reply ({} chars)", reply.chars().count());
        Ok(reply)
    }
}

/// System instruction, prior history, then the current query as the last turn.
pub fn build_prompt(knowledge_base: &str, history: &[Message], query: &str) -> Vec<PromptTurn> {
    let mut turns = Vec::with_capacity(history.len() + 2);
    turns.push(PromptTurn::system(build_system_prompt(knowledge_base)));
    turns.extend(history_turns(history, query));
    turns.push(PromptTurn::user(query));
    turns
}

/// Maps stored messages onto the two-role schema, dropping the newest row when
/// it is the just-appended copy of `query`.
pub fn history_turns(history: &[Message], query: &str) -> Vec<PromptTurn> {
    let prior = match history.split_last() {
        Some((last, rest)) if last.role == SenderRole::User && last.text == query => rest,
        _ => history,
    };
    prior.iter().map(format_message).collect()
}

/// Operator messages are presented as the assistant's own words.
fn format_message(msg: &Message) -> PromptTurn {
    match msg.role {
        SenderRole::User => PromptTurn::user(msg.text.clone()),
        SenderRole::Bot | SenderRole::Admin => PromptTurn::assistant(msg.text.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::PromptRole;
    use crate::services::ConversationRegistry;
    use crate::testing::{test_db, ScriptedProvider};
    use chrono::Utc;

    fn message(id: i64, role: SenderRole, text: &str) -> Message {
        Message {
            id,
            conversation_id: 1,
            role,
            text: text.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_history_excludes_current_message() {
        let history = vec![
            message(1, SenderRole::User, "berapa harga kentang?"),
            message(2, SenderRole::Bot, "Rp5ribu, kak"),
            message(3, SenderRole::User, "kalau 20?"),
        ];

        let turns = history_turns(&history, "kalau 20?");
        assert_eq!(
            turns,
            vec![
                PromptTurn::user("berapa harga kentang?"),
                PromptTurn::assistant("Rp5ribu, kak"),
            ]
        );
    }

    #[test]
    fn test_history_keeps_last_row_when_not_current() {
        let history = vec![
            message(1, SenderRole::User, "kalau 20?"),
            message(2, SenderRole::Admin, "Rp80ribu kak"),
        ];
        // Newest row is not a user row, so nothing is dropped.
        assert_eq!(history_turns(&history, "kalau 20?").len(), 2);

        let history = vec![message(1, SenderRole::User, "kalau 20? ")];
        // Byte-for-byte comparison: trailing space differs.
        assert_eq!(history_turns(&history, "kalau 20?").len(), 1);
    }

    #[test]
    fn test_role_mapping() {
        let history = vec![
            message(1, SenderRole::User, "a"),
            message(2, SenderRole::Bot, "b"),
            message(3, SenderRole::Admin, "c"),
        ];
        let roles: Vec<_> = history_turns(&history, "next")
            .into_iter()
            .map(|t| t.role)
            .collect();
        assert_eq!(
            roles,
            vec![PromptRole::User, PromptRole::Assistant, PromptRole::Assistant]
        );
    }

    #[test]
    fn test_prompt_layout() {
        let history = vec![
            message(1, SenderRole::User, "a"),
            message(2, SenderRole::Bot, "b"),
            message(3, SenderRole::User, "q"),
        ];
        let turns = build_prompt("KB-TEXT", &history, "q");
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[0].role, PromptRole::System);
        assert!(turns[0].content.contains("KB-TEXT"));
        assert_eq!(turns[1], PromptTurn::user("a"));
        assert_eq!(turns[2], PromptTurn::assistant("b"));
        assert_eq!(turns[3], PromptTurn::user("q"));
    }

    #[tokio::test]
    async fn test_history_window_is_bounded() {
        let db = test_db();
        let conv = ConversationRegistry::new(db.clone())
            .upsert(1, "", "")
            .await
            .unwrap();
        let log = MessageLog::new(db);
        for i in 0..12 {
            log.append(conv.id, SenderRole::User, &format!("old {}", i))
                .await
                .unwrap();
        }
        log.append(conv.id, SenderRole::User, "current").await.unwrap();

        let provider = Arc::new(ScriptedProvider::replying(["ok"]));
        let assembler = ContextAssembler::new(log, provider.clone(), 4, Duration::from_secs(5));

        let reply = assembler.build_reply("current", "kb", conv.id).await;
        assert_eq!(reply, "ok");

        let calls = provider.calls();
        assert_eq!(calls.len(), 1);
        let turns = &calls[0];
        // system + 3 prior turns (window of 4 minus the current row) + query
        assert_eq!(turns.len(), 5);
        assert_eq!(turns[1], PromptTurn::user("old 9"));
        assert_eq!(turns[3], PromptTurn::user("old 11"));
        assert_eq!(turns[4], PromptTurn::user("current"));
    }

    #[tokio::test]
    async fn test_provider_failure_degrades_to_apology() {
        let db = test_db();
        let provider = Arc::new(ScriptedProvider::new(vec![Err(CompletionError::EmptyChoices)]));
        let assembler = ContextAssembler::new(
            MessageLog::new(db),
            provider.clone(),
            10,
            Duration::from_secs(5),
        );

        assert_eq!(assembler.build_reply("q", "kb", 1).await, APOLOGY_REPLY);
        assert_eq!(provider.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let db = test_db();
        let provider = Arc::new(
            ScriptedProvider::replying(["too late"]).with_delay(Duration::from_secs(5)),
        );
        let assembler = ContextAssembler::new(
            MessageLog::new(db),
            provider,
            10,
            Duration::from_millis(50),
        );

        let err = assembler.try_build_reply("q", "kb", 1).await.unwrap_err();
        assert!(matches!(err, Error::Completion(CompletionError::Timeout(_))));
        assert_eq!(assembler.build_reply("q", "kb", 1).await, APOLOGY_REPLY);
    }

    #[tokio::test]
    async fn test_unconfigured_provider_is_not_called() {
        let db = test_db();
        let provider = Arc::new(ScriptedProvider::unconfigured());
        let assembler = ContextAssembler::new(
            MessageLog::new(db),
            provider.clone(),
            10,
            Duration::from_secs(5),
        );

        assert_eq!(assembler.build_reply("q", "kb", 1).await, NOT_CONFIGURED_REPLY);
        assert!(provider.calls().is_empty());
    }
}
