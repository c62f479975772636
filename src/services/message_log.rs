use crate::db::{Database, Message, SenderRole};
use crate::error::{Error, Result};

/// Append-only transcript storage.
#[derive(Clone)]
pub struct MessageLog {
    db: Database,
}

impl MessageLog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Empty text is rejected before touching the store. On success the owning
    /// conversation's activity time has been refreshed as well.
    pub async fn append(
        &self,
        conversation_id: i64,
        role: SenderRole,
        text: &str,
    ) -> Result<Message> {
        if text.is_empty() {
            return Err(Error::Validation("message text must not be empty".to_string()));
        }
        let text = text.to_string();
        let message = self
            .db
            .run_blocking(move |db| db.append_message(conversation_id, role, &text))
            .await?;
        Ok(message)
    }

    /// At most `limit` most recent messages in ascending order. A fresh read on
    /// every call; an empty transcript is not an error.
    pub async fn recent_messages(&self, conversation_id: i64, limit: usize) -> Result<Vec<Message>> {
        let messages = self
            .db
            .run_blocking(move |db| db.recent_messages(conversation_id, limit))
            .await?;
        Ok(messages)
    }

    pub async fn transcript(&self, conversation_id: i64) -> Result<Vec<Message>> {
        Ok(self
            .db
            .run_blocking(move |db| db.messages(conversation_id))
            .await?)
    }
}
