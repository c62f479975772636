use crate::db::{Conversation, ConversationOverview, Database};
use crate::error::Result;

/// Upsert-by-chat-id access to conversations.
#[derive(Clone)]
pub struct ConversationRegistry {
    db: Database,
}

impl ConversationRegistry {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Returns the conversation for `chat_id`, creating it in auto mode on first
    /// contact. The unique key on the chat id keeps concurrent callers from
    /// creating duplicates.
    pub async fn upsert(
        &self,
        chat_id: i64,
        username: &str,
        first_name: &str,
    ) -> Result<Conversation> {
        let username = username.to_string();
        let first_name = first_name.to_string();
        let conversation = self
            .db
            .run_blocking(move |db| db.upsert_conversation(chat_id, &username, &first_name))
            .await?;
        Ok(conversation)
    }

    pub async fn get(&self, conversation_id: i64) -> Result<Option<Conversation>> {
        let conversation = self
            .db
            .run_blocking(move |db| db.get_conversation(conversation_id))
            .await?;
        Ok(conversation)
    }

    pub async fn list(&self) -> Result<Vec<ConversationOverview>> {
        Ok(self.db.run_blocking(|db| db.list_conversations()).await?)
    }
}
