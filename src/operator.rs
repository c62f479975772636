//! Operator-facing operations behind the dashboard: browse conversations, take
//! them over or hand them back, talk to users directly and edit the knowledge base.

use std::sync::Arc;

use crate::db::{ConversationOverview, Database, KnowledgeDocument, Message};
use crate::dispatcher::ConversationDispatcher;
use crate::error::{Error, PersistenceError, Result};
use crate::services::{ConversationRegistry, KnowledgeStore, MessageLog, ModeController};

#[derive(Clone)]
pub struct Operator {
    registry: ConversationRegistry,
    modes: ModeController,
    log: MessageLog,
    knowledge: KnowledgeStore,
    dispatcher: Arc<ConversationDispatcher>,
}

impl Operator {
    pub fn new(db: Database, dispatcher: Arc<ConversationDispatcher>) -> Self {
        Self {
            registry: ConversationRegistry::new(db.clone()),
            modes: ModeController::new(db.clone()),
            log: MessageLog::new(db.clone()),
            knowledge: KnowledgeStore::new(db),
            dispatcher,
        }
    }

    pub async fn list_conversations(&self) -> Result<Vec<ConversationOverview>> {
        self.registry.list().await
    }

    pub async fn transcript(&self, conversation_id: i64) -> Result<Vec<Message>> {
        self.log.transcript(conversation_id).await
    }

    /// Stops automated replies for the conversation.
    pub async fn take_over(&self, conversation_id: i64) -> Result<()> {
        self.modes.set_auto(conversation_id, false).await
    }

    /// Re-enables automated replies for the conversation.
    pub async fn hand_back(&self, conversation_id: i64) -> Result<()> {
        self.modes.set_auto(conversation_id, true).await
    }

    pub async fn send(&self, conversation_id: i64, text: &str) -> Result<Message> {
        if text.is_empty() {
            return Err(Error::Validation("message cannot be empty".to_string()));
        }
        let conversation = self
            .registry
            .get(conversation_id)
            .await?
            .ok_or(PersistenceError::UnknownConversation(conversation_id))?;

        self.dispatcher
            .send_as_admin(conversation.chat_id, text, conversation.id)
            .await
    }

    pub async fn knowledge(&self) -> Result<Option<KnowledgeDocument>> {
        self.knowledge.current().await
    }

    pub async fn update_knowledge(&self, content: &str) -> Result<KnowledgeDocument> {
        self.knowledge.set_current(content).await
    }

    pub async fn knowledge_history(&self, limit: usize) -> Result<Vec<KnowledgeDocument>> {
        self.knowledge.history(limit).await
    }
}
