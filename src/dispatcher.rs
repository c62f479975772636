//! Inbound message dispatch
//!
//! For every inbound event the dispatcher records the user's text, then either
//! answers (onboarding command, greeting shortcut or assistant reply) or stays
//! silent because an operator has taken the conversation over. Work on one
//! conversation is serialized by a per-conversation lock so the transcript the
//! assistant reads always ends with the message being answered.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, error, info, warn};

use crate::context::ContextAssembler;
use crate::db::{Conversation, Database, Message, SenderRole};
use crate::error::{Error, Result};
use crate::greeting::{self, GREETING_REPLY};
use crate::llm::CompletionProvider;
use crate::services::{ConversationRegistry, KnowledgeStore, MessageLog};
use crate::transport::{InboundEvent, Transport};

/// Reply to `/start` and `/help`, sent whatever the conversation mode.
pub const ONBOARDING_REPLY: &str = "Halo! Saya siap membantu Anda. Silakan tanyakan apa saja!";

const ONBOARDING_COMMANDS: [&str; 2] = ["start", "help"];

/// Idle lock entries are pruned once the table grows past this size.
const LOCK_TABLE_PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Onboarding,
    Greeting,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Replied { reply: String, kind: ReplyKind },
    /// Auto replies are off; the operator answers through the admin path.
    HandedOff,
}

/// One async mutex per conversation id.
#[derive(Clone, Default)]
pub struct ConversationLocks {
    locks: Arc<Mutex<HashMap<i64, Arc<Mutex<()>>>>>,
}

impl ConversationLocks {
    pub async fn acquire(&self, conversation_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            if locks.len() > LOCK_TABLE_PRUNE_THRESHOLD {
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            locks
                .entry(conversation_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

pub struct ConversationDispatcher {
    registry: ConversationRegistry,
    log: MessageLog,
    knowledge: KnowledgeStore,
    assembler: ContextAssembler,
    transport: Arc<dyn Transport>,
    locks: ConversationLocks,
    /// Held for reading by every send-and-record step; [`Self::drain`] takes it
    /// for writing to wait them out.
    in_flight: Arc<RwLock<()>>,
}

impl ConversationDispatcher {
    pub fn new(
        db: Database,
        transport: Arc<dyn Transport>,
        provider: Arc<dyn CompletionProvider>,
        history_limit: usize,
        completion_timeout: Duration,
    ) -> Self {
        let log = MessageLog::new(db.clone());
        Self {
            registry: ConversationRegistry::new(db.clone()),
            assembler: ContextAssembler::new(
                log.clone(),
                provider,
                history_limit,
                completion_timeout,
            ),
            knowledge: KnowledgeStore::new(db),
            log,
            transport,
            locks: ConversationLocks::default(),
            in_flight: Arc::new(RwLock::new(())),
        }
    }

    pub async fn handle(&self, event: InboundEvent) -> Result<DispatchOutcome> {
        let conversation = self
            .registry
            .upsert(event.chat_id, &event.username, &event.first_name)
            .await?;
        let guard = self.locks.acquire(conversation.id).await;

        // The mode may have changed while waiting for the lock.
        let conversation = self
            .registry
            .get(conversation.id)
            .await?
            .unwrap_or(conversation);

        self.log
            .append(conversation.id, SenderRole::User, &event.text)
            .await?;

        let is_onboarding = event
            .command
            .as_deref()
            .is_some_and(|name| ONBOARDING_COMMANDS.contains(&name));
        if is_onboarding {
            return self
                .deliver(guard, conversation, ONBOARDING_REPLY.to_string(), ReplyKind::Onboarding)
                .await;
        }

        if !conversation.is_auto_active {
            info!(
                "Auto replies off for chat {}, leaving it to the operator",
                conversation.chat_id
            );
            return Ok(DispatchOutcome::HandedOff);
        }

        let knowledge_base = match self.knowledge.current_text().await {
            Ok(text) => text,
            Err(e) => {
                warn!("Could not load knowledge base: {}", e);
                String::new()
            }
        };

        let (reply, kind) = if greeting::matches(&event.text) {
            debug!("Greeting shortcut for chat {}", conversation.chat_id);
            (GREETING_REPLY.to_string(), ReplyKind::Greeting)
        } else {
            let reply = self
                .assembler
                .build_reply(&event.text, &knowledge_base, conversation.id)
                .await;
            (reply, ReplyKind::Assistant)
        };

        self.deliver(guard, conversation, reply, kind).await
    }

    /// Sends `text` to the user as the operator and records it with the admin
    /// role. Works in either mode.
    pub async fn send_as_admin(
        &self,
        chat_id: i64,
        text: &str,
        conversation_id: i64,
    ) -> Result<Message> {
        if text.is_empty() {
            return Err(Error::Validation("message text must not be empty".to_string()));
        }

        let guard = self.locks.acquire(conversation_id).await;
        let transport = Arc::clone(&self.transport);
        let log = self.log.clone();
        let text = text.to_string();

        self.finish(async move {
            let _guard = guard;
            transport.send(chat_id, &text).await?;
            let message = log.append(conversation_id, SenderRole::Admin, &text).await?;
            info!("Operator message sent to chat {}", chat_id);
            Ok(message)
        })
        .await
    }

    /// Waits for every send-and-record step already started.
    pub async fn drain(&self) {
        let _all = self.in_flight.write().await;
    }

    /// Sends the reply and records it as the bot's message. A failed send is
    /// still recorded, then reported as a transport error.
    async fn deliver(
        &self,
        guard: OwnedMutexGuard<()>,
        conversation: Conversation,
        reply: String,
        kind: ReplyKind,
    ) -> Result<DispatchOutcome> {
        let transport = Arc::clone(&self.transport);
        let log = self.log.clone();

        self.finish(async move {
            let _guard = guard;
            let sent = transport.send(conversation.chat_id, &reply).await;
            if let Err(e) = &sent {
                error!("Reply to chat {} not delivered: {}", conversation.chat_id, e);
            }
            log.append(conversation.id, SenderRole::Bot, &reply).await?;
            sent?;
            Ok(DispatchOutcome::Replied { reply, kind })
        })
        .await
    }

    /// Runs the final write sequence on its own task so cancelling the caller
    /// cannot leave a reply sent but unrecorded.
    async fn finish<T, F>(&self, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.in_flight).read_owned().await;
        tokio::spawn(async move {
            let _permit = permit;
            work.await
        })
        .await?
    }
}
