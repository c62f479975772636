//! Test doubles shared by the unit tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

use crate::db::Database;
use crate::error::{CompletionError, TransportError};
use crate::llm::{CompletionProvider, PromptTurn};
use crate::transport::telegram::parse_command;
use crate::transport::{InboundEvent, Transport};

pub fn test_db() -> Database {
    let db = Database::open(":memory:").unwrap();
    db.execute_init().unwrap();
    db
}

pub fn event(chat_id: i64, text: &str) -> InboundEvent {
    InboundEvent {
        chat_id,
        username: format!("user{}", chat_id),
        first_name: "Tester".to_string(),
        text: text.to_string(),
        command: parse_command(text),
    }
}

/// Records every send; can be told to fail or to stall.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(i64, String)>>,
    fail: AtomicBool,
    delay: Mutex<Option<Duration>>,
    started: Notify,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn delay_sends(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Resolves once a send has begun.
    pub async fn send_started(&self) {
        self.started.notified().await;
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), TransportError> {
        self.started.notify_one();
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError {
                chat_id,
                reason: "chat not found".to_string(),
            });
        }
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }
}

enum Script {
    Queue(Mutex<VecDeque<Result<String, CompletionError>>>),
    Echo,
}

/// Completion provider returning queued results and recording each prompt.
pub struct ScriptedProvider {
    script: Script,
    configured: bool,
    delay: Option<Duration>,
    calls: Mutex<Vec<Vec<PromptTurn>>>,
}

impl ScriptedProvider {
    pub fn new(results: Vec<Result<String, CompletionError>>) -> Self {
        Self {
            script: Script::Queue(Mutex::new(results.into())),
            configured: true,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn replying<const N: usize>(replies: [&str; N]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    /// Answers `echo: <last turn>` forever.
    pub fn echo() -> Self {
        Self {
            script: Script::Echo,
            ..Self::new(Vec::new())
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new(Vec::new())
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Vec<PromptTurn>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn complete(&self, turns: Vec<PromptTurn>) -> Result<String, CompletionError> {
        if !self.configured {
            return Err(CompletionError::NotConfigured);
        }
        self.calls.lock().unwrap().push(turns.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.script {
            Script::Queue(queue) => queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(CompletionError::EmptyChoices)),
            Script::Echo => {
                let last = turns.last().map(|t| t.content.as_str()).unwrap_or_default();
                Ok(format!("echo: {}", last))
            }
        }
    }
}
