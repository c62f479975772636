pub mod config;
pub mod context;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod greeting;
pub mod llm;
pub mod operator;
pub mod services;
pub mod system_prompt;
pub mod transport;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Duration;

pub use error::{Error, Result};

/// Wired-up components shared by the transport loop and operator tooling.
pub struct Data {
    pub config: config::Config,
    pub db: db::Database,
    pub dispatcher: Arc<dispatcher::ConversationDispatcher>,
    pub operator: operator::Operator,
}

impl Data {
    pub fn new(
        config: config::Config,
        db: db::Database,
        transport: Arc<dyn transport::Transport>,
        provider: Arc<dyn llm::CompletionProvider>,
    ) -> Self {
        let dispatcher = Arc::new(dispatcher::ConversationDispatcher::new(
            db.clone(),
            transport,
            provider,
            config.history_limit,
            Duration::from_secs(config.llm_timeout_secs),
        ));
        let operator = operator::Operator::new(db.clone(), Arc::clone(&dispatcher));

        Self {
            config,
            db,
            dispatcher,
            operator,
        }
    }
}
