//! Async services over the store: conversation registry, mode control, the
//! message log and the knowledge document.

pub mod knowledge;
pub mod message_log;
pub mod mode;
pub mod registry;

pub use knowledge::KnowledgeStore;
pub use message_log::MessageLog;
pub use mode::ModeController;
pub use registry::ConversationRegistry;
