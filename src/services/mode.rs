use tracing::info;

use crate::db::Database;
use crate::error::Result;

/// Switches conversations between auto replies and operator hand-off.
#[derive(Clone)]
pub struct ModeController {
    db: Database,
}

impl ModeController {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Idempotent; the next read of the conversation sees the new value.
    /// Unknown conversation ids are reported as a persistence failure.
    pub async fn set_auto(&self, conversation_id: i64, active: bool) -> Result<()> {
        self.db
            .run_blocking(move |db| db.set_bot_active(conversation_id, active))
            .await?;
        info!(
            "Conversation {} is now {}",
            conversation_id,
            if active { "auto" } else { "handed off" }
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, PersistenceError};
    use crate::services::ConversationRegistry;
    use crate::testing::test_db;

    #[tokio::test]
    async fn test_set_auto_round_trip() {
        let db = test_db();
        let registry = ConversationRegistry::new(db.clone());
        let modes = ModeController::new(db);

        let conv = registry.upsert(1, "", "").await.unwrap();
        modes.set_auto(conv.id, false).await.unwrap();
        modes.set_auto(conv.id, false).await.unwrap();
        assert!(!registry.get(conv.id).await.unwrap().unwrap().is_auto_active);

        modes.set_auto(conv.id, true).await.unwrap();
        assert!(registry.get(conv.id).await.unwrap().unwrap().is_auto_active);
    }

    #[tokio::test]
    async fn test_set_auto_unknown_conversation() {
        let modes = ModeController::new(test_db());
        let err = modes.set_auto(404, false).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Persistence(PersistenceError::UnknownConversation(404))
        ));
    }
}
