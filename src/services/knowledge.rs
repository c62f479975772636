use crate::db::{Database, KnowledgeDocument};
use crate::error::{Error, Result};

/// Read side of the versioned knowledge document, plus the dashboard's update.
#[derive(Clone)]
pub struct KnowledgeStore {
    db: Database,
}

impl KnowledgeStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Latest version, if any version exists.
    pub async fn current(&self) -> Result<Option<KnowledgeDocument>> {
        Ok(self.db.run_blocking(|db| db.get_knowledge_base()).await?)
    }

    /// Content of the latest version, empty when there is none.
    pub async fn current_text(&self) -> Result<String> {
        Ok(self
            .current()
            .await?
            .map(|document| document.content)
            .unwrap_or_default())
    }

    /// Appends a new current version; history is never rewritten.
    pub async fn set_current(&self, content: &str) -> Result<KnowledgeDocument> {
        if content.is_empty() {
            return Err(Error::Validation(
                "knowledge base content must not be empty".to_string(),
            ));
        }
        let content = content.to_string();
        Ok(self
            .db
            .run_blocking(move |db| db.insert_knowledge_version(&content))
            .await?)
    }

    /// Newest first.
    pub async fn history(&self, limit: usize) -> Result<Vec<KnowledgeDocument>> {
        Ok(self
            .db
            .run_blocking(move |db| db.knowledge_history(limit))
            .await?)
    }
}
