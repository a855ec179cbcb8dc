use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::visibility::{DocumentVisibility, PublicDocMode};

#[async_trait]
pub trait DocVisibilityRepository: Send + Sync {
    async fn fetch(&self, workspace_id: &str, doc_id: &str) -> Result<Option<DocumentVisibility>>;

    /// Creates or updates the publication row. `mode = None` keeps the stored
    /// mode (or the default one for a new row).
    async fn upsert(
        &self,
        workspace_id: &str,
        doc_id: &str,
        public: bool,
        mode: Option<PublicDocMode>,
        updated_at: i64,
    ) -> Result<DocumentVisibility>;

    async fn count_public(&self, workspace_id: &str) -> Result<i64>;

    async fn list_public(&self, workspace_id: &str) -> Result<Vec<DocumentVisibility>>;
}

pub type DocVisibilityRepositoryRef = Arc<dyn DocVisibilityRepository>;
