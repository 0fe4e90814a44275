use crate::config::MappingStoreConfig;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

mod http;
mod memory;

pub use http::HttpMappingStore;
pub use memory::MemoryMappingStore;

/// One user's permitted assistants, grouped for the admin surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAssistantMapping {
    pub user_email: String,
    pub assistant_ids: Vec<String>,
}

/// Read/write contract over the (user email, assistant id) permission
/// relation. Emails are compared case-insensitively; implementations
/// store them lowercased. The storage schema behind this is the
/// backend's business.
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Assistant ids `user_email` may see calls for.
    async fn allowed_assistants(&self, user_email: &str) -> Result<HashSet<String>>;

    /// Every mapping, grouped by user.
    async fn all_mappings(&self) -> Result<Vec<UserAssistantMapping>>;

    /// Idempotent; `true` when the mapping exists afterwards.
    async fn add_mapping(&self, user_email: &str, assistant_id: &str) -> Result<bool>;

    async fn remove_mapping(&self, user_email: &str, assistant_id: &str) -> Result<bool>;
}

pub fn create_mapping_store(config: &MappingStoreConfig) -> Arc<dyn MappingStore> {
    match config {
        MappingStoreConfig::Memory => Arc::new(MemoryMappingStore::new()),
        MappingStoreConfig::Http {
            url,
            email_field,
            assistant_field,
            headers,
        } => Arc::new(HttpMappingStore::new(
            url,
            email_field,
            assistant_field,
            headers,
        )),
    }
}
