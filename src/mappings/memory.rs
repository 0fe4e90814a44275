use super::{MappingStore, UserAssistantMapping};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tokio::sync::RwLock;

/// In-process store for development and tests.
#[derive(Default)]
pub struct MemoryMappingStore {
    mappings: RwLock<BTreeMap<String, BTreeSet<String>>>,
}

impl MemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MappingStore for MemoryMappingStore {
    async fn allowed_assistants(&self, user_email: &str) -> Result<HashSet<String>> {
        let mappings = self.mappings.read().await;
        Ok(mappings
            .get(&user_email.to_lowercase())
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn all_mappings(&self) -> Result<Vec<UserAssistantMapping>> {
        let mappings = self.mappings.read().await;
        Ok(mappings
            .iter()
            .map(|(email, ids)| UserAssistantMapping {
                user_email: email.clone(),
                assistant_ids: ids.iter().cloned().collect(),
            })
            .collect())
    }

    async fn add_mapping(&self, user_email: &str, assistant_id: &str) -> Result<bool> {
        let mut mappings = self.mappings.write().await;
        mappings
            .entry(user_email.to_lowercase())
            .or_default()
            .insert(assistant_id.to_string());
        Ok(true)
    }

    async fn remove_mapping(&self, user_email: &str, assistant_id: &str) -> Result<bool> {
        let mut mappings = self.mappings.write().await;
        let email = user_email.to_lowercase();
        if let Some(ids) = mappings.get_mut(&email) {
            ids.remove(assistant_id);
            if ids.is_empty() {
                mappings.remove(&email);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_and_lookup_is_case_insensitive() {
        let store = MemoryMappingStore::new();
        store.add_mapping("User@Example.com", "a1").await.unwrap();
        store.add_mapping("user@example.com", "a2").await.unwrap();

        let allowed = store.allowed_assistants("USER@EXAMPLE.COM").await.unwrap();
        assert_eq!(allowed.len(), 2);
        assert!(allowed.contains("a1"));
        assert!(allowed.contains("a2"));
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let store = MemoryMappingStore::new();
        assert!(store.add_mapping("user@example.com", "a1").await.unwrap());
        assert!(store.add_mapping("user@example.com", "a1").await.unwrap());

        let allowed = store.allowed_assistants("user@example.com").await.unwrap();
        assert_eq!(allowed.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_mapping() {
        let store = MemoryMappingStore::new();
        store.add_mapping("user@example.com", "a1").await.unwrap();
        store.remove_mapping("User@example.com", "a1").await.unwrap();

        let allowed = store.allowed_assistants("user@example.com").await.unwrap();
        assert!(allowed.is_empty());
        assert!(store.all_mappings().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_all_mappings_groups_by_user() {
        let store = MemoryMappingStore::new();
        store.add_mapping("a@example.com", "a1").await.unwrap();
        store.add_mapping("a@example.com", "a2").await.unwrap();
        store.add_mapping("b@example.com", "a1").await.unwrap();

        let mappings = store.all_mappings().await.unwrap();
        assert_eq!(mappings.len(), 2);
        assert_eq!(mappings[0].user_email, "a@example.com");
        assert_eq!(mappings[0].assistant_ids, vec!["a1", "a2"]);
        assert_eq!(mappings[1].user_email, "b@example.com");
    }

    #[tokio::test]
    async fn test_unknown_user_has_no_assistants() {
        let store = MemoryMappingStore::new();
        let allowed = store.allowed_assistants("nobody@example.com").await.unwrap();
        assert!(allowed.is_empty());
    }
}
