use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

// How long a "not found" answer is remembered before the lookup may
// retry; assistants can be created after the first miss.
const DEFAULT_NEGATIVE_TTL: Duration = Duration::from_secs(60);

/// Assistant metadata as served by the upstream `/assistant/{id}` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantInfo {
    pub id: String,
    pub name: Option<String>,
    pub phone_number: Option<String>,
}

/// Source of assistant metadata, implemented by the upstream API client
/// and by canned fetchers in tests.
#[async_trait]
pub trait AssistantFetcher: Send + Sync {
    async fn fetch_assistant(&self, assistant_id: &str) -> Result<Option<AssistantInfo>>;
}

enum CacheEntry {
    Found(Arc<AssistantInfo>),
    Missing(Instant),
}

enum Lookup {
    Hit(Option<Arc<AssistantInfo>>),
    Refresh,
}

/// Process-wide memo of assistant metadata, keyed by assistant id.
/// Entries are filled on first reference and kept for the life of the
/// process; expected cardinality is tens to low hundreds, so there is
/// no eviction. Constructed explicitly and injected, never a hidden
/// module-level global, so tests can hold isolated instances.
pub struct AssistantCache {
    negative_ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Default for AssistantCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AssistantCache {
    pub fn new() -> Self {
        Self {
            negative_ttl: DEFAULT_NEGATIVE_TTL,
            entries: RwLock::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_negative_ttl(mut self, ttl: Duration) -> Self {
        self.negative_ttl = ttl;
        self
    }

    /// Synchronous read of an already-resolved entry. This is what the
    /// normalizer consults, so normalization itself never touches the
    /// network.
    pub fn peek(&self, assistant_id: &str) -> Option<Arc<AssistantInfo>> {
        let entries = self.entries.read().ok()?;
        match entries.get(assistant_id) {
            Some(CacheEntry::Found(info)) => Some(info.clone()),
            _ => None,
        }
    }

    /// Seed the cache directly (pre-warm paths and tests).
    pub fn insert(&self, assistant_id: impl Into<String>, info: AssistantInfo) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(assistant_id.into(), CacheEntry::Found(Arc::new(info)));
        }
    }

    /// Cached metadata for `assistant_id`, fetching it on a miss.
    /// Concurrent callers for the same id share one upstream request; a
    /// 404 is remembered for the negative TTL, a transport error is not
    /// cached at all so the next lookup retries.
    pub async fn get_or_fetch(
        &self,
        assistant_id: &str,
        fetcher: &dyn AssistantFetcher,
    ) -> Option<Arc<AssistantInfo>> {
        if let Lookup::Hit(hit) = self.lookup(assistant_id) {
            return hit;
        }

        let guard = {
            let mut inflight = self.inflight.lock().await;
            inflight
                .entry(assistant_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _locked = guard.lock().await;

        // Another task may have finished the fetch while we waited.
        if let Lookup::Hit(hit) = self.lookup(assistant_id) {
            return hit;
        }

        match fetcher.fetch_assistant(assistant_id).await {
            Ok(Some(info)) => {
                let info = Arc::new(info);
                self.store(assistant_id, CacheEntry::Found(info.clone()));
                Some(info)
            }
            Ok(None) => {
                debug!(assistant_id, "assistant not found upstream");
                self.store(assistant_id, CacheEntry::Missing(Instant::now()));
                None
            }
            Err(e) => {
                warn!(assistant_id, "assistant lookup failed: {}", e);
                None
            }
        }
    }

    fn lookup(&self, assistant_id: &str) -> Lookup {
        let entries = match self.entries.read() {
            Ok(entries) => entries,
            Err(_) => return Lookup::Refresh,
        };
        match entries.get(assistant_id) {
            Some(CacheEntry::Found(info)) => Lookup::Hit(Some(info.clone())),
            Some(CacheEntry::Missing(at)) if at.elapsed() < self.negative_ttl => Lookup::Hit(None),
            _ => Lookup::Refresh,
        }
    }

    fn store(&self, assistant_id: &str, entry: CacheEntry) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(assistant_id.to_string(), entry);
        }
    }
}
