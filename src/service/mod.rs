use crate::api::CallsApi;
use crate::assistant::{AssistantCache, AssistantFetcher};
use crate::callrecord::{self, CallRecord, RawCall};
use crate::config::FetchStrategy;
use crate::event::{EventSender, ServiceEvent};
use crate::mappings::MappingStore;
use anyhow::Result;
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};


// Upper bound on concurrent assistant-metadata lookups during pre-warm.
const PREWARM_CONCURRENCY: usize = 4;

/// Fetches raw calls from upstream, resolves assistant metadata and
/// produces the normalized, newest-first call list the presentation
/// layer consumes. The only two entry points that layer may depend on
/// are [`CallService::fetch_calls`] (plus its per-user wrapper) and
/// [`CallService::fetch_call_by_id`].
pub struct CallService {
    api: Arc<dyn CallsApi>,
    fetcher: Arc<dyn AssistantFetcher>,
    cache: Arc<AssistantCache>,
    mappings: Arc<dyn MappingStore>,
    strategy: FetchStrategy,
    events: EventSender,
}

impl CallService {
    pub fn new<C>(
        client: Arc<C>,
        cache: Arc<AssistantCache>,
        mappings: Arc<dyn MappingStore>,
        strategy: FetchStrategy,
        events: EventSender,
    ) -> Self
    where
        C: CallsApi + AssistantFetcher + 'static,
    {
        Self {
            api: client.clone(),
            fetcher: client,
            cache,
            mappings,
            strategy,
            events,
        }
    }

    /// Calls visible under `restriction` (`None` = administrator, no
    /// restriction), normalized and sorted newest first. Transport
    /// failures resolve to an empty list after publishing a
    /// [`ServiceEvent::FetchFailed`], so callers that care about the
    /// difference must watch the event bus.
    pub async fn fetch_calls(&self, restriction: Option<&HashSet<String>>) -> Vec<CallRecord> {
        if let Some(allowed) = restriction {
            // A user mapped to no assistants sees no calls; do not fall
            // through to an unrestricted fetch.
            if allowed.is_empty() {
                return Vec::new();
            }
        }

        let mut raw = match self.fetch_raw(restriction).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("failed to fetch calls: {}", e);
                self.publish_fetch_failed("list_calls", &e);
                return Vec::new();
            }
        };

        // Entries without an id carry nothing we can display.
        raw.retain(|call| {
            call.id
                .as_deref()
                .map(|id| !id.trim().is_empty())
                .unwrap_or(false)
        });

        if let Some(allowed) = restriction {
            // Safety net: the upstream id filter has been unreliable,
            // re-check every record against the permitted set.
            raw.retain(|call| {
                call.assistant_id
                    .as_deref()
                    .map(|id| allowed.contains(id))
                    .unwrap_or(false)
            });
        }

        // Per-assistant fetches can return overlapping results.
        let mut seen = HashSet::new();
        raw.retain(|call| match call.id.as_deref() {
            Some(id) => seen.insert(id.to_string()),
            None => false,
        });

        self.prewarm_assistants(&raw).await;

        let mut records: Vec<CallRecord> = raw
            .iter()
            .filter_map(|call| callrecord::normalize(call, &self.cache))
            .collect();
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        debug!("fetched {} calls", records.len());
        records
    }

    /// Calls visible to one user, resolved through the permission store
    /// by (case-insensitive) email.
    pub async fn fetch_calls_for_user(&self, user_email: &str) -> Vec<CallRecord> {
        let allowed = match self.mappings.allowed_assistants(user_email).await {
            Ok(allowed) => allowed,
            Err(e) => {
                warn!(user_email, "failed to resolve permitted assistants: {}", e);
                let _ = self.events.send(ServiceEvent::MappingStoreFailed {
                    detail: e.to_string(),
                });
                return Vec::new();
            }
        };
        self.fetch_calls(Some(&allowed)).await
    }

    /// Single call lookup. `None` covers both "not found" and a failed
    /// fetch; only the latter publishes an event.
    pub async fn fetch_call_by_id(&self, call_id: &str) -> Option<CallRecord> {
        let raw = match self.api.get_call(call_id).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(call_id, "call not found upstream");
                return None;
            }
            Err(e) => {
                warn!(call_id, "failed to fetch call: {}", e);
                self.publish_fetch_failed("get_call", &e);
                return None;
            }
        };
        if let Some(assistant_id) = raw.assistant_id.as_deref() {
            let _ = self
                .cache
                .get_or_fetch(assistant_id, self.fetcher.as_ref())
                .await;
        }
        callrecord::normalize(&raw, &self.cache)
    }

    async fn fetch_raw(&self, restriction: Option<&HashSet<String>>) -> Result<Vec<RawCall>> {
        let Some(allowed) = restriction else {
            return self.api.list_calls(&[]).await;
        };

        let mut ids: Vec<String> = allowed.iter().cloned().collect();
        ids.sort();
        match self.strategy {
            FetchStrategy::Bulk => self.api.list_calls(&ids).await,
            FetchStrategy::PerAssistant => {
                // Sequential on purpose: keeps the pressure on the
                // upstream rate limit at one request at a time.
                let mut all = Vec::new();
                for id in &ids {
                    all.extend(self.api.list_calls(std::slice::from_ref(id)).await?);
                }
                Ok(all)
            }
        }
    }

    /// Resolve metadata for every assistant present in the raw result
    /// set up front, so normalization never waits on the network.
    async fn prewarm_assistants(&self, raw: &[RawCall]) {
        let ids: HashSet<&str> = raw
            .iter()
            .filter_map(|call| call.assistant_id.as_deref())
            .collect();
        futures::stream::iter(ids)
            .for_each_concurrent(PREWARM_CONCURRENCY, |id| async move {
                let _ = self.cache.get_or_fetch(id, self.fetcher.as_ref()).await;
            })
            .await;
    }

    fn publish_fetch_failed(&self, operation: &str, error: &anyhow::Error) {
        let _ = self.events.send(ServiceEvent::FetchFailed {
            operation: operation.to_string(),
            detail: error.to_string(),
        });
    }
}
