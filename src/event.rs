use serde::Serialize;

/// Operational events the presentation layer can subscribe to; the
/// backend analog of a user-visible notification. Publishing is
/// fire-and-forget, nobody listening is fine.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServiceEvent {
    /// A call-list or call-detail fetch failed at the transport level.
    /// The operation still resolved to an empty result, so an empty
    /// call list is ambiguous without watching for this.
    FetchFailed { operation: String, detail: String },

    /// The permission store could not be queried.
    MappingStoreFailed { detail: String },
}

/// Type alias for the event sender
pub type EventSender = tokio::sync::broadcast::Sender<ServiceEvent>;

/// Type alias for the event receiver
pub type EventReceiver = tokio::sync::broadcast::Receiver<ServiceEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    tokio::sync::broadcast::channel(64)
}
