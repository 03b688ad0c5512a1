//! Event types and the in-process event bus
//!
//! Services never perform side effects that reach outside their transaction.
//! They return events; the request handler dispatches them on the bus after
//! commit, and the task runner delivers them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;

/// Side-effect requests produced by the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VocabEvent {
    /// An IRI was registered; administrators should be told
    IriCreated {
        address: String,
        timestamp: DateTime<Utc>,
    },

    /// A review decision was made; the owner should be told
    ReviewDecided {
        address: String,
        recipient_email: Option<String>,
        accepted: bool,
        timestamp: DateTime<Utc>,
    },

    /// An accepted vocabulary needs a server redirect rule
    RedirectRequested {
        title: String,
        vocabulary_path: String,
        jsonld_target: String,
        html_target: String,
        timestamp: DateTime<Utc>,
    },
}

impl VocabEvent {
    pub fn iri_created(address: impl Into<String>) -> Self {
        VocabEvent::IriCreated {
            address: address.into(),
            timestamp: Utc::now(),
        }
    }

    /// Short name for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            VocabEvent::IriCreated { .. } => "IriCreated",
            VocabEvent::ReviewDecided { .. } => "ReviewDecided",
            VocabEvent::RedirectRequested { .. } => "RedirectRequested",
        }
    }
}

/// Broadcast bus carrying `VocabEvent`s to the task runner
///
/// Cloning shares the underlying channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<VocabEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered before slow receivers lag.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<VocabEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: VocabEvent) -> Result<usize, broadcast::error::SendError<VocabEvent>> {
        self.tx.send(event)
    }

    /// Fire-and-forget dispatch: an undeliverable event is logged, never returned
    pub fn dispatch(&self, event: VocabEvent) {
        if let Err(broadcast::error::SendError(event)) = self.tx.send(event) {
            warn!(
                event_type = event.event_type(),
                "No task runner subscribed, event dropped: {:?}", event
            );
        }
    }

    /// Dispatch every event in order
    pub fn dispatch_all(&self, events: impl IntoIterator<Item = VocabEvent>) {
        for event in events {
            self.dispatch(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
