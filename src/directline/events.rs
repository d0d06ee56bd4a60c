//! Typed bot events and the per-client dispatcher that fans them out.
//!
//! Handlers are invoked synchronously, in registration order, on the task
//! that emitted the event. Async consumers can use
//! [`EventDispatcher::subscribe_channel`] to receive events over an
//! unbounded mpsc channel instead.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::Activity;

/// An outcome surfaced to subscribers after a Direct Line call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotEvent {
    /// A conversation was opened.
    ConversationStarted {
        /// Server-issued conversation identifier.
        conversation_id: String,
    },
    /// A user activity was accepted by the service.
    MessageSent {
        /// Identifier the service assigned to the posted activity.
        sent_message_id: String,
    },
    /// Activities were fetched from the conversation.
    MessageReceived {
        /// Cursor to pass on the next fetch.
        watermark: Option<String>,
        /// Activities in server order.
        activities: Vec<Activity>,
    },
    /// The service answered with an error envelope.
    Error {
        /// Error code reported by the service.
        code: String,
        /// Human-readable detail, when provided.
        message: Option<String>,
    },
    /// The HTTP exchange itself failed.
    TransportError {
        /// HTTP status, when the server answered at all.
        status: Option<u16>,
        /// Sanitized failure description.
        message: String,
    },
    /// The service answered with a body this client cannot interpret.
    MalformedResponse {
        /// What failed to parse.
        detail: String,
    },
}

impl BotEvent {
    /// Short variant name for structured logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConversationStarted { .. } => "conversation_started",
            Self::MessageSent { .. } => "message_sent",
            Self::MessageReceived { .. } => "message_received",
            Self::Error { .. } => "error",
            Self::TransportError { .. } => "transport_error",
            Self::MalformedResponse { .. } => "malformed_response",
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Handle returned by a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&BotEvent) + Send + Sync>;

#[derive(Clone)]
enum Sink {
    Handler(Handler),
    Channel(mpsc::UnboundedSender<BotEvent>),
}

/// Fan-out of [`BotEvent`]s to registered subscribers.
///
/// Events emitted while nobody is subscribed are dropped.
pub struct EventDispatcher {
    subscribers: Mutex<Vec<(SubscriptionId, Sink)>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventDispatcher {
    /// Create a dispatcher with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a handler invoked for every subsequent event.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&BotEvent) + Send + Sync + 'static,
    {
        self.register(Sink::Handler(Arc::new(handler)))
    }

    /// Register a channel subscriber and return its receiving end.
    ///
    /// The subscription is pruned automatically once the receiver is dropped.
    pub fn subscribe_channel(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<BotEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (self.register(Sink::Channel(tx)), rx)
    }

    /// Remove a subscription. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        match self.subscribers.lock() {
            Ok(mut subscribers) => {
                let before = subscribers.len();
                subscribers.retain(|(sid, _)| *sid != id);
                subscribers.len() != before
            }
            Err(e) => {
                warn!(error = %e, "subscriber list lock poisoned");
                false
            }
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        match self.subscribers.lock() {
            Ok(subscribers) => subscribers.len(),
            Err(_) => 0,
        }
    }

    /// Deliver `event` to every subscriber in registration order.
    pub fn emit(&self, event: &BotEvent) {
        // Snapshot so handlers may (un)subscribe without deadlocking.
        let snapshot: Vec<(SubscriptionId, Sink)> = match self.subscribers.lock() {
            Ok(subscribers) => subscribers.clone(),
            Err(e) => {
                warn!(error = %e, "subscriber list lock poisoned, dropping event");
                return;
            }
        };

        if snapshot.is_empty() {
            debug!(kind = event.kind(), "no subscribers, dropping event");
            return;
        }

        let mut closed = Vec::new();
        for (id, sink) in snapshot {
            match sink {
                Sink::Handler(handler) => handler(event),
                Sink::Channel(tx) => {
                    if tx.send(event.clone()).is_err() {
                        closed.push(id);
                    }
                }
            }
        }

        for id in closed {
            debug!(?id, "pruning closed channel subscriber");
            self.unsubscribe(id);
        }
    }

    fn register(&self, sink: Sink) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push((id, sink));
        }
        id
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
