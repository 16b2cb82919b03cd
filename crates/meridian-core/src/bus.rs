//! In-process topic-based event bus.
//!
//! Subscribers register handlers per topic string. Publication is
//! fire-and-forget from the publisher's point of view: handlers for one
//! publication run sequentially in subscription order on the publisher's
//! task, and handler errors are collected rather than propagated.
//!
//! The bus is process-wide but never global: construct one at start and pass
//! it to every component that needs it. Subscriptions do not survive a
//! restart.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Topics used by the federation core.
pub mod topics {
    /// A catalog was upserted; body is the `CatalogSpec`.
    pub const CATALOG: &str = "catalog";
    /// A foreign sync job arrived; metadata must carry `site`.
    pub const REMOTE: &str = "remote";
    /// An activation status needs upstream propagation.
    pub const REPORT: &str = "report";
    /// A reconciliation job is requested; body is `JobData`.
    pub const JOB: &str = "job";
    /// A reconciliation completed; body is `ActivationStatus`.
    pub const JOB_REPORT: &str = "job-report";
}

/// Error type handlers may return; recorded by the bus, never propagated to
/// the publisher.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// An event published on the bus: string metadata plus an opaque JSON body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Event {
    /// String metadata, e.g. the addressed `site`.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Opaque body.
    #[serde(default)]
    pub body: Value,
}

impl Event {
    /// Create an event from a raw JSON body.
    #[must_use]
    pub fn new(body: Value) -> Self {
        Self {
            metadata: BTreeMap::new(),
            body,
        }
    }

    /// Create an event by serialising a typed body.
    pub fn from_body<T: Serialize>(body: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::to_value(body)?))
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Read a metadata entry.
    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Decode the body into a typed value.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.body.clone())
    }
}

/// A subscriber callback.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one published event.
    async fn handle(&self, topic: &str, event: Event) -> Result<(), HandlerError>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(String, Event) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn handle(&self, topic: &str, event: Event) -> Result<(), HandlerError> {
        (self.0)(topic.to_owned(), event).await
    }
}

/// Result of one publication.
#[derive(Default)]
pub struct PublishOutcome {
    /// Number of handlers invoked.
    pub delivered: usize,
    /// Errors collected from handlers, in invocation order.
    pub errors: Vec<HandlerError>,
}

impl PublishOutcome {
    /// True when every handler succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

impl std::fmt::Debug for PublishOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishOutcome")
            .field("delivered", &self.delivered)
            .field("errors", &self.errors.len())
            .finish()
    }
}

/// Topic-keyed subscription table.
///
/// The table sits behind a reader-writer lock: publications take the read
/// side, subscriptions the write side.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<HashMap<String, Vec<Arc<dyn EventHandler>>>>,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a topic. Handlers run in registration order.
    pub async fn subscribe(&self, topic: impl Into<String>, handler: Arc<dyn EventHandler>) {
        let topic = topic.into();
        let mut subscribers = self.subscribers.write().await;
        subscribers.entry(topic).or_default().push(handler);
    }

    /// Register a closure as a handler.
    pub async fn subscribe_fn<F, Fut>(&self, topic: impl Into<String>, f: F)
    where
        F: Fn(String, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.subscribe(topic, Arc::new(FnHandler(f))).await;
    }

    /// Publish an event to every handler subscribed to `topic`.
    ///
    /// Handlers run sequentially in subscription order; a failing handler
    /// does not stop delivery to its siblings. Publishing to a topic with no
    /// subscribers is a no-op.
    pub async fn publish(&self, topic: &str, event: Event) -> PublishOutcome {
        let handlers: Vec<Arc<dyn EventHandler>> = {
            let subscribers = self.subscribers.read().await;
            subscribers.get(topic).cloned().unwrap_or_default()
        };

        let mut outcome = PublishOutcome::default();
        for handler in handlers {
            outcome.delivered += 1;
            if let Err(e) = handler.handle(topic, event.clone()).await {
                warn!(topic, error = %e, "event handler failed");
                outcome.errors.push(e);
            }
        }
        debug!(
            topic,
            delivered = outcome.delivered,
            errors = outcome.errors.len(),
            "event published"
        );
        outcome
    }

    /// Number of handlers subscribed to a topic.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.subscribers
            .read()
            .await
            .get(topic)
            .map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").finish_non_exhaustive()
    }
}
