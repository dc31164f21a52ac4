//! # Stratum Core Event System
//!
//! Publish/subscribe message routing between every other component. The
//! [`EventBus`] stamps and records published events, then delivers them to
//! wildcard subscribers followed by exact-type subscribers, both in
//! descending priority order.
//!
//! Delivery is serialized: a publish issued while another event is being
//! delivered (including from inside a handler) is queued and drained in
//! arrival order by the publisher already in flight.
pub mod bus;
pub mod error;
pub mod types;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::error::EventSystemError;
use crate::kernel::error::Result;

/// Type for subscription identifiers
pub type SubscriptionId = String;

/// An event as stored in history and handed to subscribers.
///
/// Events are immutable once published; handlers receive them behind an
/// [`Arc`] and decode the payload at their own boundary with [`Event::decode`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
}

impl Event {
    /// Decode the payload into a concrete type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.data.clone()).map_err(|e| {
            EventSystemError::InvalidEventData {
                event_type: self.event_type.clone(),
                details: e.to_string(),
            }
            .into()
        })
    }

    /// Look up a single metadata entry.
    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.as_ref().and_then(|m| m.get(key))
    }
}

/// The caller-supplied part of an event; the bus adds id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub event_type: String,
    pub data: Value,
    pub source: String,
    pub target: Option<String>,
    pub metadata: Option<HashMap<String, Value>>,
}

impl EventDraft {
    pub fn new(event_type: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: Value::Null,
            source: source.into(),
            target: None,
            metadata: None,
        }
    }

    /// Draft for one of the core system events.
    pub fn system(event: types::SystemEvent, source: impl Into<String>) -> Self {
        Self::new(event.name(), source)
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Serialize any payload into the draft. Serialization failures fall back
    /// to `null` data with a warning, since event payloads are informational.
    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> Self {
        self.data = serde_json::to_value(payload).unwrap_or_else(|e| {
            log::warn!("Failed to serialize payload for '{}': {}", self.event_type, e);
            Value::Null
        });
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.get_or_insert_with(HashMap::new).insert(key.into(), value);
        self
    }

    fn stamp(self) -> Event {
        Event {
            id: uuid::Uuid::new_v4().to_string(),
            event_type: self.event_type,
            data: self.data,
            timestamp: Utc::now(),
            source: self.source,
            target: self.target,
            metadata: self.metadata,
        }
    }
}

/// Asynchronous event handler trait
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: Arc<Event>) -> Result<()>;
}

/// Handler adapter for async closures (Internal Helper)
struct FnHandler<F> {
    f: F,
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(Arc<Event>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn handle(&self, event: Arc<Event>) -> Result<()> {
        (self.f)(event).await
    }
}

/// Handler adapter for synchronous closures (Internal Helper)
struct SyncHandler<F> {
    f: F,
}

#[async_trait]
impl<F> EventHandler for SyncHandler<F>
where
    F: Fn(&Event) -> Result<()> + Send + Sync,
{
    async fn handle(&self, event: Arc<Event>) -> Result<()> {
        (self.f)(&event)
    }
}

/// Wrap an async closure as an event handler
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn EventHandler>
where
    F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(FnHandler { f })
}

/// Wrap a synchronous closure as an event handler
pub fn sync_handler<F>(f: F) -> Arc<dyn EventHandler>
where
    F: Fn(&Event) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(SyncHandler { f })
}

/// Re-export important types
pub use bus::{EventBus, SubscriptionInfo, DEFAULT_MAX_HISTORY_SIZE};
pub use types::SystemEvent;

// Test module declaration
#[cfg(test)]
mod tests;
