use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::event::error::EventSystemError;
use crate::event::{Event, EventDraft, EventHandler, SubscriptionId};
use crate::kernel::error::Result;

/// Default capacity of the history ring
pub const DEFAULT_MAX_HISTORY_SIZE: usize = 1000;

//--------------------------------------------------
// Subscriptions (Internal)
//--------------------------------------------------

struct Subscription {
    id: SubscriptionId,
    event_type: Option<String>,
    handler: Arc<dyn EventHandler>,
    priority: i32,
    active: bool,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("event_type", &self.event_type)
            .field("priority", &self.priority)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    fn info(&self) -> SubscriptionInfo {
        SubscriptionInfo {
            id: self.id.clone(),
            event_type: self.event_type.clone(),
            priority: self.priority,
            active: self.active,
        }
    }
}

/// Snapshot of a subscription, without its handler.
/// `event_type` is `None` for wildcard subscriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfo {
    pub id: SubscriptionId,
    pub event_type: Option<String>,
    pub priority: i32,
    pub active: bool,
}

/// Insert keeping descending priority; equal priorities keep registration order.
fn insert_by_priority(list: &mut Vec<Subscription>, subscription: Subscription) {
    let position = list
        .iter()
        .position(|existing| existing.priority < subscription.priority)
        .unwrap_or(list.len());
    list.insert(position, subscription);
}

fn remove_by_id(list: &mut Vec<Subscription>, id: &str) -> bool {
    let len_before = list.len();
    list.retain(|s| s.id != id);
    list.len() < len_before
}

//--------------------------------------------------
// BusState (Internal, wrapped by EventBus)
//--------------------------------------------------

struct BusState {
    handlers: HashMap<String, Vec<Subscription>>,
    wildcard: Vec<Subscription>,
    history: VecDeque<Arc<Event>>,
    max_history_size: usize,
    queue: VecDeque<Arc<Event>>,
    delivering: bool,
}

impl BusState {
    fn new(max_history_size: usize) -> Self {
        Self {
            handlers: HashMap::new(),
            wildcard: Vec::new(),
            history: VecDeque::new(),
            max_history_size,
            queue: VecDeque::new(),
            delivering: false,
        }
    }

    fn record(&mut self, event: Arc<Event>) {
        self.history.push_back(event);
        self.trim_history();
    }

    fn trim_history(&mut self) {
        while self.history.len() > self.max_history_size {
            self.history.pop_front();
        }
    }

    fn remove(&mut self, id: &str) -> bool {
        let mut found = false;
        self.handlers.retain(|_, list| {
            if remove_by_id(list, id) {
                found = true;
            }
            !list.is_empty()
        });
        if remove_by_id(&mut self.wildcard, id) {
            found = true;
        }
        found
    }

    /// Wildcard handlers first, then exact-type handlers; inactive ones skipped.
    fn delivery_list(&self, event_type: &str) -> Vec<(SubscriptionId, Arc<dyn EventHandler>)> {
        let exact = self.handlers.get(event_type).into_iter().flatten();
        self.wildcard
            .iter()
            .chain(exact)
            .filter(|s| s.active)
            .map(|s| (s.id.clone(), Arc::clone(&s.handler)))
            .collect()
    }

    fn iter_all(&self) -> impl Iterator<Item = &Subscription> {
        self.wildcard.iter().chain(self.handlers.values().flatten())
    }

    fn iter_all_mut(&mut self) -> impl Iterator<Item = &mut Subscription> {
        self.wildcard.iter_mut().chain(self.handlers.values_mut().flatten())
    }
}

/// Resets the `delivering` flag if a drain is abandoned mid-way, either by a
/// panicking handler or by the publishing future being dropped.
struct DeliveryGuard<'a> {
    state: &'a Mutex<BusState>,
    armed: bool,
}

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.delivering = false;
        }
    }
}

//--------------------------------------------------
// EventBus (Public API)
//--------------------------------------------------

/// Thread-safe, cloneable event bus handle.
///
/// Clones share the same subscriptions, history and delivery queue.
#[derive(Clone)]
pub struct EventBus {
    state: Arc<Mutex<BusState>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        let handler_count: usize = state.handlers.values().map(|v| v.len()).sum();
        f.debug_struct("EventBus")
            .field("handlers_count", &handler_count)
            .field("wildcard_count", &state.wildcard.len())
            .field("history_size", &state.history.len())
            .field("queue_size", &state.queue.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_max_history_size(DEFAULT_MAX_HISTORY_SIZE)
    }

    pub fn with_max_history_size(max_history_size: usize) -> Self {
        Self { state: Arc::new(Mutex::new(BusState::new(max_history_size))) }
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a handler for an exact event type.
    ///
    /// When `id` is supplied and already subscribed, the previous subscription
    /// is replaced.
    pub fn subscribe(
        &self,
        event_type: &str,
        handler: Arc<dyn EventHandler>,
        priority: i32,
        id: Option<SubscriptionId>,
    ) -> SubscriptionId {
        let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut state = self.lock();
        if state.remove(&id) {
            log::debug!("Replacing existing subscription '{}'", id);
        }
        let subscription = Subscription {
            id: id.clone(),
            event_type: Some(event_type.to_string()),
            handler,
            priority,
            active: true,
        };
        insert_by_priority(state.handlers.entry(event_type.to_string()).or_default(), subscription);
        log::trace!("Subscribed '{}' to '{}' (priority {})", id, event_type, priority);
        id
    }

    /// Register a handler invoked for every published event.
    pub fn subscribe_to_all(&self, handler: Arc<dyn EventHandler>, priority: i32) -> SubscriptionId {
        let id = uuid::Uuid::new_v4().to_string();
        let subscription = Subscription {
            id: id.clone(),
            event_type: None,
            handler,
            priority,
            active: true,
        };
        insert_by_priority(&mut self.lock().wildcard, subscription);
        log::trace!("Subscribed '{}' to all events (priority {})", id, priority);
        id
    }

    /// Remove a subscription from either the exact-type or the wildcard set.
    pub fn unsubscribe(&self, id: &str) -> bool {
        self.lock().remove(id)
    }

    /// Pause or resume a subscription without losing its place.
    pub fn set_subscription_active(&self, id: &str, active: bool) -> bool {
        let mut state = self.lock();
        match state.iter_all_mut().find(|s| s.id == id) {
            Some(subscription) => {
                subscription.active = active;
                true
            }
            None => false,
        }
    }

    /// Stamp, record and deliver an event.
    ///
    /// If another publish is already delivering, the event is only queued and
    /// this call returns immediately; the publisher in flight delivers it
    /// after its own event, in arrival order, before returning.
    pub async fn publish(&self, draft: EventDraft) -> Result<Arc<Event>> {
        if draft.event_type.is_empty() {
            return Err(EventSystemError::InvalidEventType { source_name: draft.source }.into());
        }

        let event = Arc::new(draft.stamp());
        {
            let mut state = self.lock();
            state.record(Arc::clone(&event));
            state.queue.push_back(Arc::clone(&event));
            if state.delivering {
                log::trace!("Queued '{}' behind in-flight delivery", event.event_type);
                return Ok(event);
            }
            state.delivering = true;
        }

        self.drain().await;
        Ok(event)
    }

    async fn drain(&self) {
        let mut guard = DeliveryGuard { state: &self.state, armed: true };
        loop {
            let (next, handlers) = {
                let mut state = self.lock();
                match state.queue.pop_front() {
                    Some(next) => {
                        let handlers = state.delivery_list(&next.event_type);
                        (next, handlers)
                    }
                    None => {
                        // Cleared under the same lock that observed the empty queue
                        state.delivering = false;
                        guard.armed = false;
                        return;
                    }
                }
            };

            for (subscription_id, handler) in handlers {
                if let Err(e) = handler.handle(Arc::clone(&next)).await {
                    log::warn!(
                        "Handler '{}' failed for event '{}' ({}): {}",
                        subscription_id, next.event_type, next.id, e
                    );
                }
            }
        }
    }

    /// Recorded events in publish order; `limit` keeps the most recent ones.
    pub fn history(&self, limit: Option<usize>) -> Vec<Arc<Event>> {
        let state = self.lock();
        let skip = limit.map_or(0, |limit| state.history.len().saturating_sub(limit));
        state.history.iter().skip(skip).cloned().collect()
    }

    pub fn clear_history(&self) {
        self.lock().history.clear();
    }

    /// Change the history bound, keeping the most recent events.
    pub fn set_max_history_size(&self, max_history_size: usize) {
        let mut state = self.lock();
        state.max_history_size = max_history_size;
        state.trim_history();
    }

    pub fn max_history_size(&self) -> usize {
        self.lock().max_history_size
    }

    /// Snapshot of every subscription, wildcard ones first.
    pub fn subscriptions(&self) -> Vec<SubscriptionInfo> {
        self.lock().iter_all().map(Subscription::info).collect()
    }

    /// Number of exact-type subscriptions for an event type.
    pub fn subscription_count(&self, event_type: &str) -> usize {
        self.lock().handlers.get(event_type).map_or(0, Vec::len)
    }

    /// Number of events waiting behind the in-flight delivery.
    pub fn queue_size(&self) -> usize {
        self.lock().queue.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
