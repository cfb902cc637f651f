use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use rustc_hash::FxHashMap;

use super::event::ChatEvent;

/// Callback invoked for every event delivered to a subscription.
pub type ChatListener = Arc<dyn Fn(&ChatEvent) + Send + Sync>;

/// Delivery scope of a subscription.
///
/// Listeners registered under [`ChatScope::Chat`] receive events only for
/// that chat id. Listeners registered under [`ChatScope::All`] receive every
/// event as a separate notification: a listener registered under both scopes
/// is notified twice per matching event, by design. Callers that want
/// exactly-once delivery should register under a single scope.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChatScope {
    Chat(String),
    All,
}

impl ChatScope {
    /// Parse the conventional `"*"` wildcard, any other string is a chat id.
    #[must_use]
    pub fn parse(scope: &str) -> Self {
        if scope == "*" {
            Self::All
        } else {
            Self::Chat(scope.to_string())
        }
    }
}

struct Registered {
    id: u64,
    listener: ChatListener,
}

#[derive(Default)]
struct BusInner {
    listeners: Mutex<FxHashMap<ChatScope, Vec<Registered>>>,
    next_id: AtomicU64,
    delivered: AtomicU64,
    listener_panics: AtomicU64,
}

/// Counters describing bus activity since construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BusMetrics {
    /// Individual listener notifications that completed without panicking.
    pub delivered: u64,
    /// Listener invocations that panicked and were isolated.
    pub listener_panics: u64,
}

/// Synchronous publish/subscribe dispatcher for chat lifecycle events.
///
/// Delivery is synchronous and same-thread: `emit` invokes every matching
/// listener before returning, in registration order within a scope,
/// chat-scoped listeners before wildcard listeners. There is no queueing or
/// backpressure. A panicking listener is isolated (caught, counted, logged)
/// and never prevents delivery to the remaining listeners.
///
/// The bus is an ordinary value; construct one per process at startup and
/// inject it wherever events are observed or produced. Tests construct their
/// own isolated instances. `Clone` shares the same listener table.
///
/// # Examples
///
/// ```
/// use agentloom::event_bus::{ChatEvent, ChatEventKind, EventBus};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let bus = EventBus::new();
/// let seen = Arc::new(AtomicUsize::new(0));
/// let counter = seen.clone();
/// let _sub = bus.subscribe_all(move |_event| {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// bus.emit(&ChatEvent::user(ChatEventKind::AfterUserMessage, "c1"));
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener under an explicit scope.
    ///
    /// The returned [`Subscription`] removes the listener when dropped or
    /// when [`Subscription::unsubscribe`] is called.
    #[must_use]
    pub fn subscribe<F>(&self, scope: ChatScope, listener: F) -> Subscription
    where
        F: Fn(&ChatEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let mut table = self.inner.listeners.lock().expect("bus listeners poisoned");
        table.entry(scope.clone()).or_default().push(Registered {
            id,
            listener: Arc::new(listener),
        });
        Subscription {
            inner: Arc::downgrade(&self.inner),
            scope,
            id,
        }
    }

    /// Register a listener for a single chat id.
    #[must_use]
    pub fn subscribe_chat<F>(&self, chat_id: impl Into<String>, listener: F) -> Subscription
    where
        F: Fn(&ChatEvent) + Send + Sync + 'static,
    {
        self.subscribe(ChatScope::Chat(chat_id.into()), listener)
    }

    /// Register a wildcard listener receiving every event.
    #[must_use]
    pub fn subscribe_all<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ChatEvent) + Send + Sync + 'static,
    {
        self.subscribe(ChatScope::All, listener)
    }

    /// Deliver an event to all matching listeners, synchronously.
    ///
    /// Listeners are cloned out of the table before invocation, so a
    /// listener may subscribe, unsubscribe, or emit without deadlocking.
    pub fn emit(&self, event: &ChatEvent) {
        let batch: Vec<ChatListener> = {
            let table = self.inner.listeners.lock().expect("bus listeners poisoned");
            let chat_scope = ChatScope::Chat(event.chat_id.clone());
            // Chat-scoped delivery first, wildcard delivery second; both in
            // registration order. Dual registration yields two notifications.
            table
                .get(&chat_scope)
                .into_iter()
                .chain(table.get(&ChatScope::All))
                .flat_map(|listeners| listeners.iter().map(|r| Arc::clone(&r.listener)))
                .collect()
        };

        for listener in batch {
            // A panicked notification counts only as a panic, not a delivery.
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                self.inner.listener_panics.fetch_add(1, Ordering::Relaxed);
                tracing::error!(event = %event, "chat event listener panicked; continuing delivery");
            } else {
                self.inner.delivered.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Snapshot of delivery counters.
    #[must_use]
    pub fn metrics(&self) -> BusMetrics {
        BusMetrics {
            delivered: self.inner.delivered.load(Ordering::Relaxed),
            listener_panics: self.inner.listener_panics.load(Ordering::Relaxed),
        }
    }

    /// Number of live listeners across all scopes.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .expect("bus listeners poisoned")
            .values()
            .map(Vec::len)
            .sum()
    }

    /// Remove every listener. Intended for process shutdown.
    pub fn clear(&self) {
        self.inner
            .listeners
            .lock()
            .expect("bus listeners poisoned")
            .clear();
    }

    fn remove(inner: &BusInner, scope: &ChatScope, id: u64) {
        let mut table = inner.listeners.lock().expect("bus listeners poisoned");
        if let Some(listeners) = table.get_mut(scope) {
            listeners.retain(|r| r.id != id);
            if listeners.is_empty() {
                table.remove(scope);
            }
        }
    }
}

/// Handle to a registered listener. Dropping it unsubscribes.
#[must_use = "dropping a Subscription immediately unsubscribes the listener"]
pub struct Subscription {
    inner: Weak<BusInner>,
    scope: ChatScope,
    id: u64,
}

impl Subscription {
    /// Remove the listener now instead of at drop time.
    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            EventBus::remove(&inner, &self.scope, self.id);
        }
    }
}
