// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed in-process pub/sub (§4.3). One handler table per event type plus a
//! wildcard list; `emit` calls type-specific listeners before wildcard
//! listeners, both in registration order. A listener that returns `Err`
//! is logged and does not stop the rest of the dispatch.

use mesh_core::ConversationEvent;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::warn;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;
type Handler = Box<dyn Fn(&ConversationEvent) -> Result<(), HandlerError> + Send + Sync>;

const WILDCARD: &str = "*";

/// A token returned by [`EventBus::subscribe`]; pass to
/// [`EventBus::unsubscribe`] to remove that listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Listener {
    id: SubscriptionId,
    handler: Handler,
}

#[derive(Default)]
struct Inner {
    by_type: HashMap<String, Vec<Listener>>,
    next_id: u64,
}

/// Single-threaded-cooperative-dispatch pub/sub, made safe for concurrent
/// registration/emission by a `parking_lot::Mutex` (events may be emitted
/// from any `tokio` task).
#[derive(Default)]
pub struct EventBus {
    inner: Mutex<Inner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event_type`, or for every event type when
    /// `event_type` is `"*"`.
    pub fn subscribe(
        &self,
        event_type: impl Into<String>,
        handler: impl Fn(&ConversationEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    ) -> SubscriptionId {
        let mut inner = self.inner.lock();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner
            .by_type
            .entry(event_type.into())
            .or_default()
            .push(Listener { id, handler: Box::new(handler) });
        id
    }

    /// Remove a previously registered listener. No-op if already removed.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut inner = self.inner.lock();
        for listeners in inner.by_type.values_mut() {
            listeners.retain(|l| l.id != id);
        }
    }

    /// Dispatch `event` to its type-specific listeners, then to wildcard
    /// listeners, in registration order within each group.
    pub fn emit(&self, event: &ConversationEvent) {
        self.dispatch_group(&event.event_type, event);
        if event.event_type != WILDCARD {
            self.dispatch_group(WILDCARD, event);
        }
    }

    fn dispatch_group(&self, key: &str, event: &ConversationEvent) {
        // Clone handler Arcs out from under the lock so a listener calling
        // back into subscribe/unsubscribe cannot deadlock; handlers are
        // `Fn`, so invoking a cloned reference is sound.
        let listeners_len = {
            let inner = self.inner.lock();
            inner.by_type.get(key).map(Vec::len).unwrap_or(0)
        };

        for i in 0..listeners_len {
            let result = {
                let inner = self.inner.lock();
                match inner.by_type.get(key).and_then(|v| v.get(i)) {
                    Some(listener) => (listener.handler)(event),
                    None => continue, // unsubscribed mid-dispatch
                }
            };
            if let Err(e) = result {
                warn!(event_type = %event.event_type, error = %e, "event listener failed");
            }
        }
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
