//! Handler registry and pending-request table used by inbound dispatch.

use crate::protocol::{error_event, success_event};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Callback invoked with an inbound envelope's `data`.
pub type Handler = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;

/// Event name -> handlers, in registration order. No removal.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Vec<Handler>>,
}

impl HandlerRegistry {
    pub fn add(&mut self, event: String, handler: Handler) {
        self.handlers.entry(event).or_default().push(handler);
    }

    /// Snapshot of the handlers for `event`, so they can run without the registry borrowed.
    pub fn get(&self, event: &str) -> Vec<Handler> {
        self.handlers.get(event).cloned().unwrap_or_default()
    }

    #[cfg(test)]
    fn len(&self, event: &str) -> usize {
        self.handlers.get(event).map_or(0, Vec::len)
    }
}

/// What the dispatcher does to local state when a request is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnReject {
    Nothing,
    /// Restore extension data to the value it had before an optimistic write.
    RestoreExtensionData(Option<String>),
}

/// Host answer routed to the waiting future: `Ok(data)` or `Err(error payload)`.
pub type Settlement = Result<serde_json::Value, serde_json::Value>;

pub struct PendingRequest {
    pub tx: oneshot::Sender<Settlement>,
    pub on_reject: OnReject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct PendingKey {
    request_type: String,
    counter: u64,
}

/// Requests awaiting `<type>.success<N>` / `<type>.error<N>`. Entries live until one of the two arrives.
#[derive(Default)]
pub struct PendingRequests {
    requests: HashMap<PendingKey, PendingRequest>,
    by_event: HashMap<String, (PendingKey, Outcome)>,
}

impl PendingRequests {
    /// Register request `counter` of `request_type`; returns the receiving side of its answer.
    pub fn register(
        &mut self,
        request_type: &str,
        counter: u64,
        on_reject: OnReject,
    ) -> oneshot::Receiver<Settlement> {
        let (tx, rx) = oneshot::channel();
        let key = PendingKey {
            request_type: request_type.to_string(),
            counter,
        };
        self.by_event.insert(
            success_event(request_type, counter),
            (key.clone(), Outcome::Success),
        );
        self.by_event.insert(
            error_event(request_type, counter),
            (key.clone(), Outcome::Error),
        );
        self.requests.insert(key, PendingRequest { tx, on_reject });
        rx
    }

    /// Remove and return the request answered by `event`, if any. Both of its event names are dropped.
    pub fn take(&mut self, event: &str) -> Option<(Outcome, PendingRequest)> {
        let (key, outcome) = self.by_event.remove(event)?;
        self.forget_names(&key);
        self.requests.remove(&key).map(|req| (outcome, req))
    }

    /// Drop a request whose send failed.
    pub fn discard(&mut self, request_type: &str, counter: u64) -> Option<PendingRequest> {
        let key = PendingKey {
            request_type: request_type.to_string(),
            counter,
        };
        self.forget_names(&key);
        self.requests.remove(&key)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.requests.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    fn forget_names(&mut self, key: &PendingKey) {
        self.by_event
            .remove(&success_event(&key.request_type, key.counter));
        self.by_event
            .remove(&error_event(&key.request_type, key.counter));
    }
}
