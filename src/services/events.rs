use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub workspace_id: Uuid,
    pub file_path: String,
    pub name: &'static str,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

struct Subscription {
    id: u64,
    listener: Listener,
}

/// Synchronous in-process pub/sub. Two listener sets — per-workspace and
/// global — are each snapshotted under their lock before dispatch, so a
/// listener that subscribes or unsubscribes during `emit` never observes or
/// corrupts the set that's currently being iterated.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

#[derive(Default)]
struct EventBusInner {
    next_id: AtomicU64,
    global: RwLock<Vec<Subscription>>,
    scoped: RwLock<std::collections::HashMap<Uuid, Vec<Subscription>>>,
}

pub struct Unsubscribe {
    bus: Arc<EventBusInner>,
    id: u64,
    workspace_id: Option<Uuid>,
}

impl Unsubscribe {
    pub fn call(self) {
        match self.workspace_id {
            None => {
                self.bus.global.write().retain(|s| s.id != self.id);
            }
            Some(ws) => {
                if let Some(subs) = self.bus.scoped.write().get_mut(&ws) {
                    subs.retain(|s| s.id != self.id);
                }
            }
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe_all(&self, listener: impl Fn(&Event) + Send + Sync + 'static) -> Unsubscribe {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.global.write().push(Subscription {
            id,
            listener: Arc::new(listener),
        });
        Unsubscribe {
            bus: self.inner.clone(),
            id,
            workspace_id: None,
        }
    }

    pub fn subscribe(
        &self,
        workspace_id: Uuid,
        listener: impl Fn(&Event) + Send + Sync + 'static,
    ) -> Unsubscribe {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .scoped
            .write()
            .entry(workspace_id)
            .or_default()
            .push(Subscription {
                id,
                listener: Arc::new(listener),
            });
        Unsubscribe {
            bus: self.inner.clone(),
            id,
            workspace_id: Some(workspace_id),
        }
    }

    /// Delivers `event` synchronously to every relevant listener. A
    /// listener that panics is caught and logged rather than allowed to
    /// take down the request that triggered the emission.
    pub fn emit(&self, event: Event) {
        let global_snapshot: Vec<Listener> = self
            .inner
            .global
            .read()
            .iter()
            .map(|s| s.listener.clone())
            .collect();

        let scoped_snapshot: Vec<Listener> = self
            .inner
            .scoped
            .read()
            .get(&event.workspace_id)
            .map(|subs| subs.iter().map(|s| s.listener.clone()).collect())
            .unwrap_or_default();

        for listener in global_snapshot.iter().chain(scoped_snapshot.iter()) {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener(&event);
            }));
            if let Err(err) = result {
                tracing::error!(?err, event = event.name, "event listener panicked");
            }
        }
    }
}

pub fn task_created(workspace_id: Uuid, file_path: &str, data: serde_json::Value, now: DateTime<Utc>) -> Event {
    Event { workspace_id, file_path: file_path.to_string(), name: "task.created", data, timestamp: now }
}

pub fn claim_created(workspace_id: Uuid, file_path: &str, data: serde_json::Value, now: DateTime<Utc>) -> Event {
    Event { workspace_id, file_path: file_path.to_string(), name: "claim.created", data, timestamp: now }
}

pub fn claim_renewed(workspace_id: Uuid, file_path: &str, data: serde_json::Value, now: DateTime<Utc>) -> Event {
    Event { workspace_id, file_path: file_path.to_string(), name: "claim.renewed", data, timestamp: now }
}

pub fn claim_released(workspace_id: Uuid, file_path: &str, data: serde_json::Value, now: DateTime<Utc>) -> Event {
    Event { workspace_id, file_path: file_path.to_string(), name: "claim.released", data, timestamp: now }
}

pub fn task_completed(workspace_id: Uuid, file_path: &str, data: serde_json::Value, now: DateTime<Utc>) -> Event {
    Event { workspace_id, file_path: file_path.to_string(), name: "task.completed", data, timestamp: now }
}

pub fn task_blocked(workspace_id: Uuid, file_path: &str, data: serde_json::Value, now: DateTime<Utc>) -> Event {
    Event { workspace_id, file_path: file_path.to_string(), name: "task.blocked", data, timestamp: now }
}

pub fn generic_append(workspace_id: Uuid, file_path: &str, data: serde_json::Value, now: DateTime<Utc>) -> Event {
    Event { workspace_id, file_path: file_path.to_string(), name: "append", data, timestamp: now }
}

pub fn claim_expired(workspace_id: Uuid, file_path: &str, data: serde_json::Value, now: DateTime<Utc>) -> Event {
    Event { workspace_id, file_path: file_path.to_string(), name: "claim.expired", data, timestamp: now }
}
