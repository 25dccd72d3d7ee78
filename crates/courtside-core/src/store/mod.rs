//! Session store adapters.
//!
//! The store holds one JSON document per singleton session id and pushes
//! every committed update to subscribers in commit order. Writes are
//! RFC 7396 merge-patches, so control operations only send what changed.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::collections::HashMap;

use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::error::StoreError;
use crate::session::{
    CircuitSession, MergePatch, StretchSession, CIRCUIT_SESSION_ID, STRETCH_SESSION_ID,
};

/// One committed write, as seen by subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionUpdate {
    pub id: String,
    /// Strictly increasing per id.
    pub revision: u64,
    pub document: Value,
}

pub trait SessionStore: Send + Sync {
    /// Point read. `None` when the id was never provisioned.
    fn get(&self, id: &str) -> Result<Option<Value>, StoreError>;

    /// Receive every update committed after this call, in commit order.
    fn subscribe(&self, id: &str) -> Result<Subscription, StoreError>;

    /// Merge `patch` into the document and return the new revision.
    fn update(&self, id: &str, patch: &Value) -> Result<u64, StoreError>;
}

impl<S: SessionStore + ?Sized> SessionStore for std::sync::Arc<S> {
    fn get(&self, id: &str) -> Result<Option<Value>, StoreError> {
        (**self).get(id)
    }

    fn subscribe(&self, id: &str) -> Result<Subscription, StoreError> {
        (**self).subscribe(id)
    }

    fn update(&self, id: &str, patch: &Value) -> Result<u64, StoreError> {
        (**self).update(id, patch)
    }
}

/// Stream of updates for one session id. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: String,
    rx: mpsc::UnboundedReceiver<SessionUpdate>,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the next update. `None` once the store is gone.
    pub async fn next(&mut self) -> Option<SessionUpdate> {
        self.rx.recv().await
    }

    /// Non-blocking variant of [`next`](Self::next).
    pub fn try_next(&mut self) -> Option<SessionUpdate> {
        self.rx.try_recv().ok()
    }

    pub fn unsubscribe(self) {}
}

/// Per-id fan-out shared by the adapters. Callers publish while holding
/// their write lock so delivery order equals commit order.
#[derive(Debug, Default)]
pub(crate) struct Subscribers {
    senders: HashMap<String, Vec<mpsc::UnboundedSender<SessionUpdate>>>,
    last_published: HashMap<String, u64>,
}

impl Subscribers {
    pub(crate) fn add(&mut self, id: &str, current_revision: u64) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.entry(id.to_string()).or_default().push(tx);
        let last = self.last_published.entry(id.to_string()).or_insert(0);
        *last = (*last).max(current_revision);
        Subscription {
            id: id.to_string(),
            rx,
        }
    }

    /// Deliver `update` unless an equal or newer revision already went out.
    pub(crate) fn publish(&mut self, update: SessionUpdate) -> bool {
        let last = self.last_published.entry(update.id.clone()).or_insert(0);
        if update.revision <= *last {
            return false;
        }
        *last = update.revision;
        if let Some(senders) = self.senders.get_mut(&update.id) {
            senders.retain(|tx| tx.send(update.clone()).is_ok());
        }
        true
    }

    pub(crate) fn watched_ids(&mut self) -> Vec<(String, u64)> {
        self.senders.retain(|_, senders| {
            senders.retain(|tx| !tx.is_closed());
            !senders.is_empty()
        });
        self.senders
            .keys()
            .map(|id| (id.clone(), self.last_published.get(id).copied().unwrap_or(0)))
            .collect()
    }
}

/// Apply an RFC 7396 JSON merge-patch to `target`.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target_map) = target {
        for (key, value) in patch_map {
            if value.is_null() {
                target_map.remove(key);
            } else {
                merge_patch(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

/// Idle documents written when a store is first provisioned.
pub(crate) fn provisioned_documents() -> Result<Vec<(&'static str, Value)>, StoreError> {
    let encode = |id: &str, value: Result<Value, serde_json::Error>| {
        value.map_err(|e| StoreError::Malformed {
            id: id.to_string(),
            message: e.to_string(),
        })
    };
    Ok(vec![
        (
            CIRCUIT_SESSION_ID,
            encode(CIRCUIT_SESSION_ID, serde_json::to_value(CircuitSession::default()))?,
        ),
        (
            STRETCH_SESSION_ID,
            encode(STRETCH_SESSION_ID, serde_json::to_value(StretchSession::default()))?,
        ),
    ])
}

/// Read the circuit session; missing or malformed reads as idle.
pub fn load_circuit<S: SessionStore + ?Sized>(store: &S) -> Result<CircuitSession, StoreError> {
    Ok(CircuitSession::from_document(
        store.get(CIRCUIT_SESSION_ID)?.as_ref(),
    ))
}

/// Read the stretch session; missing or malformed reads as idle.
pub fn load_stretch<S: SessionStore + ?Sized>(store: &S) -> Result<StretchSession, StoreError> {
    Ok(StretchSession::from_document(
        store.get(STRETCH_SESSION_ID)?.as_ref(),
    ))
}

/// Serialize a typed patch and write it.
pub fn write_patch<S, P>(store: &S, id: &str, patch: &P) -> Result<u64, StoreError>
where
    S: SessionStore + ?Sized,
    P: MergePatch,
{
    let value = patch.to_merge_patch().map_err(|e| StoreError::Malformed {
        id: id.to_string(),
        message: e.to_string(),
    })?;
    store.update(id, &value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_patch_follows_rfc_7396() {
        let mut doc = json!({
            "status": "running",
            "start_time": "2026-03-02T15:00:00Z",
            "dyn": {"duration": 30, "rest": 5}
        });
        merge_patch(
            &mut doc,
            &json!({"status": "idle", "start_time": null, "dyn": {"rest": 0}}),
        );
        assert_eq!(
            doc,
            json!({"status": "idle", "dyn": {"duration": 30, "rest": 0}})
        );
    }

    #[test]
    fn merge_patch_replaces_arrays_whole() {
        let mut doc = json!({"stations": ["a", "b", "c"]});
        merge_patch(&mut doc, &json!({"stations": ["d"]}));
        assert_eq!(doc, json!({"stations": ["d"]}));
    }

    #[test]
    fn subscribers_skip_stale_revisions() {
        let mut subs = Subscribers::default();
        let mut sub = subs.add("circuit_session", 3);
        let update = |revision| SessionUpdate {
            id: "circuit_session".into(),
            revision,
            document: json!({}),
        };
        assert!(!subs.publish(update(3)));
        assert!(subs.publish(update(4)));
        assert_eq!(sub.try_next().map(|u| u.revision), Some(4));
        assert!(sub.try_next().is_none());
    }

    #[test]
    fn dropped_subscriptions_are_pruned() {
        let mut subs = Subscribers::default();
        let sub = subs.add("stretch_session", 0);
        assert_eq!(subs.watched_ids().len(), 1);
        sub.unsubscribe();
        assert!(subs.watched_ids().is_empty());
    }
}
