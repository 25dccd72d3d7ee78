//! In-process session store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use serde_json::{Map, Value};

use super::{
    merge_patch, provisioned_documents, SessionStore, SessionUpdate, Subscribers, Subscription,
};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct Inner {
    documents: HashMap<String, (u64, Value)>,
    subscribers: Subscribers,
}

/// Session store backed by a map. Every subscriber lives in this process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding idle circuit and stretch sessions at revision 0.
    ///
    /// # Errors
    /// Returns an error if the default documents cannot be encoded.
    pub fn provisioned() -> Result<Self, StoreError> {
        let store = Self::new();
        {
            let mut inner = store.lock()?;
            for (id, doc) in provisioned_documents()? {
                inner.documents.insert(id.to_string(), (0, doc));
            }
        }
        Ok(store)
    }

    /// Make subsequent writes fail with [`StoreError::Closed`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Closed)
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.lock()?.documents.get(id).map(|(_, doc)| doc.clone()))
    }

    fn subscribe(&self, id: &str) -> Result<Subscription, StoreError> {
        let mut inner = self.lock()?;
        let revision = inner.documents.get(id).map(|(rev, _)| *rev).unwrap_or(0);
        Ok(inner.subscribers.add(id, revision))
    }

    fn update(&self, id: &str, patch: &Value) -> Result<u64, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        let mut inner = self.lock()?;
        let (revision, document) = {
            let entry = inner
                .documents
                .entry(id.to_string())
                .or_insert_with(|| (0, Value::Object(Map::new())));
            merge_patch(&mut entry.1, patch);
            entry.0 += 1;
            (entry.0, entry.1.clone())
        };
        inner.subscribers.publish(SessionUpdate {
            id: id.to_string(),
            revision,
            document,
        });
        tracing::debug!(id, revision, "memory store committed update");
        Ok(revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn provisioned_store_holds_idle_sessions() {
        let store = MemoryStore::provisioned().unwrap();
        let circuit = store.get("circuit_session").unwrap().unwrap();
        assert_eq!(circuit["status"], "idle");
        let stretch = store.get("stretch_session").unwrap().unwrap();
        assert_eq!(stretch["dyn"]["duration"], 30);
        assert!(store.get("nope").unwrap().is_none());
    }

    #[test]
    fn updates_arrive_in_commit_order() {
        let store = MemoryStore::provisioned().unwrap();
        let mut sub = store.subscribe("circuit_session").unwrap();
        store
            .update("circuit_session", &json!({"status": "running"}))
            .unwrap();
        store
            .update("circuit_session", &json!({"status": "paused", "elapsed_at_pause": 4}))
            .unwrap();
        store
            .update("circuit_session", &json!({"status": "running"}))
            .unwrap();

        let statuses: Vec<(u64, String)> = std::iter::from_fn(|| sub.try_next())
            .map(|u| (u.revision, u.document["status"].as_str().unwrap().to_string()))
            .collect();
        assert_eq!(
            statuses,
            vec![
                (1, "running".to_string()),
                (2, "paused".to_string()),
                (3, "running".to_string())
            ]
        );
    }

    #[test]
    fn other_ids_are_not_delivered() {
        let store = MemoryStore::provisioned().unwrap();
        let mut sub = store.subscribe("stretch_session").unwrap();
        store
            .update("circuit_session", &json!({"status": "running"}))
            .unwrap();
        assert!(sub.try_next().is_none());
    }

    #[test]
    fn failing_writes_leave_document_untouched() {
        let store = MemoryStore::provisioned().unwrap();
        store.set_fail_writes(true);
        assert!(store
            .update("circuit_session", &json!({"status": "running"}))
            .is_err());
        assert_eq!(
            store.get("circuit_session").unwrap().unwrap()["status"],
            "idle"
        );
    }
}
