//! Shared test fixtures for editing-session integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use atelier_core::types::ResourceKey;
use atelier_events::TopicBus;
use atelier_presence::PresenceRegistry;
use atelier_session::{ResourceStore, SessionContext, StoreError};
use tokio::sync::Mutex;

/// In-memory `ResourceStore` double with switchable failure modes.
///
/// `save` merges nothing: it stores the patch verbatim and returns it,
/// which is all the coordination layer observes.
pub struct InMemoryStore {
    resources: Mutex<HashMap<ResourceKey, serde_json::Value>>,
    unavailable: AtomicBool,
    reject_saves: AtomicBool,
    loads: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            resources: Mutex::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
            reject_saves: AtomicBool::new(false),
            loads: AtomicUsize::new(0),
        })
    }

    /// Seed a persisted resource.
    pub async fn insert(&self, key: ResourceKey, resource: serde_json::Value) {
        self.resources.lock().await.insert(key, resource);
    }

    /// Fetch what is currently persisted.
    pub async fn persisted(&self, key: &ResourceKey) -> Option<serde_json::Value> {
        self.resources.lock().await.get(key).cloned()
    }

    /// Simulate a storage outage (both loads and saves fail).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make every save fail validation.
    pub fn set_reject_saves(&self, reject: bool) {
        self.reject_saves.store(reject, Ordering::SeqCst);
    }

    /// Number of `load` calls served so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn load(&self, key: &ResourceKey) -> Result<serde_json::Value, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store offline".to_string()));
        }
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.resources
            .lock()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn save(
        &self,
        key: &ResourceKey,
        patch: &serde_json::Value,
    ) -> Result<serde_json::Value, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store offline".to_string()));
        }
        if self.reject_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Validation("title must not be empty".to_string()));
        }
        self.resources
            .lock()
            .await
            .insert(key.clone(), patch.clone());
        Ok(patch.clone())
    }
}

/// Build a registry + bus + store wired into a `SessionContext`.
pub fn test_context() -> (SessionContext, Arc<InMemoryStore>) {
    let bus = Arc::new(TopicBus::default());
    let registry = Arc::new(PresenceRegistry::new(bus.clone()));
    let store = InMemoryStore::new();
    let ctx = SessionContext {
        registry,
        bus,
        store: store.clone(),
    };
    (ctx, store)
}
