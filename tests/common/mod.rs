#![allow(dead_code)]

use async_trait::async_trait;
use optimistic_cache::prelude::*;
use serde_json::Value;
use std::sync::{Arc, Mutex, Once};
use tokio::sync::broadcast;

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn e(v: Value) -> Entity {
    Entity::from_value(v).expect("fixture must be a JSON object")
}

pub fn list(items: Vec<Value>) -> CacheValue<Entity> {
    CacheValue::List(items.into_iter().map(e).collect())
}

pub fn moka() -> Arc<MokaStore<Entity>> {
    Arc::new(MokaStore::builder().name("test").build().expect("store builds"))
}

pub fn client_with(store: Arc<MokaStore<Entity>>, observers: Vec<Arc<dyn Observer<Entity>>>) -> QueryClient<MokaStore<Entity>> {
    QueryClient::builder()
        .store(store)
        .observers(observers)
        .build()
        .expect("client builds")
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Get(CacheKey),
    Set(CacheKey, bool),
    MarkStale(CacheKey),
}

/// A store that keeps a journal of every call on top of a moka store. Uses the default, non-atomic `compute`.
pub struct RecordingStore {
    inner: Arc<MokaStore<Entity>>,
    calls: Mutex<Vec<StoreCall>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            inner: moka(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().expect("journal lock").clone()
    }

    pub fn reset(&self) {
        self.calls.lock().expect("journal lock").clear();
    }

    fn log(&self, call: StoreCall) {
        self.calls.lock().expect("journal lock").push(call);
    }
}

impl CacheStore for RecordingStore {
    type Record = Entity;

    fn get(&self, key: &CacheKey) -> Option<CacheValue<Entity>> {
        self.log(StoreCall::Get(key.clone()));
        self.inner.get(key)
    }

    fn set(&self, key: &CacheKey, value: Option<CacheValue<Entity>>) {
        self.log(StoreCall::Set(key.clone(), value.is_some()));
        self.inner.set(key, value)
    }

    fn mark_stale(&self, key: &CacheKey) {
        self.log(StoreCall::MarkStale(key.clone()));
        self.inner.mark_stale(key)
    }

    fn is_stale(&self, key: &CacheKey) -> bool {
        self.inner.is_stale(key)
    }

    fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.inner.subscribe()
    }
}

/// Collects lifecycle notifications.
#[derive(Default)]
pub struct JournalObserver {
    pub phases: Mutex<Vec<MutationPhase>>,
    pub errors: Mutex<Vec<String>>,
    pub confirmed: Mutex<Vec<Entity>>,
}

impl JournalObserver {
    pub fn phases(&self) -> Vec<MutationPhase> {
        self.phases.lock().expect("phases lock").clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().expect("errors lock").clone()
    }
}

#[async_trait]
impl Observer<Entity> for JournalObserver {
    async fn on_phase(&self, _operation: Operation, phase: MutationPhase, _keys: &[CacheKey]) {
        self.phases.lock().expect("phases lock").push(phase);
    }

    async fn on_error(&self, _operation: Operation, _record: &Entity, message: &str) {
        self.errors.lock().expect("errors lock").push(message.to_string());
    }

    async fn on_confirmed(&self, _operation: Operation, _record: &Entity, confirmed: &Entity) {
        self.confirmed.lock().expect("confirmed lock").push(confirmed.clone());
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("duplicate key value violates unique constraint \"{0}\"")]
    Constraint(String),
    #[error("network unreachable")]
    Network,
}
