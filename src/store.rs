use crate::key::CacheKey;
use crate::record::Record;
use crate::value::CacheValue;
use fieldx::fxstruct;
use moka::ops::compute::Op;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::trace;

/// Notifications published by a store whenever an address changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Updated(CacheKey),
    Removed(CacheKey),
    Invalidated(CacheKey),
}

impl CacheEvent {
    pub fn key(&self) -> &CacheKey {
        match self {
            Self::Updated(k) | Self::Removed(k) | Self::Invalidated(k) => k,
        }
    }
}

pub type ComputeFn<'a, R> = dyn FnMut(Option<&CacheValue<R>>) -> Op<CacheValue<R>> + 'a;

/// Key-addressed store of query results shared by every query and mutation of a client.
pub trait CacheStore: Send + Sync + 'static {
    type Record: Record;

    fn get(&self, key: &CacheKey) -> Option<CacheValue<Self::Record>>;

    /// Write a value at the address, or clear it with `None`. A written value is fresh.
    fn set(&self, key: &CacheKey, value: Option<CacheValue<Self::Record>>);

    /// Flag the address as stale so the next read refetches it.
    fn mark_stale(&self, key: &CacheKey);

    fn is_stale(&self, key: &CacheKey) -> bool;

    fn subscribe(&self) -> broadcast::Receiver<CacheEvent>;

    /// Read-transform-write of one address. Returns the value the address held before.
    ///
    /// Implementations should make this atomic per key. The default is a plain `get` followed by a `set`.
    fn compute(&self, key: &CacheKey, f: &mut ComputeFn<'_, Self::Record>) -> Option<CacheValue<Self::Record>> {
        let previous = self.get(key);
        match f(previous.as_ref()) {
            Op::Put(value) => self.set(key, Some(value)),
            Op::Remove => self.set(key, None),
            Op::Nop => (),
        }
        previous
    }
}

#[derive(Debug, Clone)]
struct Slot<R> {
    value: CacheValue<R>,
    stale: bool,
}

impl<R> Slot<R> {
    fn fresh(value: CacheValue<R>) -> Self {
        Self { value, stale: false }
    }
}

/// In-memory store on top of a [moka](https://crates.io/crates/moka) cache.
///
/// Defaults: name `query-cache`, 10 000 addresses, 5 minutes time-to-idle, 256 buffered events.
///
/// Capacity and idle eviction apply to every address, including one holding an optimistic write whose mutation is
/// still in flight. An evicted address reads as missing until it is refetched; a rollback of that mutation writes the
/// snapshot back as usual.
///
/// ```
/// use optimistic_cache::prelude::*;
///
/// let store = MokaStore::<Entity>::builder().name("feed").max_capacity(1_000).build().unwrap();
/// store.set(&cache_key!["posts"], Some(CacheValue::List(vec![])));
/// assert_eq!(store.get(&cache_key!["posts"]), Some(CacheValue::List(vec![])));
/// ```
#[fxstruct(sync, no_new, builder)]
pub struct MokaStore<R>
where
    R: Record,
{
    /// Store name. Most useful for debugging and logging.
    #[fieldx(get(clone), builder(into), default(String::from("query-cache")))]
    name: String,

    #[fieldx(get(copy), default(10_000))]
    max_capacity: u64,

    /// How long an entry nobody reads or writes survives.
    #[fieldx(get(copy), default(Duration::from_secs(300)))]
    time_to_idle: Duration,

    #[fieldx(get(copy), default(256))]
    event_capacity: usize,

    #[fieldx(lazy, private, get(clone), builder(off))]
    cache: Arc<Cache<CacheKey, Slot<R>>>,

    #[fieldx(lazy, private, get(clone), builder(off))]
    events: broadcast::Sender<CacheEvent>,
}

impl<R> MokaStore<R>
where
    R: Record,
{
    fn build_cache(&self) -> Arc<Cache<CacheKey, Slot<R>>> {
        Arc::new(
            Cache::builder()
                .max_capacity(self.max_capacity())
                .time_to_idle(self.time_to_idle())
                .name(&self.name())
                .eviction_policy(EvictionPolicy::tiny_lfu())
                .build(),
        )
    }

    fn build_events(&self) -> broadcast::Sender<CacheEvent> {
        broadcast::channel(self.event_capacity().max(1)).0
    }

    fn publish(&self, event: CacheEvent) {
        trace!("[{}] {event:?}", self.name());
        // Nobody listening is fine.
        let _ = self.events().send(event);
    }

    /// Number of addresses currently holding a value.
    pub fn entry_count(&self) -> u64 {
        let cache = self.cache();
        cache.run_pending_tasks();
        cache.entry_count()
    }
}

impl<R> CacheStore for MokaStore<R>
where
    R: Record,
{
    type Record = R;

    fn get(&self, key: &CacheKey) -> Option<CacheValue<R>> {
        self.cache().get(key).map(|slot| slot.value)
    }

    fn set(&self, key: &CacheKey, value: Option<CacheValue<R>>) {
        match value {
            Some(value) => {
                self.cache().insert(key.clone(), Slot::fresh(value));
                self.publish(CacheEvent::Updated(key.clone()));
            }
            None => {
                self.cache().invalidate(key);
                self.publish(CacheEvent::Removed(key.clone()));
            }
        }
    }

    fn mark_stale(&self, key: &CacheKey) {
        let _ = self.cache().entry(key.clone()).and_compute_with(|entry| match entry {
            Some(entry) => {
                let mut slot = entry.into_value();
                slot.stale = true;
                Op::Put(slot)
            }
            None => Op::Nop,
        });
        self.publish(CacheEvent::Invalidated(key.clone()));
    }

    fn is_stale(&self, key: &CacheKey) -> bool {
        self.cache().get(key).is_some_and(|slot| slot.stale)
    }

    fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events().subscribe()
    }

    fn compute(&self, key: &CacheKey, f: &mut ComputeFn<'_, R>) -> Option<CacheValue<R>> {
        let mut previous = None;
        let mut event = None;

        let _ = self.cache().entry(key.clone()).and_compute_with(|entry| {
            let current = entry.map(|e| e.into_value().value);
            let op = match f(current.as_ref()) {
                Op::Put(value) => {
                    event = Some(CacheEvent::Updated(key.clone()));
                    Op::Put(Slot::fresh(value))
                }
                Op::Remove => {
                    event = current.as_ref().map(|_| CacheEvent::Removed(key.clone()));
                    Op::Remove
                }
                Op::Nop => Op::Nop,
            };
            previous = current;
            op
        });

        if let Some(event) = event {
            self.publish(event);
        }

        previous
    }
}

impl<R> Debug for MokaStore<R>
where
    R: Record,
{
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("MokaStore")
            .field("name", &self.name())
            .field("max_capacity", &self.max_capacity())
            .finish()
    }
}
