use crate::key::CacheKey;
use crate::key_factory::KeyFactory;
use crate::mutation::Mutation;
use crate::optimistic::{invalidate_keys, Operation};
use crate::store::{CacheEvent, CacheStore};
use crate::traits::Observer;
use crate::value::CacheValue;
use fieldx::fxstruct;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, instrument};

/// Entry point for queries and mutations over one shared store.
///
/// The store is injected, so an application can run every feature against one process-wide cache while tests use
/// their own.
///
/// ```ignore
/// let client = QueryClient::builder()
///     .store(Arc::new(MokaStore::<Entity>::builder().name("social").build()?))
///     .observers(vec![Arc::new(ToastObserver::default()) as Arc<dyn Observer<Entity>>])
///     .build()?;
///
/// let feed = client
///     .fetch_query(&cache_key!["posts", "feed"], || async { backend.feed().await })
///     .await?;
/// ```
#[fxstruct(sync, no_new, default(off), builder)]
pub struct QueryClient<S>
where
    S: CacheStore,
{
    #[fieldx(get(clone), builder(required))]
    store: Arc<S>,

    #[fieldx(get, default(Vec::new()))]
    observers: Vec<Arc<dyn Observer<S::Record>>>,
}

impl<S> QueryClient<S>
where
    S: CacheStore,
{
    pub fn get_query_data(&self, key: &CacheKey) -> Option<CacheValue<S::Record>> {
        self.store.get(key)
    }

    pub fn set_query_data(&self, key: &CacheKey, value: Option<CacheValue<S::Record>>) {
        self.store.set(key, value)
    }

    pub fn is_stale(&self, key: &CacheKey) -> bool {
        self.store.is_stale(key)
    }

    /// Read through the cache: a present, fresh value is returned as is; a missing or stale one is fetched and stored.
    ///
    /// Fetch errors are returned unchanged and leave the cache as it was.
    #[instrument(level = "debug", skip(self, fetcher))]
    pub async fn fetch_query<F, Fut, E>(&self, key: &CacheKey, fetcher: F) -> Result<CacheValue<S::Record>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CacheValue<S::Record>, E>>,
    {
        if let Some(value) = self.store.get(key) {
            if !self.store.is_stale(key) {
                return Ok(value);
            }
            debug!("{key} is stale, refetching");
        }
        else {
            debug!("{key} is missing, fetching");
        }

        let value = fetcher().await?;
        self.store.set(key, Some(value.clone()));
        Ok(value)
    }

    /// Mark every key the factory derives as stale. `record` may be omitted for static factories.
    pub fn invalidate(&self, key_factory: &KeyFactory<S::Record>, record: Option<&S::Record>) -> Vec<CacheKey> {
        invalidate_keys(&*self.store, key_factory, record)
    }

    /// Keys invalidated from now on. Lagging subscribers silently miss events.
    pub fn invalidations(&self) -> impl Stream<Item = CacheKey> + Send + 'static {
        BroadcastStream::new(self.store.subscribe()).filter_map(|event| match event {
            Ok(CacheEvent::Invalidated(key)) => Some(key),
            _ => None,
        })
    }

    pub fn mutation(&self, key_factory: KeyFactory<S::Record>, operation: Operation) -> Mutation<'_, S> {
        Mutation::new(self, key_factory, operation)
    }
}

impl<S> Debug for QueryClient<S>
where
    S: CacheStore + Debug,
{
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("QueryClient")
            .field("store", &self.store)
            .field("observers", &self.observers.len())
            .finish()
    }
}
