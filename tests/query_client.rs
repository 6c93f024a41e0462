mod common;

use common::*;
use optimistic_cache::domain;
use optimistic_cache::prelude::*;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_stream::StreamExt;

#[tokio::test]
async fn fetch_query_reads_through() {
    init_tracing();
    let client = client_with(moka(), vec![]);
    let key = cache_key![domain::GROUPS];
    let counter = AtomicUsize::new(0);
    let fetches = &counter;

    let fetch = move || async move {
        fetches.fetch_add(1, Ordering::SeqCst);
        Ok::<_, BackendError>(list(vec![json!({"id": "g1"})]))
    };

    let first = client.fetch_query(&key, fetch).await.unwrap();
    let second = client.fetch_query(&key, fetch).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(fetches.load(Ordering::SeqCst), 1);

    client.invalidate(&domain::group_keys(), Some(&Entity::new()));
    assert!(client.is_stale(&key));

    client.fetch_query(&key, fetch).await.unwrap();
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
    assert!(!client.is_stale(&key));
}

#[tokio::test]
async fn fetch_errors_leave_the_cache_alone() {
    let client = client_with(moka(), vec![]);
    let key = cache_key![domain::MATCHES, "u1"];
    client.set_query_data(&key, Some(list(vec![json!({"id": "m1"})])));
    client.invalidate(&KeyFactory::fixed(key.clone()), None);

    let result = client
        .fetch_query(&key, || async { Err::<CacheValue<Entity>, _>(BackendError::Network) })
        .await;

    assert_eq!(result, Err(BackendError::Network));
    assert_eq!(client.get_query_data(&key), Some(list(vec![json!({"id": "m1"})])));
    assert!(client.is_stale(&key));
}

#[tokio::test]
async fn subscribers_see_invalidations() {
    let client = client_with(moka(), vec![]);
    let mut invalidated = Box::pin(client.invalidations());

    client
        .mutation(domain::comment_keys(), Operation::Add)
        .execute(e(json!({"post_id": "p1", "body": "nice"})).with_temporary_id(), |c| async move {
            Ok::<_, BackendError>(c.with("id", "c9"))
        })
        .await
        .unwrap();

    let key = tokio::time::timeout(Duration::from_secs(1), invalidated.next())
        .await
        .expect("invalidation event arrives")
        .expect("stream is open");
    assert_eq!(key, cache_key![domain::COMMENTS, "p1"]);
    assert_eq!(
        client.get_query_data(&key),
        Some(list(vec![json!({"id": "c9", "post_id": "p1", "body": "nice"})]))
    );
}

#[test]
fn client_requires_a_store() {
    assert!(QueryClient::<MokaStore<Entity>>::builder().build().is_err());

    let client = QueryClient::builder().store(moka()).build().expect("store is enough");
    assert!(client.observers().is_empty());
}
