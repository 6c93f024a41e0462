//! Speculative cache writes and the means to undo, confirm and expire them.
//!
//! A mutation drives these in a fixed order: [`optimistic_update`] before the remote call, then either
//! [`replace_optimistic_item`] on success or [`rollback_cache`] on failure, and [`invalidate_keys`] in every case.
//! [`Mutation`](crate::mutation::Mutation) does exactly that; the functions are public for callers who need to drive
//! the steps themselves.

use crate::key::CacheKey;
use crate::key_factory::KeyFactory;
use crate::matcher::Matcher;
use crate::store::CacheStore;
use crate::value::CacheValue;
use moka::ops::compute::Op;
use std::collections::BTreeMap;
use strum::Display;
use strum::EnumString;
use tracing::{debug, instrument, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    Add,
    Update,
    Remove,
}

/// What the touched addresses held right before an optimistic update.
///
/// Entries are indexed by [`CacheKey::encode`] and record a missing address as `None`, so restoring a snapshot also
/// restores "there was nothing here".
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<R> {
    entries: BTreeMap<String, Option<CacheValue<R>>>,
}

impl<R> Snapshot<R> {
    fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Keys captured by the snapshot.
    pub fn keys(&self) -> Vec<CacheKey> {
        self.entries.keys().filter_map(|k| CacheKey::decode(k).ok()).collect()
    }

    pub fn previous(&self, key: &CacheKey) -> Option<Option<&CacheValue<R>>> {
        self.entries.get(&key.encode()).map(Option::as_ref)
    }

    fn record(&mut self, key: &CacheKey, previous: Option<CacheValue<R>>) {
        // The first capture of an address is the pre-mutation state; never overwrite it.
        self.entries.entry(key.encode()).or_insert(previous);
    }
}

impl<R> Default for Snapshot<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply `operation` with `record` to every address the key factory derives from `record`.
///
/// Returns the snapshot of the prior state of each address, missing ones included. Addresses whose value shape
/// doesn't support the operation are snapshotted and left unchanged.
#[instrument(level = "trace", skip_all, fields(operation = %operation))]
pub fn optimistic_update<S>(
    store: &S,
    key_factory: &KeyFactory<S::Record>,
    record: &S::Record,
    operation: Operation,
    matcher: Option<&Matcher<S::Record>>,
) -> Snapshot<S::Record>
where
    S: CacheStore + ?Sized,
{
    let default_matcher = Matcher::default();
    let matcher = matcher.unwrap_or(&default_matcher);
    let keys = key_factory.extract(Some(record));
    let mut snapshot = Snapshot::new();

    if keys.is_empty() {
        warn!("Optimistic {operation} skipped: key factory {key_factory:?} yields no key for {record:?}");
        return snapshot;
    }

    for key in keys {
        let previous = store.compute(&key, &mut |current| CacheValue::transformed(current, operation, record, matcher));
        trace!("Optimistic {operation} at {key}; had value: {}", previous.is_some());
        snapshot.record(&key, previous);
    }

    debug!("Optimistic {operation} applied to {} key(s)", snapshot.len());
    snapshot
}

/// Restore every address captured by the snapshot to its recorded value, clearing those that were missing.
///
/// Restoring the same snapshot again leaves the store as it is.
#[instrument(level = "trace", skip_all)]
pub fn rollback_cache<S>(store: &S, snapshot: Option<&Snapshot<S::Record>>)
where
    S: CacheStore + ?Sized,
{
    let Some(snapshot) = snapshot
    else {
        return;
    };

    for (encoded, previous) in &snapshot.entries {
        match CacheKey::decode(encoded) {
            Ok(key) => {
                trace!("Rolling back {key}");
                store.set(&key, previous.clone());
            }
            // Only reachable with a hand-crafted snapshot; keys are always encoded by `Snapshot::record`.
            Err(err) => warn!("Skipping rollback of an undecodable key: {err}"),
        }
    }

    debug!("Rolled back {} key(s)", snapshot.len());
}

/// Swap every cached record matching `record` for `confirmed`, as is, at each address derived from `record`.
///
/// Returns the keys whose values were rewritten.
#[instrument(level = "trace", skip_all)]
pub fn replace_optimistic_item<S>(
    store: &S,
    key_factory: &KeyFactory<S::Record>,
    record: &S::Record,
    confirmed: &S::Record,
    matcher: Option<&Matcher<S::Record>>,
) -> Vec<CacheKey>
where
    S: CacheStore + ?Sized,
{
    let default_matcher = Matcher::default();
    let matcher = matcher.unwrap_or(&default_matcher);
    let mut replaced = Vec::new();

    for key in key_factory.extract(Some(record)) {
        let mut changed = false;
        store.compute(&key, &mut |current| {
            let op = CacheValue::replaced(current, record, confirmed, matcher);
            changed = !matches!(op, Op::Nop);
            op
        });
        if changed {
            replaced.push(key);
        }
    }

    debug!("Replaced optimistic record at {} key(s)", replaced.len());
    replaced
}

/// Flag every derived address stale so current and future readers refetch it.
///
/// `record` may be omitted for static key factories. Returns the invalidated keys.
#[instrument(level = "trace", skip_all)]
pub fn invalidate_keys<S>(store: &S, key_factory: &KeyFactory<S::Record>, record: Option<&S::Record>) -> Vec<CacheKey>
where
    S: CacheStore + ?Sized,
{
    let keys = key_factory.extract(record);

    if keys.is_empty() {
        warn!("Invalidation skipped: key factory {key_factory:?} yields no key for {record:?}");
    }

    for key in &keys {
        store.mark_stale(key);
    }

    debug!("Invalidated {} key(s)", keys.len());
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_key;
    use crate::key_factory::KeySet;
    use crate::record::Entity;
    use crate::store::MokaStore;
    use crate::value::Paginated;
    use serde_json::{json, Value};

    fn e(v: Value) -> Entity {
        Entity::from_value(v).unwrap()
    }

    fn store() -> MokaStore<Entity> {
        MokaStore::builder().build().unwrap()
    }

    fn posts() -> KeyFactory<Entity> {
        KeyFactory::derived(|post: &Entity| {
            KeySet::labeled([
                ("all", Some(cache_key!["posts"])),
                (
                    "single",
                    post.get("id").and_then(Value::as_str).map(|id| cache_key!["posts", id]),
                ),
            ])
        })
    }

    #[test]
    fn snapshot_round_trips_every_shape() {
        let shapes: Vec<Option<CacheValue<Entity>>> = vec![
            None,
            Some(CacheValue::List(vec![e(json!({"id": "1", "a": 1}))])),
            Some(CacheValue::Single(e(json!({"id": "1", "a": 1})))),
            Some(CacheValue::Paginated(Paginated::new(vec![vec![e(json!({"id": "1"}))], vec![]]))),
            Some(CacheValue::Other(json!("scalar"))),
        ];

        for shape in shapes {
            for op in [Operation::Add, Operation::Update, Operation::Remove] {
                let store = store();
                let kf = KeyFactory::fixed(cache_key!["k"]);
                store.set(&cache_key!["k"], shape.clone());

                let snapshot = optimistic_update(&store, &kf, &e(json!({"id": "1", "a": 2})), op, None);
                rollback_cache(&store, Some(&snapshot));
                assert_eq!(store.get(&cache_key!["k"]), shape, "{op} on {shape:?}");
            }
        }
    }

    #[test]
    fn rollback_is_idempotent() {
        let store = store();
        let kf = posts();
        store.set(&cache_key!["posts"], Some(CacheValue::List(vec![e(json!({"id": "p1"}))])));

        let snapshot = optimistic_update(&store, &kf, &e(json!({"id": "p2"})), Operation::Add, None);
        rollback_cache(&store, Some(&snapshot));
        let once = (store.get(&cache_key!["posts"]), store.get(&cache_key!["posts", "p2"]));
        rollback_cache(&store, Some(&snapshot));
        let twice = (store.get(&cache_key!["posts"]), store.get(&cache_key!["posts", "p2"]));

        assert_eq!(once, twice);
        assert_eq!(once, (Some(CacheValue::List(vec![e(json!({"id": "p1"}))])), None));
    }

    #[test]
    fn rollback_of_nothing_is_noop() {
        let store = store();
        store.set(&cache_key!["posts"], Some(CacheValue::List(vec![])));
        rollback_cache(&store, None);
        rollback_cache(&store, Some(&Snapshot::default()));
        assert_eq!(store.get(&cache_key!["posts"]), Some(CacheValue::List(vec![])));
    }

    #[test]
    fn snapshot_records_missing_addresses() {
        let store = store();
        let snapshot = optimistic_update(&store, &posts(), &e(json!({"id": "p1"})), Operation::Add, None);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.previous(&cache_key!["posts"]), Some(None));
        assert_eq!(snapshot.keys(), vec![cache_key!["posts"], cache_key!["posts", "p1"]]);
    }

    #[test]
    fn empty_key_set_is_a_noop() {
        let store = store();
        let kf = KeyFactory::<Entity>::derived(|_| KeySet::labeled([("single", None)]));
        let snapshot = optimistic_update(&store, &kf, &e(json!({"id": "x"})), Operation::Add, None);
        assert!(snapshot.is_empty());
        assert!(invalidate_keys(&store, &kf, Some(&e(json!({"id": "x"})))).is_empty());
    }

    #[test]
    fn replace_reports_touched_keys() {
        let store = store();
        let temp = e(json!({"id": "temp-1"}));
        store.set(&cache_key!["posts"], Some(CacheValue::List(vec![temp.clone()])));
        store.set(&cache_key!["posts", "temp-1"], Some(CacheValue::Single(e(json!({"id": "other"})))));

        let replaced = replace_optimistic_item(&store, &posts(), &temp, &e(json!({"id": "real-42", "x": 1})), None);
        assert_eq!(replaced, vec![cache_key!["posts"]]);
        assert_eq!(
            store.get(&cache_key!["posts"]),
            Some(CacheValue::List(vec![e(json!({"id": "real-42", "x": 1}))]))
        );
    }

    #[test]
    fn invalidation_with_static_factory_needs_no_record() {
        let store = store();
        store.set(&cache_key!["groups"], Some(CacheValue::List(vec![])));
        let keys = invalidate_keys(&store, &KeyFactory::fixed(cache_key!["groups"]), None);
        assert_eq!(keys, vec![cache_key!["groups"]]);
        assert!(store.is_stale(&cache_key!["groups"]));
    }

    #[test]
    fn operation_names() {
        assert_eq!(Operation::Add.to_string(), "add");
        assert_eq!("remove".parse::<Operation>().unwrap(), Operation::Remove);
    }
}
