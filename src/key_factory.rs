use crate::key::CacheKey;
use crate::record::Record;
use std::fmt::Debug;
use std::sync::Arc;

/// What a key factory produces for one record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KeySet {
    #[default]
    Empty,
    Single(CacheKey),
    /// Named keys. `None` marks a key that can't be derived because its identifying fields are missing.
    Labeled(Vec<(&'static str, Option<CacheKey>)>),
}

impl KeySet {
    pub fn labeled<I>(labels: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, Option<CacheKey>)>,
    {
        Self::Labeled(labels.into_iter().collect())
    }

    pub fn get(&self, label: &str) -> Option<&CacheKey> {
        match self {
            Self::Labeled(labels) => labels.iter().find(|(l, _)| *l == label).and_then(|(_, k)| k.as_ref()),
            _ => None,
        }
    }

    /// All present keys in factory order.
    pub fn into_keys(self) -> Vec<CacheKey> {
        match self {
            Self::Empty => Vec::new(),
            Self::Single(key) => vec![key],
            Self::Labeled(labels) => labels.into_iter().filter_map(|(_, key)| key).collect(),
        }
    }
}

impl From<CacheKey> for KeySet {
    fn from(key: CacheKey) -> Self {
        Self::Single(key)
    }
}

impl From<Option<CacheKey>> for KeySet {
    fn from(key: Option<CacheKey>) -> Self {
        key.map_or(Self::Empty, Self::Single)
    }
}

pub type DeriveFn<R> = dyn Fn(&R) -> KeySet + Send + Sync;

/// Maps a (partial) record to the cache keys an operation on that record must touch.
///
/// Derived factories must be pure: the same record always yields the same keys.
pub enum KeyFactory<R> {
    Static(CacheKey),
    Derived(Arc<DeriveFn<R>>),
}

impl<R> KeyFactory<R>
where
    R: Record,
{
    pub fn fixed(key: CacheKey) -> Self {
        Self::Static(key)
    }

    pub fn derived<F, K>(f: F) -> Self
    where
        F: Fn(&R) -> K + Send + Sync + 'static,
        K: Into<KeySet>,
    {
        Self::Derived(Arc::new(move |record| f(record).into()))
    }

    /// Normalize the factory output into the list of concrete keys to operate on.
    ///
    /// Absent keys are skipped and duplicates are collapsed to their first occurrence, so no address is ever visited
    /// twice by one operation. A derived factory given no record yields nothing.
    pub fn extract(&self, record: Option<&R>) -> Vec<CacheKey> {
        let keys = match self {
            Self::Static(key) => vec![key.clone()],
            Self::Derived(f) => match record {
                Some(record) => f(record).into_keys(),
                None => Vec::new(),
            },
        };

        let mut unique = Vec::with_capacity(keys.len());
        for key in keys {
            if !unique.contains(&key) {
                unique.push(key);
            }
        }
        unique
    }
}

impl<R> Clone for KeyFactory<R> {
    fn clone(&self) -> Self {
        match self {
            Self::Static(key) => Self::Static(key.clone()),
            Self::Derived(f) => Self::Derived(Arc::clone(f)),
        }
    }
}

impl<R> Debug for KeyFactory<R> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(key) => fmt.debug_tuple("KeyFactory::Static").field(key).finish(),
            Self::Derived(_) => fmt.write_str("KeyFactory::Derived(..)"),
        }
    }
}

impl<R> From<CacheKey> for KeyFactory<R> {
    fn from(key: CacheKey) -> Self {
        Self::Static(key)
    }
}
