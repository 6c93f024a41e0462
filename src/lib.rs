//! # optimistic-cache
//!
//! Client-side query cache that keeps UI state consistent with a remote, failable data store.
//!
//! Think of it as the reconciliation layer between the widgets that mutate data and the backend that owns it.
//!
//! # The Basics
//!
//! Query results are stored under [`CacheKey`]s: ordered sequences of scalar segments like `["comment_likes", "c1"]`.
//! Each feature domain owns a [`KeyFactory`] that maps a (possibly partial) record to the keys holding it, e.g. the
//! list of all profiles plus the single profile.
//!
//! A mutation goes through four steps:
//!
//! 1. **Optimistic update.** Before the remote call is sent, the record is added to, merged into or removed from every
//!    cached value its keys address. Flat lists, paginated containers and single records are understood; anything
//!    else is left alone. What each address held before is kept in a [`Snapshot`](optimistic::Snapshot).
//! 2. **Replacement.** When the backend confirms the write, the optimistic record (often carrying a temporary id) is
//!    swapped for the confirmed one wherever it was inserted.
//! 3. **Rollback.** When the backend refuses, the snapshot is written back verbatim.
//! 4. **Invalidation.** Whatever happened, every touched key is marked stale so the next read refetches it.
//!
//! [`Mutation::execute`](mutation::Mutation::execute) drives the steps; the functions in [`optimistic`] are available
//! for callers that need to drive them by hand.
//!
//! # The Store
//!
//! The cache store is an injected dependency behind the [`CacheStore`] trait. [`MokaStore`] keeps values in a
//! [moka](https://crates.io/crates/moka) cache, tracks staleness and publishes [`CacheEvent`]s to subscribers.
//!
//! There is no isolation between concurrent mutations touching the same keys: the later one snapshots and transforms
//! whatever the earlier one left. Invalidation is what eventually brings the cache back in line with the backend.

pub mod client;
pub mod domain;
pub mod error;
pub mod key;
pub mod key_factory;
pub mod matcher;
pub mod mutation;
pub mod optimistic;
pub mod record;
pub mod store;
pub mod traits;
pub mod value;

#[doc(inline)]
pub use client::QueryClient;
#[doc(inline)]
pub use key::CacheKey;
#[doc(inline)]
pub use key_factory::KeyFactory;
#[doc(inline)]
pub use store::{CacheEvent, CacheStore, MokaStore};

pub mod prelude {
    pub use crate::cache_key;
    pub use crate::client::QueryClient;
    pub use crate::error::Error;
    pub use crate::key::CacheKey;
    pub use crate::key_factory::{KeyFactory, KeySet};
    pub use crate::matcher::Matcher;
    pub use crate::mutation::{Mutation, MutationPhase};
    pub use crate::optimistic::{
        invalidate_keys, optimistic_update, replace_optimistic_item, rollback_cache, Operation, Snapshot,
    };
    pub use crate::record::{Entity, Record};
    pub use crate::store::{CacheEvent, CacheStore, MokaStore};
    pub use crate::traits::Observer;
    pub use crate::value::{CacheValue, Page, Paginated};
}
