use crate::client::QueryClient;
use crate::key::CacheKey;
use crate::key_factory::KeyFactory;
use crate::matcher::Matcher;
use crate::optimistic::{invalidate_keys, optimistic_update, replace_optimistic_item, rollback_cache, Operation};
use crate::store::CacheStore;
use std::fmt::Display;
use std::future::Future;
use strum::Display as StrumDisplay;
use tracing::{debug, instrument, warn};

/// Where a mutation is in its lifecycle.
///
/// Transitions are strictly linear: `Idle → OptimisticApplied → (Replaced | RolledBack) → Invalidated → Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay)]
#[strum(serialize_all = "snake_case")]
pub enum MutationPhase {
    Idle,
    OptimisticApplied,
    Replaced,
    RolledBack,
    Invalidated,
}

impl MutationPhase {
    pub fn can_advance_to(self, next: MutationPhase) -> bool {
        use MutationPhase::*;
        matches!(
            (self, next),
            (Idle, OptimisticApplied)
                | (OptimisticApplied, Replaced)
                | (OptimisticApplied, RolledBack)
                | (Replaced, Invalidated)
                | (RolledBack, Invalidated)
                | (Invalidated, Idle)
        )
    }
}

/// One optimistic mutation against a [`QueryClient`].
///
/// ```ignore
/// let like = Entity::new().with("comment_id", "c1").with("profile_id", "u1");
/// let confirmed = client
///     .mutation(domain::comment_like_keys(), Operation::Add)
///     .matcher(domain::comment_like_matcher())
///     .execute(like, |like| async move { backend.insert("comment_likes", like).await })
///     .await?;
/// ```
pub struct Mutation<'a, S>
where
    S: CacheStore,
{
    client:      &'a QueryClient<S>,
    key_factory: KeyFactory<S::Record>,
    operation:   Operation,
    matcher:     Option<Matcher<S::Record>>,
    phase:       MutationPhase,
}

impl<'a, S> Mutation<'a, S>
where
    S: CacheStore,
{
    pub(crate) fn new(client: &'a QueryClient<S>, key_factory: KeyFactory<S::Record>, operation: Operation) -> Self {
        Self {
            client,
            key_factory,
            operation,
            matcher: None,
            phase: MutationPhase::Idle,
        }
    }

    /// Use `matcher` instead of `id` equality to find the mutated record in cached collections.
    pub fn matcher(mut self, matcher: Matcher<S::Record>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn phase(&self) -> MutationPhase {
        self.phase
    }

    async fn advance(&mut self, next: MutationPhase, keys: &[CacheKey]) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal mutation transition {} -> {next}",
            self.phase
        );
        debug!("{} mutation: {} -> {next}", self.operation, self.phase);
        self.phase = next;
        for observer in self.client.observers() {
            observer.on_phase(self.operation, next, keys).await;
        }
    }

    /// Run the mutation: apply it to the cache optimistically, await `remote` with the record, then confirm or roll
    /// back the cache and finally invalidate every touched key.
    ///
    /// The remote result is returned as is. On success, add and update mutations swap the optimistic record for the
    /// confirmed one wherever it was inserted.
    #[instrument(level = "debug", skip_all, fields(operation = %self.operation))]
    pub async fn execute<F, Fut, E>(mut self, record: S::Record, remote: F) -> Result<S::Record, E>
    where
        F: FnOnce(S::Record) -> Fut,
        Fut: Future<Output = Result<S::Record, E>>,
        E: Display,
    {
        let store = self.client.store();
        let matcher = self.matcher.clone();

        let snapshot = optimistic_update(&*store, &self.key_factory, &record, self.operation, matcher.as_ref());
        let touched = snapshot.keys();
        self.advance(MutationPhase::OptimisticApplied, &touched).await;

        let outcome = remote(record.clone()).await;

        match &outcome {
            Ok(confirmed) => {
                let replaced = match self.operation {
                    Operation::Add | Operation::Update => {
                        replace_optimistic_item(&*store, &self.key_factory, &record, confirmed, matcher.as_ref())
                    }
                    Operation::Remove => Vec::new(),
                };
                self.advance(MutationPhase::Replaced, &replaced).await;
                for observer in self.client.observers() {
                    observer.on_confirmed(self.operation, &record, confirmed).await;
                }
            }
            Err(err) => {
                warn!("{} mutation failed, rolling back {} key(s): {err}", self.operation, snapshot.len());
                rollback_cache(&*store, Some(&snapshot));
                self.advance(MutationPhase::RolledBack, &touched).await;
                let message = err.to_string();
                for observer in self.client.observers() {
                    observer.on_error(self.operation, &record, &message).await;
                }
            }
        }

        let invalidated = invalidate_keys(&*store, &self.key_factory, Some(&record));
        self.advance(MutationPhase::Invalidated, &invalidated).await;
        self.advance(MutationPhase::Idle, &[]).await;

        outcome
    }
}
