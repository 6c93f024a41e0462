use async_trait::async_trait;

use crate::key::CacheKey;
use crate::mutation::MutationPhase;
use crate::optimistic::Operation;
use crate::record::Record;

// For types that want to follow mutations through their lifecycle; e.g. UI layers showing a toast when an optimistic
// change had to be reverted.
#[async_trait]
pub trait Observer<R>: Send + Sync + 'static
where
    R: Record,
{
    /// Called after each lifecycle transition with the keys the transition touched.
    async fn on_phase(&self, _operation: Operation, _phase: MutationPhase, _keys: &[CacheKey]) {}

    /// The remote call failed and the cache has been rolled back.
    async fn on_error(&self, _operation: Operation, _record: &R, _message: &str) {}

    async fn on_confirmed(&self, _operation: Operation, _record: &R, _confirmed: &R) {}
}
