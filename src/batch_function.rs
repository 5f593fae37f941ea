use async_trait::async_trait;
use thiserror::Error;

/// Error reported by a data source, either for a whole batch or for a single key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SourceError(pub String);

impl SourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Output of a [`BatchFunction`]: one entry per key, in the order the keys were given.
///
/// The outer error fails every key of the batch; an inner error fails only its key.
pub type BatchResult<V> = Result<Vec<Result<V, SourceError>>, SourceError>;

/// A `BatchFunction` defines the method through which some `Loader` may fetch
/// batched data from some resource. The `BatchFunction` receives the distinct keys
/// that were pending when the `Loader` was last dispatched, in the order they were first
/// requested, and some user defined context struct.
///
/// Like the reference facebook dataloader implementation, the returned values must line up
/// positionally with the keys: `values[i]` belongs to `keys[i]` and `values.len() == keys.len()`.
/// A result of the wrong length fails every key of the batch with
/// [`LoadError::LengthMismatch`](crate::LoadError::LengthMismatch).
///
/// The context is usually shared between requests (likely through an `Arc`), so
/// implementations must tolerate concurrent calls with disjoint key sets.
#[async_trait]
pub trait BatchFunction<K, V> {
    type Context;
    async fn load(keys: &[K], context: &Self::Context) -> BatchResult<V>;
}
