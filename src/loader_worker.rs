use std::any::Any;
use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::slice;
use std::time::Duration;

use futures::future::FutureExt;
use tokio::sync::mpsc;

use crate::{
    batch_function::BatchFunction,
    cache::Cache,
    error::LoadError,
    loader_op::{send_response, LoadRequest, LoaderOp, PendingBatch},
    options::LoaderOptions,
    worker_stats::LoaderStats,
};

/// A `LoaderWorker` is the "single-thread" worker task that actually does the loading work.
///
/// Once started, it runs in a loop until the parent Loader aborts its `JoinHandle` or drops the
/// request queue tx channel.
///
/// The worker owns the two pieces of request-scoped state of a loader:
///
/// 1. The pending batch, the distinct keys requested since the last dispatch together with the
///    handles waiting on them, in first-requested order.
/// 2. The cache of settled keys (values and failures) from earlier dispatches.
///
/// Ops are handled one at a time in the order they were sent. A `Load` for a settled key is
/// answered on the spot; any other key joins the pending batch, reusing the key's entry if it
/// is already pending. A `Dispatch` swaps the pending batch for an empty one, calls the
/// `BatchFunction` once with the detached keys, then resolves every waiter and caches the
/// outcome. Ops that arrive while the data source runs stay queued behind the dispatch, so they
/// see its results in the cache or start the next batch.
pub struct LoaderWorker<K, V, F, CacheT>
where
    F: BatchFunction<K, V>,
    CacheT: Cache<K = K, V = Result<V, LoadError>>,
{
    cache: CacheT,
    request_rx: mpsc::UnboundedReceiver<LoaderOp<K, V>>,
    pending: PendingBatch<K, V>,
    context: F::Context,
    options: LoaderOptions,
    stats: LoaderStats,
    phantom_batch_function: PhantomData<fn() -> F>,
}

impl<K, V, F, CacheT> LoaderWorker<K, V, F, CacheT>
where
    K: 'static + Eq + Hash + Clone + Debug + Send + Sync,
    V: 'static + Clone + Debug + Send,
    F: 'static + BatchFunction<K, V>,
    F::Context: Send + Sync + 'static,
    CacheT: Cache<K = K, V = Result<V, LoadError>> + Send + 'static,
{
    pub fn new(
        name: &str,
        cache: CacheT,
        request_rx: mpsc::UnboundedReceiver<LoaderOp<K, V>>,
        context: F::Context,
        options: LoaderOptions,
    ) -> Self {
        Self {
            cache,
            request_rx,
            pending: PendingBatch::default(),
            context,
            options,
            stats: LoaderStats::new(name),
            phantom_batch_function: PhantomData,
        }
    }

    pub async fn start(mut self) {
        while let Some(op) = self.request_rx.recv().await {
            self.mux_op(op).await;
        }
        tracing::debug!("Tx channel closed. Terminating LoaderWorker.");
    }

    async fn mux_op(&mut self, op: LoaderOp<K, V>) {
        match op {
            LoaderOp::Load(request) => self.enqueue(request),
            LoaderOp::Prime(key, value) => self.cache.insert(key, Ok(value)),
            LoaderOp::PrimeMany(key_vals) => {
                self.cache.insert_many(key_vals.into_iter().map(|(k, v)| (k, Ok(v))))
            }
            LoaderOp::Clear(key) => self.cache.remove(slice::from_ref(&key)),
            LoaderOp::ClearMany(keys) => self.cache.remove(&keys),
            LoaderOp::ClearAll => self.cache.flush(),
            LoaderOp::Dispatch(done_tx) => {
                let batch_size = self.dispatch().await;
                if done_tx.send(batch_size).is_err() {
                    tracing::debug!("dispatch caller went away");
                }
            }
            LoaderOp::Stats(stats_tx) => {
                if stats_tx.send(self.stats.clone()).is_err() {
                    tracing::debug!("stats caller went away");
                }
            }
        }
    }

    fn enqueue(&mut self, request: LoadRequest<K, V>) {
        self.stats.record_load_request(request.len());
        let mut cache_hits = 0;
        for (key, responder) in request.into_entries() {
            match self.cache.get(&key) {
                Some(settled) => {
                    cache_hits += 1;
                    send_response(responder, settled.clone());
                }
                None => self.pending.entry(key).or_default().push(responder),
            }
        }
        self.stats.record_cache_hits(cache_hits);
        tracing::trace!(cache_hits, pending = self.pending.len());
    }

    #[tracing::instrument(skip(self), fields(loader = %self.stats.tag))]
    async fn dispatch(&mut self) -> usize {
        if self.pending.is_empty() {
            return 0;
        }
        // Loads that arrive from here on start a new batch.
        let batch = std::mem::take(&mut self.pending);
        let keys = batch.keys().cloned().collect::<Vec<_>>();
        tracing::debug!(?keys, "dispatching batch");
        self.stats.record_dispatch(keys.len());

        let results = Self::execute_load(&keys, &self.context, self.options.dispatch_timeout).await;

        let mut failed = 0;
        for ((key, entry), result) in batch.into_iter().zip(results) {
            if result.is_err() {
                failed += 1;
            }
            entry.resolve(&result);
            self.cache.insert(key, result);
        }
        self.stats.record_failures(failed);
        keys.len()
    }

    /// Runs the batch function and lines its output up with `keys`. Any batch-level failure is
    /// copied to every key.
    async fn execute_load(
        keys: &[K],
        context: &F::Context,
        timeout: Option<Duration>,
    ) -> Vec<Result<V, LoadError>> {
        let fetch = AssertUnwindSafe(F::load(keys, context)).catch_unwind();
        let outcome = match timeout {
            Some(limit) => {
                tokio::time::timeout(limit, fetch).await.map_err(|_| LoadError::Timeout(limit))
            }
            None => Ok(fetch.await),
        };

        let failure = match outcome {
            Ok(Ok(Ok(values))) if values.len() == keys.len() => {
                return values.into_iter().map(|value| value.map_err(LoadError::Key)).collect();
            }
            Ok(Ok(Ok(values))) => {
                LoadError::LengthMismatch { expected: keys.len(), actual: values.len() }
            }
            Ok(Ok(Err(source))) => LoadError::Source(source),
            Ok(Err(panic)) => LoadError::Panicked(panic_message(panic.as_ref())),
            Err(timed_out) => timed_out,
        };
        tracing::warn!(error = %failure, batch_size = keys.len(), "batch fetch failed");
        vec![Err(failure); keys.len()]
    }
}

impl<K, V, F, CacheT> Drop for LoaderWorker<K, V, F, CacheT>
where
    F: BatchFunction<K, V>,
    CacheT: Cache<K = K, V = Result<V, LoadError>>,
{
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            tracing::debug!(abandoned = self.pending.len(), "dropping undispatched keys");
        }
        if !self.cache.is_empty() {
            tracing::debug!(cached = self.cache.len(), "dropping request cache");
        }
        tracing::debug!(worker_stats = ?self.stats);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
