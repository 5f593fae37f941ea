use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::ops::Drop;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::{mpsc, oneshot};
use tracing_futures::Instrument;

use crate::{
    batch_function::BatchFunction,
    error::LoadError,
    loader_op::{LoadRequest, LoaderOp},
    loader_worker::LoaderWorker,
    options::LoaderOptions,
    worker_stats::LoaderStats,
};

/// Batch loads values from some expensive resource, primarily intended for mitigating GraphQL's
/// N+1 problem.
///
/// A `Loader` lives for one request. Callers use [`Loader::load`] and [`Loader::load_many`] to
/// request values; nothing is fetched until [`Loader::dispatch`] is called, at which point all
/// distinct keys requested since the previous dispatch are handed to the `BatchFunction` in a
/// single call. Every key is fetched at most once for the lifetime of the loader: later loads
/// of the key are answered from the cache, failures included. The cache can be edited with
/// [`Loader::prime`] and [`Loader::clear`] and their `_many` variants.
///
/// The `Loader` struct acts as an intermediary between the async domain in which `load` calls are
/// invoked and the pseudo-single-threaded domain of the `LoaderWorker`. Callers can invoke the
/// `Loader` from multiple parallel tasks, and the loader will enqueue the requested operations on
/// the request queue for processing by its `LoaderWorker`. The worker processes the requests
/// sequentially and provides results via response oneshot channels back to the callers.
pub struct Loader<K, V>
where
    K: 'static + Eq + Hash + Clone + Debug + Send + Sync,
    V: 'static + Clone + Debug + Send,
{
    name: String,
    request_tx: mpsc::UnboundedSender<LoaderOp<K, V>>,
    load_task_handle: tokio::task::JoinHandle<()>,
}

impl<K, V> Drop for Loader<K, V>
where
    K: 'static + Eq + Hash + Clone + Debug + Send + Sync,
    V: 'static + Clone + Debug + Send,
{
    fn drop(&mut self) {
        self.load_task_handle.abort();
    }
}

impl<K, V> Loader<K, V>
where
    K: 'static + Eq + Hash + Clone + Debug + Send + Sync,
    V: 'static + Clone + Debug + Send,
{
    /// Creates a new Loader for the provided BatchFunction and its context.
    ///
    /// Note: the batch function is passed in as a marker for type inference. Must be called from
    /// within a tokio runtime, since the loader spawns its worker task.
    pub fn new<F>(name: impl Into<String>, batch_fn: F, context: F::Context) -> Self
    where
        F: 'static + BatchFunction<K, V>,
        F::Context: Send + Sync + 'static,
    {
        Self::with_options(name, batch_fn, context, LoaderOptions::default())
    }

    pub fn with_options<F>(
        name: impl Into<String>,
        _: F,
        context: F::Context,
        options: LoaderOptions,
    ) -> Self
    where
        F: 'static + BatchFunction<K, V>,
        F::Context: Send + Sync + 'static,
    {
        let name = name.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = LoaderWorker::<K, V, F, HashMap<K, Result<V, LoadError>>>::new(
            &name,
            HashMap::new(),
            rx,
            context,
            options,
        );
        let span = tracing::debug_span!("LoaderWorker", loader = %name);
        Self {
            load_task_handle: tokio::task::spawn(worker.start().instrument(span)),
            request_tx: tx,
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Requests the value for `key`.
    ///
    /// The key is enqueued before this returns, so it is part of the next dispatch. If the key
    /// was already settled by an earlier dispatch the handle completes as soon as the worker
    /// processes the request; otherwise it completes when the batch containing the key is
    /// dispatched. A key that is already pending shares the pending entry.
    pub fn load(&self, key: K) -> LoadHandle<V> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(LoaderOp::Load(LoadRequest::One(key, response_tx)));
        LoadHandle { response_rx }
    }

    /// Requests many values at once, returning one handle per key in input order.
    ///
    /// Equivalent to calling [`Loader::load`] for each key, except that the keys are enqueued
    /// together. Repeated keys resolve to the same value.
    pub fn load_many<I>(&self, keys: I) -> Vec<LoadHandle<V>>
    where
        I: IntoIterator<Item = K>,
    {
        let (entries, handles): (Vec<_>, Vec<_>) = keys
            .into_iter()
            .map(|key| {
                let (response_tx, response_rx) = oneshot::channel();
                ((key, response_tx), LoadHandle { response_rx })
            })
            .unzip();
        self.send(LoaderOp::Load(LoadRequest::Many(entries)));
        handles
    }

    /// Adds a value to the cache.
    pub fn prime(&self, key: K, value: V) {
        self.send(LoaderOp::Prime(key, value));
    }

    /// Adds many values to the cache at once.
    pub fn prime_many(&self, key_vals: Vec<(K, V)>) {
        self.send(LoaderOp::PrimeMany(key_vals));
    }

    /// Removes a value from the cache.
    ///
    /// This key will be reloaded when it is next requested.
    pub fn clear(&self, key: K) {
        self.send(LoaderOp::Clear(key));
    }

    /// Removes multiple values from the cache at once.
    ///
    /// These keys will be reloaded when requested.
    pub fn clear_many(&self, keys: Vec<K>) {
        self.send(LoaderOp::ClearMany(keys));
    }

    /// Empties the cache. Keys that are pending for the next dispatch stay pending.
    pub fn clear_all(&self) {
        self.send(LoaderOp::ClearAll);
    }

    /// Fetches every pending key with one call to the batch function and resolves their
    /// handles. Returns the number of distinct keys fetched; `0` when nothing was pending or the
    /// loader has been aborted.
    pub async fn dispatch(&self) -> usize {
        let (done_tx, done_rx) = oneshot::channel();
        self.send(LoaderOp::Dispatch(done_tx));
        done_rx.await.unwrap_or(0)
    }

    /// Snapshot of this loader's counters, or `None` once the loader has been aborted.
    pub async fn stats(&self) -> Option<LoaderStats> {
        let (stats_tx, stats_rx) = oneshot::channel();
        self.send(LoaderOp::Stats(stats_tx));
        stats_rx.await.ok()
    }

    /// Stops the worker. Outstanding handles resolve to [`LoadError::Cancelled`], and so does
    /// every later load.
    pub fn abort(&self) {
        self.load_task_handle.abort();
    }

    fn send(&self, op: LoaderOp<K, V>) {
        // A failed send drops the op and with it any responder, which the caller then observes
        // as a cancelled load.
        if self.request_tx.send(op).is_err() {
            tracing::debug!(loader = %self.name, "loader worker is gone");
        }
    }
}

/// The eventual outcome of one [`Loader::load`].
#[derive(Debug)]
#[must_use = "a load handle does nothing unless awaited"]
pub struct LoadHandle<V> {
    response_rx: oneshot::Receiver<Result<V, LoadError>>,
}

impl<V> Future for LoadHandle<V> {
    type Output = Result<V, LoadError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.response_rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(LoadError::Cancelled)))
    }
}
