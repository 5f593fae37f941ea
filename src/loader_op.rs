use indexmap::IndexMap;
use tokio::sync::oneshot;

use crate::{error::LoadError, worker_stats::LoaderStats};

/// Sending half of a [`LoadHandle`](crate::LoadHandle).
pub type Responder<V> = oneshot::Sender<Result<V, LoadError>>;

/// Set of possible requests that can be sent to the
/// [`LoaderWorker`](crate::loader_worker::LoaderWorker).
///
/// The worker handles them strictly in the order they were sent, so a `Dispatch` flushes
/// exactly the loads that were sent before it.
#[derive(Debug)]
pub enum LoaderOp<K, V> {
    /// Fetch data from the resource wrapped by this data loader (or the cache).
    Load(LoadRequest<K, V>),
    /// Add values to the cache that were fetched from elsewhere.
    Prime(K, V),
    PrimeMany(Vec<(K, V)>),
    /// Remove values from the cache so that they will be reloaded when they are next requested.
    Clear(K),
    ClearMany(Vec<K>),
    ClearAll,
    /// Flush the pending batch into one data source call. Answers with the batch size once
    /// every waiter of the batch has been resolved.
    Dispatch(oneshot::Sender<usize>),
    Stats(oneshot::Sender<LoaderStats>),
}

#[derive(Debug)]
pub enum LoadRequest<K, V> {
    One(K, Responder<V>),
    Many(Vec<(K, Responder<V>)>),
}

impl<K, V> LoadRequest<K, V> {
    pub fn len(&self) -> usize {
        match self {
            LoadRequest::One(..) => 1,
            LoadRequest::Many(entries) => entries.len(),
        }
    }

    pub fn into_entries(self) -> Vec<(K, Responder<V>)> {
        match self {
            LoadRequest::One(key, responder) => vec![(key, responder)],
            LoadRequest::Many(entries) => entries,
        }
    }
}

/// The waiters for one distinct key of the current batch.
///
/// There is exactly one entry per key per batch; repeated loads of the key add a waiter to
/// the existing entry instead of creating a new one.
#[derive(Debug)]
pub struct PendingEntry<V> {
    waiters: Vec<Responder<V>>,
}

impl<V> Default for PendingEntry<V> {
    fn default() -> Self {
        Self { waiters: Vec::new() }
    }
}

impl<V: Clone> PendingEntry<V> {
    pub fn push(&mut self, responder: Responder<V>) {
        self.waiters.push(responder);
    }

    pub fn resolve(self, result: &Result<V, LoadError>) {
        for responder in self.waiters {
            send_response(responder, result.clone());
        }
    }
}

/// Keys awaiting the next dispatch, in first-requested order.
pub type PendingBatch<K, V> = IndexMap<K, PendingEntry<V>>;

pub fn send_response<V>(responder: Responder<V>, result: Result<V, LoadError>) {
    if responder.send(result).is_err() {
        tracing::debug!("load handle dropped before its value arrived");
    }
}
