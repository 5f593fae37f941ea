use std::any::Any;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::future;
use indexmap::IndexMap;

use crate::{
    batch_function::BatchFunction, error::RegistryError, loader::Loader, options::LoaderOptions,
    worker_stats::LoaderStats,
};

/// Type-erased view of a [`Loader`] used to dispatch loaders of different key and value types
/// side by side.
#[async_trait]
trait RegisteredLoader: Send + Sync {
    async fn dispatch(&self) -> usize;
    async fn stats(&self) -> Option<LoaderStats>;
    fn abort(&self);
    fn as_any(&self) -> &dyn Any;
}

#[async_trait]
impl<K, V> RegisteredLoader for Loader<K, V>
where
    K: 'static + Eq + Hash + Clone + Debug + Send + Sync,
    V: 'static + Clone + Debug + Send,
{
    async fn dispatch(&self) -> usize {
        Loader::dispatch(self).await
    }

    async fn stats(&self) -> Option<LoaderStats> {
        Loader::stats(self).await
    }

    fn abort(&self) {
        Loader::abort(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The loaders of one request, by name.
///
/// A registry is built when a request starts and dropped when its response is produced; dropping
/// it stops every loader it holds. Nothing in it is shared with another registry.
#[derive(Default)]
pub struct LoaderRegistry {
    options: LoaderOptions,
    loaders: IndexMap<String, Box<dyn RegisteredLoader>>,
    cancelled: AtomicBool,
}

impl LoaderRegistry {
    /// Creates an empty registry whose [`LoaderRegistry::register`]ed loaders use `options`.
    pub fn new(options: LoaderOptions) -> Self {
        Self { options, ..Default::default() }
    }

    /// Installs a fresh loader for `batch_fn` under `name`, replacing any loader already
    /// registered under that name.
    pub fn register<K, V, F>(&mut self, name: impl Into<String>, batch_fn: F, context: F::Context)
    where
        K: 'static + Eq + Hash + Clone + Debug + Send + Sync,
        V: 'static + Clone + Debug + Send,
        F: 'static + BatchFunction<K, V>,
        F::Context: Send + Sync + 'static,
    {
        let loader = Loader::with_options(name, batch_fn, context, self.options);
        self.insert(loader);
    }

    /// Adds an already constructed loader under its own name.
    pub fn insert<K, V>(&mut self, loader: Loader<K, V>)
    where
        K: 'static + Eq + Hash + Clone + Debug + Send + Sync,
        V: 'static + Clone + Debug + Send,
    {
        let name = loader.name().to_owned();
        if self.loaders.insert(name.clone(), Box::new(loader)).is_some() {
            tracing::warn!(loader = %name, "replaced a registered loader");
        }
    }

    /// Looks up the loader registered under `name`.
    pub fn get<K, V>(&self, name: &str) -> Result<&Loader<K, V>, RegistryError>
    where
        K: 'static + Eq + Hash + Clone + Debug + Send + Sync,
        V: 'static + Clone + Debug + Send,
    {
        let loader =
            self.loaders.get(name).ok_or_else(|| RegistryError::NotFound(name.to_owned()))?;
        loader.as_any().downcast_ref::<Loader<K, V>>().ok_or_else(|| {
            RegistryError::TypeMismatch {
                name: name.to_owned(),
                expected: std::any::type_name::<Loader<K, V>>(),
            }
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.loaders.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }

    /// Dispatches every registered loader once, concurrently, and waits until all of them have
    /// resolved their batches. Returns the total number of keys fetched.
    ///
    /// Does nothing once the registry has been cancelled.
    pub async fn dispatch_all(&self) -> usize {
        if self.is_cancelled() {
            return 0;
        }
        future::join_all(self.loaders.values().map(|loader| loader.dispatch()))
            .await
            .into_iter()
            .sum()
    }

    /// Abandons the request: every loader is stopped, pending handles resolve to
    /// [`LoadError::Cancelled`](crate::LoadError::Cancelled) and later dispatches are no-ops.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            tracing::debug!(loaders = self.loaders.len(), "cancelling loader registry");
            for loader in self.loaders.values() {
                loader.abort();
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Per-loader counters in registration order. Aborted loaders are left out.
    pub async fn statistics(&self) -> Vec<LoaderStats> {
        future::join_all(self.loaders.values().map(|loader| loader.stats()))
            .await
            .into_iter()
            .flatten()
            .collect()
    }
}
