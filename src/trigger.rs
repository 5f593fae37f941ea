use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::registry::LoaderRegistry;

/// Callbacks a host execution engine invokes while it walks a result tree.
#[async_trait]
pub trait ExecutionHook: Send + Sync {
    /// Called after every field of result-tree level `level` has been resolved (or has
    /// returned a pending handle), and before any field of the next level runs.
    async fn on_level_complete(&self, level: usize);

    async fn on_execution_complete(&self) {}
}

/// Forwards every callback to each of its hooks in turn, in the order they were added.
///
/// Lets the [`DispatchTrigger`] run next to other hooks, such as a
/// [`TracingHook`](crate::TracingHook), for the same execution.
#[derive(Default)]
pub struct ChainedHook<'h> {
    hooks: Vec<&'h dyn ExecutionHook>,
}

impl<'h> ChainedHook<'h> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, hook: &'h dyn ExecutionHook) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

#[async_trait]
impl<'h> ExecutionHook for ChainedHook<'h> {
    async fn on_level_complete(&self, level: usize) {
        for hook in &self.hooks {
            hook.on_level_complete(level).await;
        }
    }

    async fn on_execution_complete(&self) {
        for hook in &self.hooks {
            hook.on_execution_complete().await;
        }
    }
}

/// Flushes every loader of a request once per completed level.
///
/// Deferred loads issued while resolving a level are fetched together when the level completes,
/// turning one fetch per field into one fetch per loader per level.
pub struct DispatchTrigger<'r> {
    registry: &'r LoaderRegistry,
    levels: AtomicUsize,
    keys_dispatched: AtomicUsize,
}

impl<'r> DispatchTrigger<'r> {
    pub fn new(registry: &'r LoaderRegistry) -> Self {
        Self { registry, levels: AtomicUsize::new(0), keys_dispatched: AtomicUsize::new(0) }
    }

    /// Dispatches all registered loaders and waits until their handles are resolved.
    pub async fn flush(&self, level: usize) -> usize {
        let keys = self.registry.dispatch_all().await;
        self.levels.fetch_add(1, Ordering::Relaxed);
        self.keys_dispatched.fetch_add(keys, Ordering::Relaxed);
        tracing::debug!(level, keys, loaders = self.registry.len(), "level dispatched");
        keys
    }

    /// Number of levels flushed so far.
    pub fn levels(&self) -> usize {
        self.levels.load(Ordering::Relaxed)
    }

    pub fn keys_dispatched(&self) -> usize {
        self.keys_dispatched.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<'r> ExecutionHook for DispatchTrigger<'r> {
    async fn on_level_complete(&self, level: usize) {
        self.flush(level).await;
    }

    async fn on_execution_complete(&self) {
        tracing::debug!(
            levels = self.levels(),
            keys = self.keys_dispatched(),
            "execution complete"
        );
    }
}
