use std::fmt::Debug;
use std::hash::Hash;
use std::sync::OnceLock;

use crate::{
    batch_function::BatchFunction, context::RequestContext, error::WiringError,
    options::LoaderOptions, registry::LoaderRegistry,
};

type Installer = Box<dyn Fn(&mut LoaderRegistry) + Send + Sync>;

static GLOBAL: OnceLock<Wiring> = OnceLock::new();

/// Process-wide description of which loaders every request gets.
///
/// A `Wiring` is assembled once at startup and is read-only afterwards. Each call to
/// [`Wiring::new_request`] builds a brand new [`LoaderRegistry`] from it, so the data sources
/// (and their shared contexts) are reused across requests while loaders and caches are not.
pub struct Wiring {
    options: LoaderOptions,
    installers: Vec<(String, Installer)>,
}

impl Wiring {
    pub fn new(options: LoaderOptions) -> Self {
        Self { options, installers: Vec::new() }
    }

    /// Gives every request a loader named `name` backed by `batch_fn`. The context is cloned
    /// into each request's loader, so share expensive state through an `Arc`.
    pub fn loader<K, V, F>(
        mut self,
        name: impl Into<String>,
        batch_fn: F,
        context: F::Context,
    ) -> Self
    where
        K: 'static + Eq + Hash + Clone + Debug + Send + Sync,
        V: 'static + Clone + Debug + Send,
        F: 'static + BatchFunction<K, V> + Clone + Send + Sync,
        F::Context: Clone + Send + Sync + 'static,
    {
        let name = name.into();
        let loader_name = name.clone();
        let installer: Installer = Box::new(move |registry: &mut LoaderRegistry| {
            registry.register(loader_name.clone(), batch_fn.clone(), context.clone())
        });
        self.installers.push((name, installer));
        self
    }

    pub fn options(&self) -> LoaderOptions {
        self.options
    }

    pub fn loader_names(&self) -> impl Iterator<Item = &str> {
        self.installers.iter().map(|(name, _)| name.as_str())
    }

    /// Fresh request state with every wired loader registered.
    pub fn new_request(&self) -> RequestContext {
        let mut registry = LoaderRegistry::new(self.options);
        for (_, install) in &self.installers {
            install(&mut registry);
        }
        let context = RequestContext::new(registry);
        tracing::debug!(request_id = %context.request_id(), "request context created");
        context
    }

    /// Installs the process-wide wiring. Only the first call succeeds, even when several
    /// threads race to make it.
    pub fn init_global(wiring: Wiring) -> Result<&'static Wiring, WiringError> {
        GLOBAL.set(wiring).map_err(|_| WiringError::AlreadyInitialized)?;
        Self::global()
    }

    pub fn global() -> Result<&'static Wiring, WiringError> {
        GLOBAL.get().ok_or(WiringError::Uninitialized)
    }
}
