use std::fmt::Debug;
use std::hash::Hash;

use uuid::Uuid;

use crate::{
    error::RegistryError, loader::Loader, registry::LoaderRegistry, trigger::DispatchTrigger,
};

/// State owned by a single request and handed to every resolver it runs.
///
/// The context is built when the request arrives and dropped once its response is produced,
/// which stops the request's loaders.
pub struct RequestContext {
    request_id: Uuid,
    registry: LoaderRegistry,
}

impl RequestContext {
    pub fn new(registry: LoaderRegistry) -> Self {
        Self { request_id: Uuid::new_v4(), registry }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn registry(&self) -> &LoaderRegistry {
        &self.registry
    }

    /// Typed access to the loader registered under `name`.
    pub fn loader<K, V>(&self, name: &str) -> Result<&Loader<K, V>, RegistryError>
    where
        K: 'static + Eq + Hash + Clone + Debug + Send + Sync,
        V: 'static + Clone + Debug + Send,
    {
        self.registry.get(name)
    }

    /// The hook the execution engine calls after each resolved level.
    pub fn dispatch_trigger(&self) -> DispatchTrigger<'_> {
        DispatchTrigger::new(&self.registry)
    }

    /// Abandons the request; see [`LoaderRegistry::cancel`].
    pub fn cancel(&self) {
        self.registry.cancel();
    }
}
