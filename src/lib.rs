//! Request-scoped batch loading for GraphQL resolvers.
//!
//! Resolvers ask a [`Loader`] for values by key and get back a [`LoadHandle`]. Nothing is
//! fetched until the host engine finishes a level of the result tree and calls the
//! [`DispatchTrigger`], which flushes every loader of the request: each loader hands all the
//! distinct keys requested during that level to its [`BatchFunction`] in one call and fans the
//! results back out to the waiting handles.
//!
//! All loader state lives in a [`LoaderRegistry`] owned by a [`RequestContext`]. A
//! [`Wiring`] built once per process creates a fresh context for every request, so neither
//! loaders nor cached values ever cross request boundaries.

mod batch_function;
mod cache;
mod context;
mod error;
mod loader;
mod loader_op;
mod loader_worker;
mod options;
mod registry;
pub mod request;
mod response;
mod timing;
mod trigger;
mod variant;
mod wiring;
mod worker_stats;

pub use batch_function::{BatchFunction, BatchResult, SourceError};
pub use context::RequestContext;
pub use error::{LoadError, RegistryError, RequestError, VariantError, WiringError};
pub use loader::{LoadHandle, Loader};
pub use options::LoaderOptions;
pub use registry::LoaderRegistry;
pub use request::QueryParameters;
pub use response::{ExecutionResult, FieldError, GraphQLError, PathSegment};
pub use timing::{LevelTiming, TracingHook};
pub use trigger::{ChainedHook, DispatchTrigger, ExecutionHook};
pub use variant::{Discriminated, VariantResolver};
pub use wiring::Wiring;
pub use worker_stats::LoaderStats;
