use std::time::Duration;

use thiserror::Error;

use crate::batch_function::SourceError;

/// Failure delivered to a [`LoadHandle`](crate::LoadHandle).
///
/// Errors are `Clone` because a single batch-level failure is fanned out to every key that was
/// part of the failed dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The data source failed for the whole batch.
    #[error("batch fetch failed: {0}")]
    Source(SourceError),
    /// The data source reported an error for this particular key.
    #[error("key fetch failed: {0}")]
    Key(SourceError),
    /// The data source broke its positional contract.
    #[error("data source returned {actual} values for {expected} keys")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("batch fetch timed out after {0:?}")]
    Timeout(Duration),
    #[error("data source panicked: {0}")]
    Panicked(String),
    /// The owning loader was aborted or dropped before the value was delivered.
    #[error("load cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("no loader registered under `{0}`")]
    NotFound(String),
    #[error("loader `{name}` is not a {expected}")]
    TypeMismatch { name: String, expected: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VariantError {
    #[error("no concrete type matches discriminant `{discriminant}`")]
    Unmatched { discriminant: String },
    #[error("discriminant `{discriminant}` is mapped more than once")]
    Duplicate { discriminant: String },
}

/// Rejections raised while reading query parameters off a transport request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("Please pass a query on the query string or in the request body")]
    MissingQuery,
    #[error("request body is not a JSON object: {0}")]
    InvalidBody(String),
    #[error("variables must be a JSON object: {0}")]
    InvalidVariables(String),
}

impl RequestError {
    /// HTTP status the transport should answer with.
    pub fn status_code(&self) -> u16 {
        400
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WiringError {
    #[error("process wiring was already initialized")]
    AlreadyInitialized,
    #[error("process wiring has not been initialized")]
    Uninitialized,
}
