use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    error::{LoadError, RegistryError, VariantError},
    timing::TracingHook,
    worker_stats::LoaderStats,
};

/// One step of the path from the root of the result to a failed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(field: &str) -> Self {
        PathSegment::Field(field.to_owned())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// An entry of the `errors` list of a response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphQLError {
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<PathSegment>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub extensions: Map<String, Value>,
}

/// The failure of a single field. Siblings of the field keep resolving; the error ends up in
/// the response next to whatever data could still be produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub message: String,
    pub classification: &'static str,
}

impl FieldError {
    pub fn new(message: impl Into<String>, classification: &'static str) -> Self {
        Self { message: message.into(), classification }
    }

    /// Places the error at `path` in the result.
    pub fn at<I, P>(self, path: I) -> GraphQLError
    where
        I: IntoIterator<Item = P>,
        P: Into<PathSegment>,
    {
        let mut extensions = Map::new();
        extensions.insert("classification".to_owned(), Value::from(self.classification));
        GraphQLError {
            message: self.message,
            path: path.into_iter().map(Into::into).collect(),
            extensions,
        }
    }
}

impl From<LoadError> for FieldError {
    fn from(err: LoadError) -> Self {
        FieldError::new(err.to_string(), "DataFetchingException")
    }
}

impl From<RegistryError> for FieldError {
    fn from(err: RegistryError) -> Self {
        FieldError::new(err.to_string(), "LoaderNotRegistered")
    }
}

impl From<VariantError> for FieldError {
    fn from(err: VariantError) -> Self {
        FieldError::new(err.to_string(), "UnresolvedVariant")
    }
}

/// Outcome of executing one request: partial data plus every field error.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub extensions: Map<String, Value>,
}

impl ExecutionResult {
    pub fn new(data: Value) -> Self {
        Self { data: Some(data), ..Default::default() }
    }

    pub fn with_errors(mut self, errors: impl IntoIterator<Item = GraphQLError>) -> Self {
        self.errors.extend(errors);
        self
    }

    /// Reports loader counters under `extensions.dataloader`, keyed by loader name.
    pub fn with_statistics(mut self, statistics: impl IntoIterator<Item = LoaderStats>) -> Self {
        let mut by_loader = Map::new();
        for stats in statistics {
            match serde_json::to_value(&stats) {
                Ok(value) => {
                    by_loader.insert(stats.tag.clone(), value);
                }
                Err(e) => tracing::warn!(error = %e, loader = %stats.tag, "unserializable stats"),
            }
        }
        self.extensions.insert("dataloader".to_owned(), Value::Object(by_loader));
        self
    }

    /// Reports per-level timings under `extensions.tracing`.
    pub fn with_tracing(mut self, timings: &TracingHook) -> Self {
        self.extensions.insert("tracing".to_owned(), timings.to_extension());
        self
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// The response body in the shape GraphQL clients expect.
    pub fn to_specification(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to serialize execution result");
            Value::Null
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn partial_result_keeps_data_and_errors() {
        let err = FieldError::from(LoadError::Cancelled)
            .at([PathSegment::from("hero"), PathSegment::Index(1)]);
        let result =
            ExecutionResult::new(json!({ "hero": { "name": "R2-D2" } })).with_errors([err]);

        assert_eq!(
            result.to_specification(),
            json!({
                "data": { "hero": { "name": "R2-D2" } },
                "errors": [{
                    "message": "load cancelled",
                    "path": ["hero", 1],
                    "extensions": { "classification": "DataFetchingException" },
                }],
            })
        );
        assert!(!result.is_success());
    }

    #[test]
    fn statistics_are_keyed_by_loader() {
        let mut stats = LoaderStats::new("characters");
        stats.record_dispatch(2);
        let result = ExecutionResult::new(json!(null)).with_statistics([stats]);

        let body = result.to_specification();
        assert_eq!(body["extensions"]["dataloader"]["characters"]["dispatches"], json!(1));
        assert_eq!(body["extensions"]["dataloader"]["characters"]["maxBatchSize"], json!(2));
    }
}
