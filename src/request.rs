//! Reading GraphQL query parameters off a transport request.
//!
//! Each transport form has exactly one accepted shape for `variables`:
//!
//! * GET: the `variables` query parameter is a JSON-encoded object (already percent-decoded by
//!   the transport).
//! * POST: the body is a JSON object and `variables` is a native JSON object.
//!
//! In both forms an absent or `null` `variables` means no variables. Anything else is rejected
//! rather than reinterpreted.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::RequestError;

pub type Variables = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParameters {
    pub query: String,
    pub operation_name: Option<String>,
    pub variables: Variables,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostBody {
    query: Option<String>,
    operation_name: Option<String>,
    variables: Option<Value>,
}

impl QueryParameters {
    /// Builds parameters from decoded query-string pairs. Unknown parameters are ignored.
    pub fn from_get<I, N, S>(pairs: I) -> Result<Self, RequestError>
    where
        I: IntoIterator<Item = (N, S)>,
        N: AsRef<str>,
        S: Into<String>,
    {
        let (mut query, mut operation_name, mut variables) = (None, None, None);
        for (name, value) in pairs {
            match name.as_ref() {
                "query" => query = Some(value.into()),
                "operationName" => operation_name = Some(value.into()),
                "variables" => variables = Some(value.into()),
                _ => {}
            }
        }

        let variables = match variables.filter(|raw| !raw.trim().is_empty()) {
            Some(raw) => serde_json::from_str::<Value>(&raw)
                .map_err(|e| RequestError::InvalidVariables(e.to_string()))
                .and_then(into_variables)?,
            None => Variables::new(),
        };
        Self::build(query, operation_name, variables)
    }

    /// Builds parameters from a POST body. An empty body reads as `{}`.
    pub fn from_post(body: &[u8]) -> Result<Self, RequestError> {
        let body = if body.iter().all(u8::is_ascii_whitespace) {
            PostBody::default()
        } else {
            serde_json::from_slice::<PostBody>(body)
                .map_err(|e| RequestError::InvalidBody(e.to_string()))?
        };
        let variables = match body.variables {
            Some(value) => into_variables(value)?,
            None => Variables::new(),
        };
        Self::build(body.query, body.operation_name, variables)
    }

    fn build(
        query: Option<String>,
        operation_name: Option<String>,
        variables: Variables,
    ) -> Result<Self, RequestError> {
        let query = query.filter(|q| !q.trim().is_empty()).ok_or(RequestError::MissingQuery)?;
        let operation_name = operation_name.filter(|name| !name.is_empty());
        tracing::debug!(%query, ?operation_name, ?variables, "query parameters");
        Ok(Self { query, operation_name, variables })
    }
}

fn into_variables(value: Value) -> Result<Variables, RequestError> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Variables::new()),
        other => Err(RequestError::InvalidVariables(format!("found {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn get_decodes_json_encoded_variables() {
        let params = QueryParameters::from_get([
            ("query", "query Hero($id: ID!) { human(id: $id) { name } }"),
            ("operationName", "Hero"),
            ("variables", r#"{"id": "1000"}"#),
        ])
        .unwrap();

        assert_eq!(params.operation_name.as_deref(), Some("Hero"));
        assert_eq!(params.variables.get("id"), Some(&json!("1000")));
    }

    #[test]
    fn get_without_query_is_rejected() {
        let err = QueryParameters::from_get([("variables", "{}")]).unwrap_err();
        assert_eq!(err, RequestError::MissingQuery);
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn get_rejects_non_object_variables() {
        let err = QueryParameters::from_get([("query", "{ hero { name } }"), ("variables", "[1]")])
            .unwrap_err();
        assert!(matches!(err, RequestError::InvalidVariables(_)));
    }

    #[test]
    fn post_takes_native_variables() {
        let body = json!({
            "query": "{ hero { name } }",
            "operationName": null,
            "variables": { "episode": "JEDI" },
        });
        let params = QueryParameters::from_post(body.to_string().as_bytes()).unwrap();

        assert_eq!(params.query, "{ hero { name } }");
        assert_eq!(params.operation_name, None);
        assert_eq!(params.variables.get("episode"), Some(&json!("JEDI")));
    }

    #[test]
    fn post_rejects_string_encoded_variables() {
        let body = json!({ "query": "{ hero { name } }", "variables": "{\"a\": 1}" });
        let err = QueryParameters::from_post(body.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, RequestError::InvalidVariables(_)));
    }

    #[test]
    fn empty_post_body_is_a_missing_query() {
        assert_eq!(QueryParameters::from_post(b"").unwrap_err(), RequestError::MissingQuery);
    }

    #[test]
    fn malformed_post_body_is_rejected() {
        let err = QueryParameters::from_post(b"{ not json").unwrap_err();
        assert!(matches!(err, RequestError::InvalidBody(_)));
    }
}
