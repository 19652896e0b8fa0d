//! GraphQL response types.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A GraphQL execution result: `{ data, errors, extensions }`.
///
/// Partial results are legal: `data` and `errors` may both be present.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GraphQLResponse<T = Value> {
    /// The data returned by the operation.
    #[serde(default)]
    pub data: Option<T>,
    /// Errors returned by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<GraphQLResponseError>>,
    /// Extensions (tracing, cost, etc.).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl<T> Default for GraphQLResponse<T> {
    fn default() -> Self {
        Self {
            data: None,
            errors: None,
            extensions: None,
        }
    }
}

impl<T> GraphQLResponse<T> {
    /// A response carrying only data.
    pub fn from_data(data: T) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    /// A response carrying only errors.
    pub fn from_errors(errors: Vec<GraphQLResponseError>) -> Self {
        Self {
            errors: Some(errors),
            ..Self::default()
        }
    }

    /// Check if the response has errors.
    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|e| !e.is_empty())
    }

    /// Get the data, returning an error if there are GraphQL errors.
    pub fn into_result(self) -> crate::Result<T> {
        if let Some(errors) = self.errors
            && !errors.is_empty()
        {
            return Err(crate::GraphQLError::GraphQL(errors));
        }
        self.data
            .ok_or_else(|| crate::GraphQLError::Parse("Response contained no data".to_string()))
    }

    /// Split into data and (non-empty) errors without discarding either.
    pub fn into_parts(self) -> (Option<T>, Option<Vec<GraphQLResponseError>>) {
        let errors = self.errors.filter(|e| !e.is_empty());
        (self.data, errors)
    }

    /// Get the errors.
    pub fn errors(&self) -> Option<&[GraphQLResponseError]> {
        self.errors.as_deref()
    }
}

impl GraphQLResponse<Value> {
    /// Deserialize `data` into a typed payload, keeping errors and extensions.
    pub fn decode<T: DeserializeOwned>(self) -> crate::Result<GraphQLResponse<T>> {
        let data = match self.data {
            Some(Value::Null) | None => None,
            Some(value) => Some(
                serde_json::from_value(value)
                    .map_err(|e| crate::GraphQLError::Parse(e.to_string()))?,
            ),
        };
        Ok(GraphQLResponse {
            data,
            errors: self.errors,
            extensions: self.extensions,
        })
    }
}

/// A GraphQL error from the server.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GraphQLResponseError {
    /// Error message.
    pub message: String,
    /// Locations in the query where the error occurred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<ErrorLocation>>,
    /// Path to the field that caused the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathSegment>>,
    /// Additional error extensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl GraphQLResponseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: None,
            path: None,
            extensions: None,
        }
    }

    /// Dotted path, e.g. `restaurant.orders[0].id`.
    pub fn path_string(&self) -> Option<String> {
        self.path.as_deref().map(format_path)
    }

    /// `line:column` pairs joined by commas.
    pub fn locations_string(&self) -> Option<String> {
        self.locations.as_ref().map(|locations| {
            locations
                .iter()
                .map(|loc| format!("{}:{}", loc.line, loc.column))
                .collect::<Vec<_>>()
                .join(", ")
        })
    }
}

impl std::fmt::Display for GraphQLResponseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(path) = self.path_string() {
            write!(f, " (path: {})", path)?;
        }
        if let Some(locations) = self.locations_string()
            && !locations.is_empty()
        {
            write!(f, " at {}", locations)?;
        }
        Ok(())
    }
}

/// Location in the GraphQL document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ErrorLocation {
    /// Line number (1-indexed).
    pub line: u32,
    /// Column number (1-indexed).
    pub column: u32,
}

/// Path segment in a GraphQL error.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Field name.
    Field(String),
    /// List index.
    Index(usize),
}

/// Format a path as a string; indices attach to the preceding field.
pub fn format_path(path: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in path {
        match segment {
            PathSegment::Field(name) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(name);
            }
            PathSegment::Index(idx) => out.push_str(&format!("[{}]", idx)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_partial_response_keeps_both_parts() {
        let response: GraphQLResponse = serde_json::from_value(json!({
            "data": { "restaurants": [{ "_id": "1" }], "vendors": null },
            "errors": [{ "message": "vendors unavailable", "path": ["vendors"] }]
        }))
        .unwrap();

        assert!(response.has_errors());
        let (data, errors) = response.into_parts();
        assert_eq!(data.unwrap()["restaurants"][0]["_id"], "1");
        assert_eq!(errors.unwrap()[0].message, "vendors unavailable");
    }

    #[test]
    fn test_empty_errors_array_is_not_an_error() {
        let response: GraphQLResponse = serde_json::from_value(json!({
            "data": { "ok": true },
            "errors": []
        }))
        .unwrap();

        assert!(!response.has_errors());
        assert_eq!(response.into_result().unwrap()["ok"], true);
    }

    #[test]
    fn test_format_path() {
        let path = vec![
            PathSegment::Field("restaurant".to_string()),
            PathSegment::Field("orders".to_string()),
            PathSegment::Index(0),
            PathSegment::Field("id".to_string()),
        ];
        assert_eq!(format_path(&path), "restaurant.orders[0].id");
    }

    #[test]
    fn test_error_display() {
        let error: GraphQLResponseError = serde_json::from_value(json!({
            "message": "Not authorized",
            "path": ["orders", 2],
            "locations": [{ "line": 3, "column": 5 }]
        }))
        .unwrap();

        assert_eq!(error.to_string(), "Not authorized (path: orders[2]) at 3:5");
    }

    #[test]
    fn test_decode_typed() {
        #[derive(Debug, Deserialize)]
        struct Coupon {
            title: String,
        }

        let response = GraphQLResponse::from_data(json!({ "title": "WELCOME10" }));
        let typed: GraphQLResponse<Coupon> = response.decode().unwrap();
        assert_eq!(typed.data.unwrap().title, "WELCOME10");
    }
}
