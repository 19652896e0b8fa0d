//! Operation classification and transport routing.

use apollo_compiler::ast::{Definition, Document, OperationType};

/// Kind of a GraphQL operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }

    /// Classify a document.
    ///
    /// With `operation_name` the matching operation is inspected, otherwise
    /// the first operation in the document. Fragments are skipped. Documents
    /// with no recognizable operation classify as queries.
    pub fn of(document: &str, operation_name: Option<&str>) -> Self {
        let parsed = match Document::parse(document, "operation.graphql") {
            Ok(doc) => doc,
            Err(with_errors) => with_errors.partial,
        };

        let mut operations = parsed.definitions.iter().filter_map(|def| match def {
            Definition::OperationDefinition(op) => Some(op),
            _ => None,
        });

        let selected = match operation_name {
            Some(wanted) => operations
                .find(|op| op.name.as_ref().is_some_and(|name| name.as_str() == wanted)),
            None => operations.next(),
        };

        match selected.map(|op| op.operation_type) {
            Some(OperationType::Subscription) => Self::Subscription,
            Some(OperationType::Mutation) => Self::Mutation,
            Some(OperationType::Query) | None => Self::Query,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which transport carries an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Request/response over HTTP POST.
    Http,
    /// Long-lived operation over the shared socket session.
    Socket,
}

impl Route {
    pub fn for_kind(kind: OperationKind) -> Self {
        match kind {
            OperationKind::Subscription => Route::Socket,
            OperationKind::Query | OperationKind::Mutation => Route::Http,
        }
    }
}
