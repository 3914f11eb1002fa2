//! Guard the upstream GraphQL endpoint against malformed, unsafe or invalid queries

use apollo_compiler::{
    Schema,
    ast::{Definition, Document, OperationType, Selection},
    parser::Parser,
    validation::{DiagnosticList, Valid},
};
use serde_json::Value;

use crate::errors::QueryError;

/// The deepest selection nesting a query may have
pub const MAX_QUERY_DEPTH: usize = 15;

const INVALID_CHARACTER_HINT: &str = "\n\nInterpretation:\n\
    This indicates a malformed query structure containing an invalid character \
    (often Unicode or hidden symbols).\n\n\
    How to fix:\n\
    1. Remove any non-ASCII characters or hidden symbols.\n\
    2. Verify the query contains only valid GraphQL operators and ASCII characters.\n\
    3. Ensure proper encoding of special characters.";

const GENERAL_SYNTAX_HINT: &str = "\n\nHow to fix:\n\
    1. Check for missing braces or parentheses.\n\
    2. Ensure field names are correct.";

/// A query that passed every validation stage
#[derive(Debug, Clone)]
pub struct ParsedQuery {
    pub query: String,
    pub document: Document,
}

/// Validates queries before they are sent upstream
#[derive(Debug, Clone, Copy)]
pub struct QueryValidator {
    read_only: bool,
}

impl QueryValidator {
    pub fn new(read_only: bool) -> Self {
        Self { read_only }
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// Run every validation stage in order, stopping at the first failure
    ///
    /// Schema conformance is only checked when a schema is supplied.
    pub fn validate(
        &self,
        query: &Value,
        variables: Option<&Value>,
        schema: Option<&Valid<Schema>>,
    ) -> Result<ParsedQuery, QueryError> {
        let query = match query {
            Value::String(query) if !query.is_empty() => query,
            _ => {
                return Err(QueryError::InvalidInput(
                    "Invalid query: query must be a string.".to_string(),
                ));
            }
        };
        if matches!(variables, Some(variables) if !variables.is_null() && !variables.is_object()) {
            return Err(QueryError::InvalidInput(
                "Invalid variables: variables must be an object.".to_string(),
            ));
        }

        let document = Parser::new()
            .parse_ast(query.as_str(), "query.graphql")
            .map_err(|with_errors| syntax_error(&with_errors.errors))?;

        if self.read_only && has_mutation(&document) {
            return Err(QueryError::ReadOnlyViolation);
        }

        let depth = query_depth(&document);
        if depth > MAX_QUERY_DEPTH {
            return Err(QueryError::DepthExceeded {
                depth,
                limit: MAX_QUERY_DEPTH,
            });
        }

        if let Some(schema) = schema {
            document
                .to_executable_validate(schema)
                .map_err(|with_errors| {
                    QueryError::SchemaValidation(
                        with_errors
                            .errors
                            .iter()
                            .map(|diagnostic| diagnostic.error.to_string())
                            .collect(),
                    )
                })?;
        }

        Ok(ParsedQuery {
            query: query.clone(),
            document,
        })
    }
}

fn syntax_error(errors: &DiagnosticList) -> QueryError {
    let messages: Vec<String> = errors
        .iter()
        .map(|diagnostic| diagnostic.error.to_string())
        .collect();
    let hint = if messages.iter().any(|message| mentions_invalid_character(message)) {
        INVALID_CHARACTER_HINT
    } else {
        GENERAL_SYNTAX_HINT
    };

    QueryError::Syntax {
        message: messages.join("; "),
        hint: hint.to_string(),
    }
}

fn mentions_invalid_character(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("unexpected character") || message.contains("invalid character")
}

fn has_mutation(document: &Document) -> bool {
    document.definitions.iter().any(|definition| {
        matches!(
            definition,
            Definition::OperationDefinition(operation)
                if operation.operation_type == OperationType::Mutation
        )
    })
}

/// The maximum field nesting of any operation or fragment in the document
///
/// Leaf fields count as one level. Fragment spreads are not resolved and
/// inline fragments add no level of their own.
pub fn query_depth(document: &Document) -> usize {
    document
        .definitions
        .iter()
        .filter_map(|definition| match definition {
            Definition::OperationDefinition(operation) => Some(&operation.selection_set),
            Definition::FragmentDefinition(fragment) => Some(&fragment.selection_set),
            _ => None,
        })
        .map(|selection_set| selection_depth(selection_set, 0))
        .max()
        .unwrap_or(0)
}

fn selection_depth(selections: &[Selection], depth: usize) -> usize {
    selections
        .iter()
        .map(|selection| match selection {
            Selection::Field(field) if field.selection_set.is_empty() => depth + 1,
            Selection::Field(field) => selection_depth(&field.selection_set, depth + 1),
            Selection::InlineFragment(fragment) => selection_depth(&fragment.selection_set, depth),
            Selection::FragmentSpread(_) => depth,
        })
        .fold(depth, usize::max)
}
