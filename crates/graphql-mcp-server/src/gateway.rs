//! The execution path shared by every MCP handler
//!
//! Schema lookups go through the [`SchemaCache`], queries are checked by the
//! [`QueryValidator`] before anything is sent upstream, and every upstream
//! response is sanitized before it is handed back.

use std::sync::Arc;

use apollo_compiler::{Schema, validation::Valid};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::{
    cache::{CachedValue, SchemaCache},
    errors::GatewayError,
    graphql::GraphQLClient,
    introspection::{INTROSPECTION_QUERY, build_client_schema},
    sanitize::sanitize_response,
    summary::summarize,
    validation::QueryValidator,
};

/// Cache key for the schema used to validate queries
pub const PARSED_SCHEMA_KEY: &str = "parsed_schema";

/// Cache key for the SDL served as the schema resource
pub const SCHEMA_SDL_KEY: &str = "schema_sdl";

/// Immutable state shared by every session and stateless request
#[derive(Clone)]
pub struct Gateway {
    client: GraphQLClient,
    cache: Arc<SchemaCache>,
    validator: QueryValidator,
}

impl Gateway {
    pub fn new(client: GraphQLClient, cache: Arc<SchemaCache>, validator: QueryValidator) -> Self {
        Self {
            client,
            cache,
            validator,
        }
    }

    pub fn cache(&self) -> &Arc<SchemaCache> {
        &self.cache
    }

    /// Run the introspection query upstream and return the sanitized result
    ///
    /// Introspection is trusted and skips query validation.
    pub async fn introspect(&self) -> Result<Value, GatewayError> {
        let response = self.client.execute(INTROSPECTION_QUERY, None).await?;
        Ok(unwrap_data(sanitize_response(response)))
    }

    /// The schema queries are validated against
    pub async fn schema(&self) -> Result<Arc<Valid<Schema>>, GatewayError> {
        let cached = self
            .cache
            .get_or_fetch(PARSED_SCHEMA_KEY, || async move {
                let schema = build_client_schema(&self.introspection_data().await?)?;
                Ok::<_, GatewayError>(CachedValue::Schema(Arc::new(schema)))
            })
            .await?;

        match cached {
            CachedValue::Schema(schema) => Ok(schema),
            CachedValue::Text(sdl) => Schema::parse_and_validate(sdl, "schema.graphql")
                .map(Arc::new)
                .map_err(|errors| GatewayError::CachedSchema(Box::new(errors))),
            CachedValue::Json(introspection) => Ok(Arc::new(build_client_schema(&introspection)?)),
        }
    }

    /// The schema printed as SDL, derived from [`Gateway::schema`] on a miss
    pub async fn schema_sdl(&self) -> Result<String, GatewayError> {
        let cached = self
            .cache
            .get_or_fetch(SCHEMA_SDL_KEY, || async move {
                Ok::<_, GatewayError>(CachedValue::Text(self.schema().await?.to_string()))
            })
            .await?;

        match cached {
            CachedValue::Text(sdl) => Ok(sdl),
            CachedValue::Schema(schema) => Ok(schema.to_string()),
            CachedValue::Json(introspection) => Ok(build_client_schema(&introspection)?.to_string()),
        }
    }

    /// Validate a query, send it upstream and sanitize the response
    ///
    /// When the schema cannot be fetched the query is still checked for
    /// syntax, write mode and depth.
    pub async fn execute(&self, query: &Value, variables: Option<&Value>) -> Result<Value, GatewayError> {
        let schema = match self.schema().await {
            Ok(schema) => Some(schema),
            Err(error) => {
                warn!("Schema unavailable, validating without it: {error}");
                None
            }
        };

        let parsed = self
            .validator
            .validate(query, variables, schema.as_deref())?;
        let variables = variables.filter(|variables| !variables.is_null());

        let response = self.client.execute(&parsed.query, variables).await?;
        let sanitized = sanitize_response(response);
        debug!(response = %summarize(&sanitized), "GraphQL response");

        Ok(unwrap_data(sanitized))
    }

    async fn introspection_data(&self) -> Result<Value, GatewayError> {
        let response = sanitize_response(self.client.execute(INTROSPECTION_QUERY, None).await?);
        match response.get("data") {
            Some(data) if !data.is_null() => Ok(data.clone()),
            _ => Err(GatewayError::MissingData),
        }
    }
}

/// Reduce a successful response to its `data`
///
/// Responses with errors are returned whole so partial failures stay visible.
fn unwrap_data(response: Value) -> Value {
    let has_errors = response
        .get("errors")
        .is_some_and(|errors| !errors.is_null());
    match response.get("data") {
        Some(data) if !data.is_null() && !has_errors => data.clone(),
        Some(_) | None => {
            if response.is_object() {
                response
            } else {
                json!({ "data": response })
            }
        }
    }
}
