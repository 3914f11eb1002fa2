//! Send GraphQL requests to the upstream endpoint

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use schemars::JsonSchema;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};
use url::Url;

use crate::errors::UpstreamError;
use crate::summary::summarize;

const API_KEY_HEADER: &str = "x-api-key";

/// How the API key is presented to the upstream endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum AuthType {
    /// `Authorization: Bearer <key>`
    #[default]
    #[serde(alias = "bearer", alias = "BEARER")]
    Bearer,

    /// `x-api-key: <key>`
    #[serde(rename = "x-api-key", alias = "api-key", alias = "X-API-KEY")]
    ApiKey,

    /// Send no credentials
    #[serde(alias = "none", alias = "NONE")]
    None,
}

/// Client for the upstream GraphQL endpoint
#[derive(Clone)]
pub struct GraphQLClient {
    endpoint: Url,
    api_key: Option<SecretString>,
    auth_type: AuthType,
    http: reqwest::Client,
}

impl GraphQLClient {
    pub fn new(endpoint: Url, api_key: Option<SecretString>, auth_type: AuthType) -> Self {
        Self {
            endpoint,
            api_key,
            auth_type,
            http: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// POST a query and return the raw response body
    ///
    /// Any non-success HTTP status is an error, regardless of the body.
    pub async fn execute(&self, query: &str, variables: Option<&Value>) -> Result<Value, UpstreamError> {
        let body = json!({
            "query": query,
            "variables": variables.cloned().unwrap_or_else(|| json!({})),
        });

        debug!(endpoint = %self.endpoint, query = %summarize(&json!(query)), "Sending GraphQL request");

        let response = self
            .http
            .post(self.endpoint.clone())
            .headers(self.headers())
            .body(body.to_string())
            .send()
            .await
            .map_err(UpstreamError::Request)?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        response.json::<Value>().await.map_err(UpstreamError::Body)
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("graphql-mcp-server/", env!("CARGO_PKG_VERSION"))),
        );

        let Some(api_key) = &self.api_key else {
            return headers;
        };
        let key = api_key.expose_secret();

        let credential = if self.forces_bearer() || self.auth_type == AuthType::Bearer {
            HeaderValue::from_str(&format!("Bearer {key}")).map(|value| (AUTHORIZATION, value))
        } else if self.auth_type == AuthType::ApiKey {
            HeaderValue::from_str(key).map(|value| (HeaderName::from_static(API_KEY_HEADER), value))
        } else {
            return headers;
        };

        match credential {
            Ok((name, mut value)) => {
                value.set_sensitive(true);
                headers.insert(name, value);
            }
            Err(_) => warn!("API key is not a valid header value; sending no credentials"),
        }
        headers
    }

    /// GitHub only accepts bearer tokens
    fn forces_bearer(&self) -> bool {
        self.endpoint
            .host_str()
            .is_some_and(|host| host == "github.com" || host.ends_with(".github.com"))
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use rstest::rstest;

    use super::*;

    fn client(server: &mockito::Server, api_key: Option<&str>, auth_type: AuthType) -> GraphQLClient {
        GraphQLClient::new(
            Url::parse(&server.url()).unwrap(),
            api_key.map(|key| SecretString::from(key.to_string())),
            auth_type,
        )
    }

    #[tokio::test]
    async fn it_posts_the_query_and_variables() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("content-type", "application/json")
            .match_header(
                "user-agent",
                Matcher::Regex("^graphql-mcp-server/".to_string()),
            )
            .match_body(Matcher::Json(json!({
                "query": "{ hello }",
                "variables": { "a": 1 }
            })))
            .with_status(200)
            .with_body(r#"{"data":{"hello":"world"}}"#)
            .create_async()
            .await;

        let response = client(&server, None, AuthType::Bearer)
            .execute("{ hello }", Some(&json!({ "a": 1 })))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response, json!({ "data": { "hello": "world" } }));
    }

    #[rstest]
    #[case(AuthType::Bearer, "authorization", "Bearer secret")]
    #[case(AuthType::ApiKey, "x-api-key", "secret")]
    #[tokio::test]
    async fn it_presents_the_api_key(
        #[case] auth_type: AuthType,
        #[case] header: &'static str,
        #[case] value: &'static str,
    ) {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header(header, value)
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        client(&server, Some("secret"), auth_type)
            .execute("{ hello }", None)
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn it_omits_credentials_without_a_key_or_auth() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("authorization", Matcher::Missing)
            .match_header("x-api-key", Matcher::Missing)
            .with_status(200)
            .with_body("{}")
            .expect(2)
            .create_async()
            .await;

        client(&server, None, AuthType::ApiKey)
            .execute("{ hello }", None)
            .await
            .unwrap();
        client(&server, Some("secret"), AuthType::None)
            .execute("{ hello }", None)
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn it_fails_on_error_statuses() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(401)
            .with_body(r#"{"data":{"hello":"world"}}"#)
            .create_async()
            .await;

        let error = client(&server, None, AuthType::Bearer)
            .execute("{ hello }", None)
            .await
            .unwrap_err();

        assert_eq!(error.to_string(), "GraphQL Error: 401 Unauthorized");
    }

    #[rstest]
    #[case("https://api.github.com/graphql", true)]
    #[case("https://github.com/graphql", true)]
    #[case("https://notgithub.com/graphql", false)]
    #[case("https://example.com/github.com", false)]
    fn it_forces_bearer_for_github(#[case] endpoint: &str, #[case] expected: bool) {
        let client = GraphQLClient::new(Url::parse(endpoint).unwrap(), None, AuthType::None);

        assert_eq!(client.forces_bearer(), expected);
    }

    #[test]
    fn it_deserializes_auth_types() {
        let parse = |text: &str| serde_json::from_value::<AuthType>(json!(text)).unwrap();

        assert_eq!(parse("Bearer"), AuthType::Bearer);
        assert_eq!(parse("x-api-key"), AuthType::ApiKey);
        assert_eq!(parse("none"), AuthType::None);
    }
}
