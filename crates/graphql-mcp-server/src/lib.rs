pub mod cache;
pub mod cors;
pub mod errors;
pub mod gateway;
pub mod graphql;
pub mod health;
pub mod introspection;
pub mod json_schema;
pub mod jsonrpc;
pub mod sanitize;
pub mod server;
pub mod summary;
pub mod tools;
pub mod validation;
