use async_trait::async_trait;
use serde_json::Value;

use crate::{error::RemoteError, query::Query};

/// Generic row-level access to the backend's relational tables. Rows travel
/// as JSON objects in the store's snake_case schema; the typed gateway above
/// this boundary owns the translation to client-facing models.
#[async_trait]
pub trait TableApi: Send + Sync {
    async fn select(&self, table: &str, query: Query) -> Result<Vec<Value>, RemoteError>;

    /// Inserts one or more rows and returns their stored representation.
    async fn insert(&self, table: &str, rows: Value) -> Result<Vec<Value>, RemoteError>;

    /// Patches every row matched by the query and returns the updated rows.
    async fn update(&self, table: &str, query: Query, patch: Value)
    -> Result<Vec<Value>, RemoteError>;

    async fn delete(&self, table: &str, query: Query) -> Result<u64, RemoteError>;
}

/// Enforces the exactly-one-row expectation shared by create/update calls.
/// Zero rows is "No data returned", distinct from a remote-reported error.
pub fn expect_single(rows: Vec<Value>) -> Result<Value, RemoteError> {
    rows.into_iter().next().ok_or(RemoteError::NoData)
}
