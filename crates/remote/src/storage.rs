use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RemoteError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketInfo {
    pub name: String,
    pub public: bool,
}

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub upsert: bool,
    pub cache_control: Option<String>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            upsert: true,
            cache_control: Some("3600".to_string()),
        }
    }
}

/// Object storage collaborator, scoped to named buckets.
#[async_trait]
pub trait StorageApi: Send + Sync {
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>, RemoteError>;

    async fn create_bucket(&self, name: &str, public: bool) -> Result<(), RemoteError>;

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        options: UploadOptions,
    ) -> Result<(), RemoteError>;

    /// Public URL for an object; does not verify the object exists.
    fn public_url(&self, bucket: &str, path: &str) -> String;

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), RemoteError>;
}
