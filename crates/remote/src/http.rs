//! HTTP binding for the hosted backend: PostgREST-style table endpoints,
//! GoTrue-style auth endpoints and the storage object API, all sharing one
//! `reqwest` client and the project's public API key.

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::{
    auth::{AuthApi, AuthSession, AuthUser, Credentials, UserPatch},
    error::RemoteError,
    query::{Filter, Query, SortDirection},
    storage::{BucketInfo, StorageApi, UploadOptions},
    table::TableApi,
};

#[derive(Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: Url,
    api_key: SecretString,
}

#[derive(Debug, Deserialize)]
struct WireError {
    #[serde(alias = "error_description", alias = "msg")]
    message: Option<String>,
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: Uuid,
    email: Option<String>,
    #[serde(default)]
    user_metadata: Value,
    #[serde(default)]
    app_metadata: Value,
    created_at: DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
struct WireTokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    user: WireUser,
}

impl From<WireUser> for AuthUser {
    fn from(user: WireUser) -> Self {
        AuthUser {
            id: user.id,
            email: user.email.unwrap_or_default(),
            user_metadata: user.user_metadata,
            app_metadata: user.app_metadata,
            created_at: user.created_at,
        }
    }
}

impl From<WireTokenResponse> for AuthSession {
    fn from(token: WireTokenResponse) -> Self {
        AuthSession {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token
                .expires_at
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
            user: token.user.into(),
        }
    }
}

impl HttpRemote {
    pub fn new(base_url: &str, api_key: SecretString) -> Result<Self, RemoteError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| RemoteError::api(format!("invalid backend url: {e}")))?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
        self.base_url
            .join(path)
            .map_err(|e| RemoteError::api(format!("invalid endpoint path {path}: {e}")))
    }

    fn request(&self, method: Method, url: Url, token: Option<&str>) -> RequestBuilder {
        let key = self.api_key.expose_secret();
        self.client
            .request(method, url)
            .header("apikey", key)
            .bearer_auth(token.unwrap_or(key))
    }

    fn query_pairs(query: &Query) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for filter in &query.filters {
            match filter {
                Filter::Eq(column, value) => {
                    pairs.push((column.clone(), format!("eq.{}", scalar(value))));
                }
                Filter::In(column, values) => {
                    let list = values.iter().map(scalar).collect::<Vec<_>>().join(",");
                    pairs.push((column.clone(), format!("in.({list})")));
                }
                Filter::Gt(column, value) => {
                    pairs.push((column.clone(), format!("gt.{}", scalar(value))));
                }
                Filter::Gte(column, value) => {
                    pairs.push((column.clone(), format!("gte.{}", scalar(value))));
                }
            }
        }
        if let Some((column, direction)) = &query.order_by {
            let dir = match direction {
                SortDirection::Ascending => "asc",
                SortDirection::Descending => "desc",
            };
            pairs.push(("order".to_string(), format!("{column}.{dir}")));
        }
        if query.single {
            pairs.push(("limit".to_string(), "1".to_string()));
        }
        pairs
    }

    async fn decode_rows(response: reqwest::Response) -> Result<Vec<Value>, RemoteError> {
        let response = check(response).await?;
        let body: Value = response.json().await?;
        match body {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            other => Ok(vec![other]),
        }
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let wire: WireError = serde_json::from_str(&body).unwrap_or(WireError {
        message: None,
        code: None,
    });
    debug!(%status, body = %body, "remote call failed");
    Err(RemoteError::Api {
        code: wire.code,
        message: wire
            .message
            .unwrap_or_else(|| format!("remote returned {status}")),
    })
}

#[async_trait]
impl TableApi for HttpRemote {
    async fn select(&self, table: &str, query: Query) -> Result<Vec<Value>, RemoteError> {
        let url = self.endpoint(&format!("rest/v1/{table}"))?;
        let mut request = self
            .request(Method::GET, url, None)
            .query(&Self::query_pairs(&query));
        if let Some((from, to)) = query.range {
            request = request.header("Range", format!("{from}-{to}"));
        }
        if query.count {
            request = request.header("Prefer", "count=exact");
        }
        Self::decode_rows(request.send().await?).await
    }

    async fn insert(&self, table: &str, rows: Value) -> Result<Vec<Value>, RemoteError> {
        let url = self.endpoint(&format!("rest/v1/{table}"))?;
        let request = self
            .request(Method::POST, url, None)
            .header("Prefer", "return=representation")
            .json(&rows);
        Self::decode_rows(request.send().await?).await
    }

    async fn update(
        &self,
        table: &str,
        query: Query,
        patch: Value,
    ) -> Result<Vec<Value>, RemoteError> {
        let url = self.endpoint(&format!("rest/v1/{table}"))?;
        let request = self
            .request(Method::PATCH, url, None)
            .query(&Self::query_pairs(&query))
            .header("Prefer", "return=representation")
            .json(&patch);
        Self::decode_rows(request.send().await?).await
    }

    async fn delete(&self, table: &str, query: Query) -> Result<u64, RemoteError> {
        let url = self.endpoint(&format!("rest/v1/{table}"))?;
        let request = self
            .request(Method::DELETE, url, None)
            .query(&Self::query_pairs(&query))
            .header("Prefer", "return=representation");
        let rows = Self::decode_rows(request.send().await?).await?;
        Ok(rows.len() as u64)
    }
}

#[async_trait]
impl AuthApi for HttpRemote {
    async fn sign_in_with_password(
        &self,
        credentials: Credentials,
    ) -> Result<AuthSession, RemoteError> {
        let url = self.endpoint("auth/v1/token?grant_type=password")?;
        let response = self
            .request(Method::POST, url, None)
            .json(&credentials)
            .send()
            .await?;
        let token: WireTokenResponse = check(response).await?.json().await?;
        Ok(token.into())
    }

    async fn sign_up(&self, credentials: Credentials) -> Result<AuthSession, RemoteError> {
        let url = self.endpoint("auth/v1/signup")?;
        let response = self
            .request(Method::POST, url, None)
            .json(&credentials)
            .send()
            .await?;
        let token: WireTokenResponse = check(response).await?.json().await?;
        Ok(token.into())
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), RemoteError> {
        let url = self.endpoint("auth/v1/logout")?;
        check(
            self.request(Method::POST, url, Some(access_token))
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }

    async fn get_session(&self, access_token: &str) -> Result<Option<AuthSession>, RemoteError> {
        let url = self.endpoint("auth/v1/user")?;
        let response = self
            .request(Method::GET, url, Some(access_token))
            .send()
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        let user: WireUser = check(response).await?.json().await?;
        Ok(Some(AuthSession {
            access_token: access_token.to_string(),
            refresh_token: None,
            expires_at: None,
            user: user.into(),
        }))
    }

    async fn update_user(
        &self,
        access_token: &str,
        patch: UserPatch,
    ) -> Result<AuthUser, RemoteError> {
        let url = self.endpoint("auth/v1/user")?;
        let response = self
            .request(Method::PUT, url, Some(access_token))
            .json(&patch)
            .send()
            .await?;
        let user: WireUser = check(response).await?.json().await?;
        Ok(user.into())
    }

    async fn update_user_by_id(&self, id: Uuid, patch: UserPatch) -> Result<AuthUser, RemoteError> {
        let url = self.endpoint(&format!("auth/v1/admin/users/{id}"))?;
        let response = self
            .request(Method::PUT, url, None)
            .json(&patch)
            .send()
            .await?;
        let user: WireUser = check(response).await?.json().await?;
        Ok(user.into())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), RemoteError> {
        let url = self.endpoint(&format!("auth/v1/admin/users/{id}"))?;
        check(self.request(Method::DELETE, url, None).send().await?).await?;
        Ok(())
    }
}

#[async_trait]
impl StorageApi for HttpRemote {
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>, RemoteError> {
        let url = self.endpoint("storage/v1/bucket")?;
        let response = check(self.request(Method::GET, url, None).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn create_bucket(&self, name: &str, public: bool) -> Result<(), RemoteError> {
        let url = self.endpoint("storage/v1/bucket")?;
        let body = serde_json::json!({ "name": name, "public": public });
        check(
            self.request(Method::POST, url, None)
                .json(&body)
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        options: UploadOptions,
    ) -> Result<(), RemoteError> {
        let url = self.endpoint(&format!("storage/v1/object/{bucket}/{path}"))?;
        let mut request = self
            .request(Method::POST, url, None)
            .header("Content-Type", content_type)
            .header("x-upsert", options.upsert.to_string());
        if let Some(cache_control) = &options.cache_control {
            request = request.header("cache-control", cache_control.clone());
        }
        check(request.body(bytes).send().await?).await?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}storage/v1/object/public/{bucket}/{path}",
            self.base_url
        )
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), RemoteError> {
        let url = self.endpoint(&format!("storage/v1/object/{bucket}"))?;
        let body = serde_json::json!({ "prefixes": paths });
        check(
            self.request(Method::DELETE, url, None)
                .json(&body)
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }
}
