//! In-memory backend used by tests and by the `memory` backend mode. Honors
//! the same query, auth and storage semantics as the HTTP binding, and keeps
//! a write-call counter so tests can assert which operations actually reached
//! the collaborator.

use std::{
    collections::HashMap,
    sync::{
        Mutex, RwLock,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
    auth::{AuthApi, AuthSession, AuthUser, Credentials, UserPatch},
    error::RemoteError,
    query::{Query, SortDirection, compare},
    storage::{BucketInfo, StorageApi, UploadOptions},
    table::TableApi,
};

pub const DEFAULT_TABLES: &[&str] = &[
    "organizations",
    "projects",
    "columns",
    "tasks",
    "task_labels",
    "task_assignees",
    "task_files",
    "labels",
    "profiles",
    "user_projects",
];

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

#[derive(Debug, Clone)]
struct MemoryUser {
    password: String,
    user: AuthUser,
}

#[derive(Default)]
pub struct MemoryRemote {
    tables: RwLock<HashMap<String, Vec<Value>>>,
    buckets: RwLock<HashMap<String, HashMap<String, StoredObject>>>,
    users: RwLock<Vec<MemoryUser>>,
    sessions: RwLock<HashMap<String, Uuid>>,
    write_calls: AtomicUsize,
    injected_failures: Mutex<HashMap<String, usize>>,
    fail_sign_out: AtomicBool,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::with_tables(DEFAULT_TABLES)
    }

    /// Backend with only the given tables provisioned; everything else
    /// reports a missing relation, like a partially-migrated project.
    pub fn with_tables(tables: &[&str]) -> Self {
        let remote = Self::default();
        {
            let mut map = remote.tables.write().unwrap();
            for table in tables {
                map.insert(table.to_string(), Vec::new());
            }
        }
        remote
    }

    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        let mut map = self.tables.write().unwrap();
        map.entry(table.to_string()).or_default().extend(rows);
    }

    pub fn seed_user(&self, email: &str, password: &str, user_metadata: Value) -> Uuid {
        let id = Uuid::new_v4();
        self.users.write().unwrap().push(MemoryUser {
            password: password.to_string(),
            user: AuthUser {
                id,
                email: email.to_string(),
                user_metadata,
                app_metadata: json!({}),
                created_at: Utc::now(),
            },
        });
        id
    }

    /// Rows currently stored for a table (testing aid).
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .read()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Stored object bytes and content type, if present (testing aid).
    pub fn object(&self, bucket: &str, path: &str) -> Option<(Vec<u8>, String)> {
        let buckets = self.buckets.read().unwrap();
        buckets
            .get(bucket)?
            .get(path)
            .map(|o| (o.bytes.clone(), o.content_type.clone()))
    }

    /// Number of insert/update/delete calls that reached this backend.
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    /// Make the next `count` write calls against `table` fail with a remote
    /// error, for exercising retry and repair paths.
    pub fn inject_failures(&self, table: &str, count: usize) {
        self.injected_failures
            .lock()
            .unwrap()
            .insert(table.to_string(), count);
    }

    pub fn set_fail_sign_out(&self, fail: bool) {
        self.fail_sign_out.store(fail, Ordering::SeqCst);
    }

    fn record_write(&self, table: &str) -> Result<(), RemoteError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        let mut failures = self.injected_failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(table) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RemoteError::api(format!("injected failure on {table}")));
            }
        }
        Ok(())
    }

    fn apply_query(rows: &[Value], query: &Query) -> Vec<Value> {
        let mut matched: Vec<Value> = rows
            .iter()
            .filter(|row| query.matches(row))
            .cloned()
            .collect();
        if let Some((column, direction)) = &query.order_by {
            matched.sort_by(|a, b| {
                let ordering = match (a.get(column), b.get(column)) {
                    (Some(x), Some(y)) => compare(x, y).unwrap_or(std::cmp::Ordering::Equal),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                };
                match direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
        }
        if let Some((from, to)) = query.range {
            matched = matched
                .into_iter()
                .skip(from)
                .take(to.saturating_sub(from) + 1)
                .collect();
        }
        if query.single {
            matched.truncate(1);
        }
        matched
    }

    fn session_user(&self, access_token: &str) -> Option<AuthUser> {
        let sessions = self.sessions.read().unwrap();
        let user_id = sessions.get(access_token)?;
        let users = self.users.read().unwrap();
        users
            .iter()
            .find(|u| u.user.id == *user_id)
            .map(|u| u.user.clone())
    }

    fn open_session(&self, user: AuthUser) -> AuthSession {
        let token = Uuid::new_v4().to_string();
        self.sessions
            .write()
            .unwrap()
            .insert(token.clone(), user.id);
        AuthSession {
            access_token: token,
            refresh_token: Some(Uuid::new_v4().to_string()),
            expires_at: None,
            user,
        }
    }
}

#[async_trait]
impl TableApi for MemoryRemote {
    async fn select(&self, table: &str, query: Query) -> Result<Vec<Value>, RemoteError> {
        let tables = self.tables.read().unwrap();
        let rows = tables
            .get(table)
            .ok_or_else(|| RemoteError::missing_relation(table))?;
        Ok(Self::apply_query(rows, &query))
    }

    async fn insert(&self, table: &str, rows: Value) -> Result<Vec<Value>, RemoteError> {
        self.record_write(table)?;
        let incoming = match rows {
            Value::Array(items) => items,
            single => vec![single],
        };
        let mut tables = self.tables.write().unwrap();
        let stored = tables
            .get_mut(table)
            .ok_or_else(|| RemoteError::missing_relation(table))?;
        stored.extend(incoming.iter().cloned());
        Ok(incoming)
    }

    async fn update(
        &self,
        table: &str,
        query: Query,
        patch: Value,
    ) -> Result<Vec<Value>, RemoteError> {
        self.record_write(table)?;
        let patch = patch
            .as_object()
            .ok_or_else(|| RemoteError::api("update patch must be an object"))?
            .clone();
        let mut tables = self.tables.write().unwrap();
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| RemoteError::missing_relation(table))?;
        let mut updated = Vec::new();
        for row in rows.iter_mut().filter(|row| query.matches(row)) {
            if let Some(object) = row.as_object_mut() {
                for (key, value) in &patch {
                    object.insert(key.clone(), value.clone());
                }
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, query: Query) -> Result<u64, RemoteError> {
        self.record_write(table)?;
        let mut tables = self.tables.write().unwrap();
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| RemoteError::missing_relation(table))?;
        let before = rows.len();
        rows.retain(|row| !query.matches(row));
        Ok((before - rows.len()) as u64)
    }
}

#[async_trait]
impl AuthApi for MemoryRemote {
    async fn sign_in_with_password(
        &self,
        credentials: Credentials,
    ) -> Result<AuthSession, RemoteError> {
        let user = {
            let users = self.users.read().unwrap();
            users
                .iter()
                .find(|u| u.user.email == credentials.email && u.password == credentials.password)
                .map(|u| u.user.clone())
        };
        let user = user.ok_or_else(|| RemoteError::Auth("invalid credentials".to_string()))?;
        Ok(self.open_session(user))
    }

    async fn sign_up(&self, credentials: Credentials) -> Result<AuthSession, RemoteError> {
        {
            let users = self.users.read().unwrap();
            if users.iter().any(|u| u.user.email == credentials.email) {
                return Err(RemoteError::Auth("email already registered".to_string()));
            }
        }
        let id = self.seed_user(&credentials.email, &credentials.password, json!({}));
        let user = self
            .users
            .read()
            .unwrap()
            .iter()
            .find(|u| u.user.id == id)
            .map(|u| u.user.clone())
            .expect("user just inserted");
        Ok(self.open_session(user))
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), RemoteError> {
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(RemoteError::api("sign-out unavailable"));
        }
        self.sessions.write().unwrap().remove(access_token);
        Ok(())
    }

    async fn get_session(&self, access_token: &str) -> Result<Option<AuthSession>, RemoteError> {
        Ok(self.session_user(access_token).map(|user| AuthSession {
            access_token: access_token.to_string(),
            refresh_token: None,
            expires_at: None,
            user,
        }))
    }

    async fn update_user(
        &self,
        access_token: &str,
        patch: UserPatch,
    ) -> Result<AuthUser, RemoteError> {
        let user = self
            .session_user(access_token)
            .ok_or(RemoteError::NotAuthenticated)?;
        self.update_user_by_id(user.id, patch).await
    }

    async fn update_user_by_id(&self, id: Uuid, patch: UserPatch) -> Result<AuthUser, RemoteError> {
        let mut users = self.users.write().unwrap();
        let entry = users
            .iter_mut()
            .find(|u| u.user.id == id)
            .ok_or_else(|| RemoteError::api("user not found"))?;
        if let Some(email) = patch.email {
            entry.user.email = email;
        }
        if let Some(password) = patch.password {
            entry.password = password;
        }
        if let Some(metadata) = patch.user_metadata {
            entry.user.user_metadata = metadata;
        }
        Ok(entry.user.clone())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), RemoteError> {
        let mut users = self.users.write().unwrap();
        let before = users.len();
        users.retain(|u| u.user.id != id);
        if users.len() == before {
            return Err(RemoteError::api("user not found"));
        }
        self.sessions.write().unwrap().retain(|_, uid| *uid != id);
        Ok(())
    }
}

#[async_trait]
impl StorageApi for MemoryRemote {
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>, RemoteError> {
        let buckets = self.buckets.read().unwrap();
        Ok(buckets
            .keys()
            .map(|name| BucketInfo {
                name: name.clone(),
                public: true,
            })
            .collect())
    }

    async fn create_bucket(&self, name: &str, _public: bool) -> Result<(), RemoteError> {
        self.buckets
            .write()
            .unwrap()
            .entry(name.to_string())
            .or_default();
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
        let mut buckets = self.buckets.write().unwrap();
        let objects = buckets.entry(bucket.to_string()).or_default();
        if !options.upsert && objects.contains_key(path) {
            return Err(RemoteError::Storage(format!("object already exists: {path}")));
        }
        objects.insert(
            path.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("memory://{bucket}/{path}")
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), RemoteError> {
        let mut buckets = self.buckets.write().unwrap();
        if let Some(objects) = buckets.get_mut(bucket) {
            for path in paths {
                objects.remove(path);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn select_on_unknown_table_reports_missing_relation() {
        let remote = MemoryRemote::with_tables(&["tasks"]);
        let err = remote.select("labels", Query::new()).await.unwrap_err();
        assert!(err.is_missing_relation());
    }

    #[tokio::test]
    async fn update_patches_only_matching_rows() {
        let remote = MemoryRemote::new();
        remote.seed(
            "tasks",
            vec![
                json!({"id": "a", "order": 0}),
                json!({"id": "b", "order": 1}),
            ],
        );
        let updated = remote
            .update("tasks", Query::new().eq("id", "a"), json!({"order": 5}))
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0]["order"], json!(5));
        assert_eq!(remote.rows("tasks")[1]["order"], json!(1));
    }

    #[tokio::test]
    async fn order_and_range_apply_after_filters() {
        let remote = MemoryRemote::new();
        remote.seed(
            "tasks",
            vec![
                json!({"id": "a", "order": 2}),
                json!({"id": "b", "order": 0}),
                json!({"id": "c", "order": 1}),
            ],
        );
        let rows = remote
            .select(
                "tasks",
                Query::new()
                    .order_by("order", SortDirection::Ascending)
                    .range(0, 1),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], json!("b"));
        assert_eq!(rows[1]["id"], json!("c"));
    }

    #[tokio::test]
    async fn injected_failures_consume_then_recover() {
        let remote = MemoryRemote::new();
        remote.inject_failures("tasks", 1);
        assert!(remote.insert("tasks", json!({"id": "x"})).await.is_err());
        assert!(remote.insert("tasks", json!({"id": "x"})).await.is_ok());
        assert_eq!(remote.write_calls(), 2);
    }

    #[tokio::test]
    async fn sign_in_round_trip_and_sign_out() {
        let remote = MemoryRemote::new();
        remote.seed_user("a@b.co", "pw", json!({"role": "admin"}));
        let session = remote
            .sign_in_with_password(Credentials {
                email: "a@b.co".to_string(),
                password: "pw".to_string(),
            })
            .await
            .unwrap();
        assert!(
            remote
                .get_session(&session.access_token)
                .await
                .unwrap()
                .is_some()
        );
        remote.sign_out(&session.access_token).await.unwrap();
        assert!(
            remote
                .get_session(&session.access_token)
                .await
                .unwrap()
                .is_none()
        );
    }
}
