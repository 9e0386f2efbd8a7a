//! Collaborator surface for the hosted backend: auth, generic tables and
//! object storage. Everything above this crate talks to the backend through
//! the `AuthApi`/`TableApi`/`StorageApi` traits; the concrete binding (HTTP or
//! in-memory) is chosen by configuration injection, never inside this crate.

pub mod auth;
pub mod error;
pub mod http;
pub mod memory;
pub mod query;
pub mod storage;
pub mod table;

pub use auth::{AuthApi, AuthSession, AuthUser, Credentials, UserPatch};
pub use error::RemoteError;
pub use http::HttpRemote;
pub use memory::MemoryRemote;
pub use query::{Filter, Query, SortDirection};
pub use storage::{BucketInfo, StorageApi, UploadOptions};
pub use table::TableApi;

pub const AVATARS_BUCKET: &str = "avatars";
pub const TASK_FILES_BUCKET: &str = "task_files";
