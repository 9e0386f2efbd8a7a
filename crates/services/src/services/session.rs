//! Session/identity service: holds the process-wide authenticated identity,
//! rehydrates it on startup from a versioned persisted token, and re-derives
//! the role on every refresh. Injected everywhere it is needed; there is no
//! ambient global.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use models::{Profile, Role, UpdateProfile};
use remote::{AuthApi, AuthSession, Credentials, RemoteError, UserPatch, auth::AuthUser};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use super::gateway::Gateway;

/// Bumping this discards any previously persisted session, leaving the
/// process logged out on next start.
pub const SESSION_SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("not authenticated")]
    NotAuthenticated,
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedSession {
    pub version: u32,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Durable storage for the session token, keyed by schema version.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Option<PersistedSession>;
    fn save(&self, session: &PersistedSession);
    fn clear(&self);
}

pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("taskboard")
            .join("session.json")
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Option<PersistedSession> {
        let raw = fs::read_to_string(&self.path).ok()?;
        let persisted: PersistedSession = serde_json::from_str(&raw).ok()?;
        if persisted.version != SESSION_SCHEMA_VERSION {
            info!(
                found = persisted.version,
                expected = SESSION_SCHEMA_VERSION,
                "persisted session version mismatch, discarding"
            );
            return None;
        }
        Some(persisted)
    }

    fn save(&self, session: &PersistedSession) {
        if let Some(parent) = self.path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        match serde_json::to_string_pretty(session) {
            Ok(raw) => {
                if let Err(err) = fs::write(&self.path, raw) {
                    warn!(path = %self.path.display(), error = %err, "failed to persist session");
                }
            }
            Err(err) => warn!(error = %err, "failed to serialize session"),
        }
    }

    fn clear(&self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[derive(Default)]
pub struct MemorySessionStore {
    inner: std::sync::Mutex<Option<PersistedSession>>,
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Option<PersistedSession> {
        self.inner.lock().unwrap().clone()
    }

    fn save(&self, session: &PersistedSession) {
        *self.inner.lock().unwrap() = Some(session.clone());
    }

    fn clear(&self) {
        *self.inner.lock().unwrap() = None;
    }
}

#[derive(Default)]
struct SessionState {
    session: Option<AuthSession>,
    identity: Option<Identity>,
}

pub struct SessionService {
    auth: Arc<dyn AuthApi>,
    gateway: Gateway,
    store: Arc<dyn SessionStore>,
    state: RwLock<SessionState>,
}

impl SessionService {
    pub fn new(auth: Arc<dyn AuthApi>, gateway: Gateway, store: Arc<dyn SessionStore>) -> Self {
        Self {
            auth,
            gateway,
            store,
            state: RwLock::new(SessionState::default()),
        }
    }

    /// Rehydrates the persisted token (if any) and refreshes the identity.
    /// A stale or rejected token leaves the service logged out.
    pub async fn init(&self) -> Result<(), SessionError> {
        let Some(persisted) = self.store.load() else {
            return Ok(());
        };
        match self.auth.get_session(&persisted.access_token).await {
            Ok(Some(session)) => {
                let identity = self.resolve_identity(&session.user).await?;
                let mut state = self.state.write().await;
                state.session = Some(session);
                state.identity = Some(identity);
                Ok(())
            }
            Ok(None) => {
                self.store.clear();
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "session rehydration failed");
                Ok(())
            }
        }
    }

    pub async fn login(&self, credentials: Credentials) -> Result<Identity, SessionError> {
        let session = self.auth.sign_in_with_password(credentials).await?;
        self.install(session).await
    }

    pub async fn signup(
        &self,
        credentials: Credentials,
        name: String,
    ) -> Result<Identity, SessionError> {
        let email = credentials.email.clone();
        let session = self.auth.sign_up(credentials).await?;
        if let Err(err) = self
            .gateway
            .create_profile(models::CreateProfile {
                id: session.user.id,
                name,
                email,
                role: Some(Role::User),
                job_title: None,
                organization_id: None,
            })
            .await
        {
            warn!(error = %err, "profile creation during signup failed");
        }
        self.install(session).await
    }

    /// Clears local state unconditionally; a failed remote sign-out is logged
    /// and otherwise ignored.
    pub async fn logout(&self) {
        let token = {
            let state = self.state.read().await;
            state.session.as_ref().map(|s| s.access_token.clone())
        };
        if let Some(token) = token {
            if let Err(err) = self.auth.sign_out(&token).await {
                warn!(error = %err, "remote sign-out failed, clearing local session anyway");
            }
        }
        self.clear().await;
    }

    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.session = None;
        state.identity = None;
        self.store.clear();
    }

    /// Re-derives the identity (and role) for the current token.
    pub async fn refresh(&self) -> Result<Option<Identity>, SessionError> {
        let token = {
            let state = self.state.read().await;
            state.session.as_ref().map(|s| s.access_token.clone())
        };
        let Some(token) = token else {
            return Ok(None);
        };
        match self.auth.get_session(&token).await? {
            Some(session) => {
                let identity = self.resolve_identity(&session.user).await?;
                let mut state = self.state.write().await;
                state.session = Some(session);
                state.identity = Some(identity.clone());
                Ok(Some(identity))
            }
            None => {
                self.clear().await;
                Ok(None)
            }
        }
    }

    pub async fn update_user(&self, patch: UserPatch) -> Result<Identity, SessionError> {
        let token = {
            let state = self.state.read().await;
            state
                .session
                .as_ref()
                .map(|s| s.access_token.clone())
                .ok_or(SessionError::NotAuthenticated)?
        };
        self.auth.update_user(&token, patch).await?;
        self.refresh()
            .await?
            .ok_or(SessionError::NotAuthenticated)
    }

    /// Mirrors a role change into the auth provider's user metadata so the
    /// precedence chain agrees with the profile table on the next refresh.
    pub async fn sync_role(&self, user_id: Uuid, role: Role) -> Result<(), SessionError> {
        self.auth
            .update_user_by_id(
                user_id,
                UserPatch {
                    user_metadata: Some(json!({ "role": role })),
                    ..UserPatch::default()
                },
            )
            .await?;
        Ok(())
    }

    /// Admin surface: removes another user's account and its profile row.
    pub async fn delete_account(&self, user_id: Uuid) -> Result<(), SessionError> {
        self.auth.delete_user(user_id).await?;
        self.gateway.delete_profile(user_id).await?;
        Ok(())
    }

    pub async fn update_profile(&self, data: UpdateProfile) -> Result<Profile, SessionError> {
        let identity = self.identity().await.ok_or(SessionError::NotAuthenticated)?;
        let profile = self.gateway.update_profile(identity.user_id, data).await?;
        self.refresh().await?;
        Ok(profile)
    }

    pub async fn identity(&self) -> Option<Identity> {
        self.state.read().await.identity.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.session.is_some()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.state
            .read()
            .await
            .session
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    async fn install(&self, session: AuthSession) -> Result<Identity, SessionError> {
        let identity = self.resolve_identity(&session.user).await?;
        self.store.save(&PersistedSession {
            version: SESSION_SCHEMA_VERSION,
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
        });
        let mut state = self.state.write().await;
        state.session = Some(session);
        state.identity = Some(identity.clone());
        Ok(identity)
    }

    async fn resolve_identity(&self, user: &AuthUser) -> Result<Identity, SessionError> {
        let profile = self.gateway.find_profile(user.id).await?;
        let role = resolve_role(
            self.gateway.stored_role(user.id).await?,
            &user.user_metadata,
            &user.app_metadata,
        );
        Ok(Identity {
            user_id: user.id,
            email: user.email.clone(),
            name: profile
                .as_ref()
                .map(|p| p.name.clone())
                .unwrap_or_else(|| user.email.split('@').next().unwrap_or_default().to_string()),
            role,
            avatar_url: profile.and_then(|p| p.avatar_url),
        })
    }
}

/// Role precedence: stored profile role, then auth-provider user metadata,
/// then app metadata, then the default role.
fn resolve_role(stored: Option<Role>, user_metadata: &Value, app_metadata: &Value) -> Role {
    stored
        .or_else(|| metadata_role(user_metadata))
        .or_else(|| metadata_role(app_metadata))
        .unwrap_or_default()
}

fn metadata_role(metadata: &Value) -> Option<Role> {
    metadata.get("role")?.as_str()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use remote::MemoryRemote;
    use serde_json::json;

    use super::*;

    fn service_with(remote: Arc<MemoryRemote>) -> SessionService {
        SessionService::new(
            remote.clone(),
            Gateway::new(remote),
            Arc::new(MemorySessionStore::default()),
        )
    }

    fn seed_profile(remote: &MemoryRemote, id: Uuid, role: Value) {
        remote.seed(
            "profiles",
            vec![json!({
                "id": id.to_string(),
                "name": "Sam",
                "email": "sam@taskboard.dev",
                "role": role,
                "job_title": null,
                "avatar_url": null,
                "organization_id": null,
            })],
        );
    }

    #[tokio::test]
    async fn stored_profile_role_wins_over_metadata() {
        let remote = Arc::new(MemoryRemote::new());
        let id = remote.seed_user("sam@taskboard.dev", "pw", json!({"role": "user"}));
        seed_profile(&remote, id, json!("admin"));

        let service = service_with(remote);
        let identity = service
            .login(Credentials {
                email: "sam@taskboard.dev".to_string(),
                password: "pw".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(identity.role, Role::Admin);
    }

    #[tokio::test]
    async fn metadata_role_applies_when_profile_role_is_null() {
        let remote = Arc::new(MemoryRemote::new());
        let id = remote.seed_user("sam@taskboard.dev", "pw", json!({"role": "admin"}));
        seed_profile(&remote, id, Value::Null);

        let service = service_with(remote);
        let identity = service
            .login(Credentials {
                email: "sam@taskboard.dev".to_string(),
                password: "pw".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(identity.role, Role::Admin);
    }

    #[tokio::test]
    async fn default_role_when_nothing_specifies_one() {
        let remote = Arc::new(MemoryRemote::new());
        remote.seed_user("sam@taskboard.dev", "pw", json!({}));

        let service = service_with(remote);
        let identity = service
            .login(Credentials {
                email: "sam@taskboard.dev".to_string(),
                password: "pw".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(identity.role, Role::User);
    }

    #[tokio::test]
    async fn deleting_an_account_removes_auth_user_and_profile() {
        let remote = Arc::new(MemoryRemote::new());
        let id = remote.seed_user("sam@taskboard.dev", "pw", json!({}));
        seed_profile(&remote, id, json!("user"));

        let service = service_with(remote.clone());
        service.delete_account(id).await.unwrap();

        assert!(remote.rows("profiles").is_empty());
        let result = service
            .login(Credentials {
                email: "sam@taskboard.dev".to_string(),
                password: "pw".to_string(),
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn logout_clears_local_state_even_when_remote_sign_out_fails() {
        let remote = Arc::new(MemoryRemote::new());
        remote.seed_user("sam@taskboard.dev", "pw", json!({}));

        let service = service_with(remote.clone());
        service
            .login(Credentials {
                email: "sam@taskboard.dev".to_string(),
                password: "pw".to_string(),
            })
            .await
            .unwrap();
        remote.set_fail_sign_out(true);

        service.logout().await;
        assert!(!service.is_authenticated().await);
        assert!(service.identity().await.is_none());
    }

    #[tokio::test]
    async fn init_rehydrates_persisted_token() {
        let remote = Arc::new(MemoryRemote::new());
        remote.seed_user("sam@taskboard.dev", "pw", json!({}));
        let store = Arc::new(MemorySessionStore::default());

        let first = SessionService::new(
            remote.clone(),
            Gateway::new(remote.clone()),
            store.clone(),
        );
        first
            .login(Credentials {
                email: "sam@taskboard.dev".to_string(),
                password: "pw".to_string(),
            })
            .await
            .unwrap();

        let second = SessionService::new(remote.clone(), Gateway::new(remote), store);
        second.init().await.unwrap();
        assert!(second.is_authenticated().await);
    }

    #[tokio::test]
    async fn file_store_discards_mismatched_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(
            &path,
            serde_json::to_string(&PersistedSession {
                version: SESSION_SCHEMA_VERSION - 1,
                access_token: "stale".to_string(),
                refresh_token: None,
            })
            .unwrap(),
        )
        .unwrap();

        let store = FileSessionStore::new(&path);
        assert!(store.load().is_none());

        let fresh = PersistedSession {
            version: SESSION_SCHEMA_VERSION,
            access_token: "current".to_string(),
            refresh_token: None,
        };
        store.save(&fresh);
        assert_eq!(store.load().unwrap().access_token, "current");
        store.clear();
        assert!(store.load().is_none());
    }
}
