use thiserror::Error;

/// Postgres error code reported when a relation has not been migrated yet.
pub const MISSING_RELATION_CODE: &str = "42P01";

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote api error{}: {message}", code.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default())]
    Api {
        code: Option<String>,
        message: String,
    },
    #[error("No data returned")]
    NoData,
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("no active session")]
    NotAuthenticated,
    #[error("storage error: {0}")]
    Storage(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed remote payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RemoteError {
    pub fn api(message: impl Into<String>) -> Self {
        RemoteError::Api {
            code: None,
            message: message.into(),
        }
    }

    pub fn missing_relation(table: &str) -> Self {
        RemoteError::Api {
            code: Some(MISSING_RELATION_CODE.to_string()),
            message: format!("relation \"{table}\" does not exist"),
        }
    }

    /// True when the failure means the backing table has not been created
    /// yet. List operations treat this as an empty result so the UI can run
    /// against a partially-migrated backend.
    pub fn is_missing_relation(&self) -> bool {
        match self {
            RemoteError::Api { code, message } => {
                code.as_deref() == Some(MISSING_RELATION_CODE)
                    || message.contains("does not exist")
            }
            _ => false,
        }
    }
}
