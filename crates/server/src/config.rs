use std::{env, net::SocketAddr, path::PathBuf};

use secrecy::SecretString;
use services::services::session::FileSessionStore;
use thiserror::Error;

pub const ENV_BACKEND_MODE: &str = "TASKBOARD_BACKEND";
pub const ENV_BACKEND_URL: &str = "TASKBOARD_BACKEND_URL";
pub const ENV_BACKEND_KEY: &str = "TASKBOARD_BACKEND_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("invalid value for {variable}: {message}")]
    InvalidVar {
        variable: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    Remote,
    Memory,
}

/// Startup configuration. Which backend binding to use is an explicit mode,
/// not something inferred deep inside the gateway; the two backend variables
/// are required whenever the remote mode is selected and their absence is a
/// fatal configuration error.
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendMode,
    pub backend_url: Option<String>,
    pub backend_key: Option<SecretString>,
    pub listen_addr: SocketAddr,
    pub session_file: PathBuf,
    pub sentry_dsn: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend = match env::var(ENV_BACKEND_MODE).as_deref() {
            Ok("memory") => BackendMode::Memory,
            Ok("remote") | Err(_) => BackendMode::Remote,
            Ok(other) => {
                return Err(ConfigError::InvalidVar {
                    variable: ENV_BACKEND_MODE,
                    message: format!("expected 'remote' or 'memory', got '{other}'"),
                });
            }
        };

        let (backend_url, backend_key) = match backend {
            BackendMode::Remote => {
                let url = env::var(ENV_BACKEND_URL)
                    .map_err(|_| ConfigError::MissingVar(ENV_BACKEND_URL))?;
                let key = env::var(ENV_BACKEND_KEY)
                    .map_err(|_| ConfigError::MissingVar(ENV_BACKEND_KEY))?;
                (Some(url), Some(SecretString::from(key)))
            }
            BackendMode::Memory => (None, None),
        };

        let host = env::var("TASKBOARD_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("TASKBOARD_PORT")
            .ok()
            .map(|raw| {
                raw.parse::<u16>().map_err(|e| ConfigError::InvalidVar {
                    variable: "TASKBOARD_PORT",
                    message: e.to_string(),
                })
            })
            .transpose()?
            .unwrap_or(8365);
        let listen_addr =
            format!("{host}:{port}")
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::InvalidVar {
                    variable: "TASKBOARD_HOST",
                    message: e.to_string(),
                })?;

        let session_file = env::var("TASKBOARD_SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| FileSessionStore::default_path());

        Ok(Self {
            backend,
            backend_url,
            backend_key,
            listen_addr,
            session_file,
            sentry_dsn: env::var("TASKBOARD_SENTRY_DSN").ok(),
        })
    }
}
