use std::sync::Arc;

use anyhow::Context;
use remote::{AuthApi, HttpRemote, MemoryRemote, StorageApi, TableApi};
use server::{
    AppState,
    config::{BackendMode, Config, ENV_BACKEND_KEY, ENV_BACKEND_URL},
    routes,
};
use services::services::{
    board::BoardRegistry,
    files::FileService,
    gateway::Gateway,
    session::{FileSessionStore, SessionService},
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

struct Collaborators {
    auth: Arc<dyn AuthApi>,
    tables: Arc<dyn TableApi>,
    storage: Arc<dyn StorageApi>,
}

fn bind_backend(config: &Config) -> anyhow::Result<Collaborators> {
    match config.backend {
        BackendMode::Remote => {
            let url = config
                .backend_url
                .as_deref()
                .with_context(|| format!("{ENV_BACKEND_URL} is required in remote mode"))?;
            let key = config
                .backend_key
                .clone()
                .with_context(|| format!("{ENV_BACKEND_KEY} is required in remote mode"))?;
            let remote = Arc::new(HttpRemote::new(url, key)?);
            info!(backend = "remote", url, "backend bound");
            Ok(Collaborators {
                auth: remote.clone(),
                tables: remote.clone(),
                storage: remote,
            })
        }
        BackendMode::Memory => {
            let remote = Arc::new(MemoryRemote::new());
            info!(backend = "memory", "backend bound");
            Ok(Collaborators {
                auth: remote.clone(),
                tables: remote.clone(),
                storage: remote,
            })
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env().context("invalid configuration")?;

    let _sentry_guard = config.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let collaborators = bind_backend(&config)?;
    let gateway = Gateway::new(collaborators.tables);
    let sessions = Arc::new(SessionService::new(
        collaborators.auth,
        gateway.clone(),
        Arc::new(FileSessionStore::new(&config.session_file)),
    ));
    if let Err(err) = sessions.init().await {
        warn!(error = %err, "session rehydration failed, starting logged out");
    }

    let files = Arc::new(FileService::new(collaborators.storage, gateway.clone()));
    if let Err(err) = files.ensure_buckets().await {
        warn!(error = %err, "bucket provisioning failed");
    }

    let state = AppState {
        gateway: gateway.clone(),
        sessions,
        boards: Arc::new(BoardRegistry::new(gateway)),
        files,
    };

    let app = routes::router(state);
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "listening");
    if let Err(err) = axum::serve(listener, app).await {
        error!(error = %err, "server exited with error");
        return Err(err.into());
    }
    Ok(())
}
