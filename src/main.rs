//! Quiz Blitz Back binary entrypoint wiring REST, SSE, the phase clock and the storage layer.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quiz_blitz_back::{
    config::AppConfig,
    dao::game_store::{GameStore, memory::MemoryGameStore},
    routes,
    services::session_reaper,
    state::{AppState, SharedState},
};

/// Storage backend selected through `STORAGE_BACKEND`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StorageBackend {
    Couch,
    Memory,
}

impl StorageBackend {
    fn from_env() -> Self {
        match env::var("STORAGE_BACKEND").ok().as_deref().map(str::trim) {
            Some("memory") => Self::Memory,
            Some("couch") | Some("couchdb") => Self::Couch,
            Some(other) => {
                warn!(backend = other, "unknown storage backend; using the default");
                Self::default()
            }
            None => Self::default(),
        }
    }
}

impl Default for StorageBackend {
    fn default() -> Self {
        if cfg!(feature = "couch-store") {
            Self::Couch
        } else {
            Self::Memory
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config);

    start_storage(&app_state).await?;
    tokio::spawn(session_reaper::run(app_state.clone()));

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Install the selected storage backend; CouchDB is connected in the background.
async fn start_storage(state: &SharedState) -> anyhow::Result<()> {
    match StorageBackend::from_env() {
        StorageBackend::Memory => {
            info!("using in-memory storage");
            let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::new());
            state.install_game_store(store).await;
            Ok(())
        }
        StorageBackend::Couch => start_couch_supervisor(state),
    }
}

#[cfg(feature = "couch-store")]
fn start_couch_supervisor(state: &SharedState) -> anyhow::Result<()> {
    use quiz_blitz_back::{
        dao::{
            game_store::couchdb::{CouchConfig, CouchGameStore},
            storage::StorageError,
        },
        services::storage_supervisor,
    };

    let couch = CouchConfig::from_env().context("reading CouchDB configuration")?;
    info!(database = %couch.database, "using CouchDB storage");
    tokio::spawn(storage_supervisor::run(state.clone(), move || {
        let couch = couch.clone();
        async move {
            let store = CouchGameStore::connect(couch).await?;
            Ok::<_, StorageError>(Arc::new(store) as Arc<dyn GameStore>)
        }
    }));
    Ok(())
}

#[cfg(not(feature = "couch-store"))]
fn start_couch_supervisor(_state: &SharedState) -> anyhow::Result<()> {
    anyhow::bail!("CouchDB storage requested but the couch-store feature is disabled")
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
