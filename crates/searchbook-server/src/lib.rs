//! Searchbook notebook server.
//!
//! Provides a WebSocket server for editing and running a search notebook.
//!
//! # Architecture
//!
//! The server consists of:
//! - **Session**: Owns the notebook, the selection and output relays
//! - **Protocol**: Defines client/server message types
//! - **Routes**: HTTP and WebSocket handlers
//! - **Local**: Filesystem-backed search and file services

pub mod error;
pub mod local;
pub mod protocol;
pub mod routes;
pub mod session;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use searchbook_core::{AggregatingSearchExecutor, BlockDependencies, BlockInput, NotebookServices};
use tokio::sync::RwLock;

pub use error::{ServerError, ServerResult};
pub use local::{LocalFileFetcher, LocalSearchBackend};
pub use protocol::{BlockState, ClientMessage, OutputSnapshot, ServerMessage};
pub use routes::{AppState, create_router};
pub use session::{NotebookSession, SessionHandle};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Reject edits from clients.
    pub read_only: bool,
    /// Directory whose subdirectories are the searchable repositories.
    pub repos_root: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            read_only: false,
            repos_root: PathBuf::from("."),
        }
    }
}

impl ServerConfig {
    /// Socket address to listen on.
    pub fn socket_addr(&self) -> ServerResult<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ServerError::Config(format!("Invalid address: {}:{}", self.host, self.port)))
    }
}

/// Services backed by the repositories under `repos_root`, spawning on the
/// current runtime.
pub fn local_services(repos_root: impl Into<PathBuf>) -> NotebookServices {
    let repos_root = repos_root.into();
    NotebookServices::new(
        Arc::new(AggregatingSearchExecutor::new(LocalSearchBackend::new(
            repos_root.clone(),
        ))),
        Arc::new(LocalFileFetcher::new(repos_root)),
        tokio::runtime::Handle::current(),
    )
}

/// Start the Searchbook server for a notebook built from `initial_blocks`.
pub async fn serve(initial_blocks: Vec<BlockInput>, config: ServerConfig) -> ServerResult<()> {
    if !config.repos_root.is_dir() {
        return Err(ServerError::Config(format!(
            "Repository root is not a directory: {}",
            config.repos_root.display()
        )));
    }
    let addr = config.socket_addr()?;

    let (session, _rx) = NotebookSession::new(
        initial_blocks,
        BlockDependencies::default(),
        local_services(config.repos_root.clone()),
        config.read_only,
    );
    let state = Arc::new(AppState {
        session: Arc::new(RwLock::new(session)),
    });

    let app = create_router(state);

    tracing::info!(
        "Starting Searchbook server at http://{} (repositories in {})",
        addr,
        config.repos_root.display()
    );

    // Start server with graceful shutdown
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        })
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}
