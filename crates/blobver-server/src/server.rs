use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::BlobverConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::{AppState, SharedState};

/// The blobver HTTP server.
pub struct BlobverServer {
    config: BlobverConfig,
    state: SharedState,
}

impl BlobverServer {
    /// Resolve the backend and build the collection stores.
    pub fn new(config: BlobverConfig) -> ServerResult<Self> {
        let backend = config.object_backend()?;
        let state = Arc::new(AppState::new(&config, &backend)?);
        Ok(Self { config, state })
    }

    pub fn config(&self) -> &BlobverConfig {
        &self.config
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }

    /// Start serving requests until ctrl-c.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!(
            addr = %self.config.bind_addr,
            backend = self.state.backend_name(),
            "blobver server listening"
        );
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                info!("shutting down");
            })
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}
