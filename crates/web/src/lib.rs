//! ldap-template HTTP server.
//!
//! Provides an Axum-based HTTP server with:
//! - `GET /v1/:template?username=...` rendering a directory person through a template
//! - `GET /health`

pub mod api;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use ldap_template_core::{PersonLookup, TemplateResolver};

/// Shared, read-only application state.
///
/// Built once at startup. Requests only read it; every request opens its
/// own directory connection and reads its own template file.
pub struct AppState {
    pub lookup: PersonLookup,
    pub templates: TemplateResolver,
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(api::template_gen::routes())
        .merge(api::status::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The web server.
pub struct WebServer {
    state: Arc<AppState>,
}

impl WebServer {
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Serve on `addr` until `shutdown` resolves, then drain in-flight
    /// requests.
    pub async fn start<F>(self, addr: SocketAddr, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = router(self.state);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "http listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("http server stopped");
        Ok(())
    }
}
