//! HTTP server lifecycle and routing.

use super::handlers::{self, ApiState};
use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, info, warn};

/// Origins of the local development front end, always allowed.
pub const DEV_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://127.0.0.1:3000"];

/// Handle to a running HTTP server
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    join_handle: Mutex<Option<JoinHandle<std::io::Result<()>>>>,
}

/// Build the router with all routes and the CORS layer.
pub fn create_router(state: ApiState) -> Router {
    let cors = cors_layer(state.frontend_origin.as_deref());

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/auth/login", get(handlers::auth_login))
        .route("/auth/callback", get(handlers::auth_callback))
        .route("/auth/status", get(handlers::auth_status))
        .route("/ads/profiles", get(handlers::ads_profiles))
        .route("/ads/campaigns", get(handlers::ads_campaigns))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(frontend_origin: Option<&str>) -> CorsLayer {
    let mut origins: Vec<HeaderValue> = DEV_ORIGINS
        .into_iter()
        .map(HeaderValue::from_static)
        .collect();

    if let Some(origin) = frontend_origin {
        match HeaderValue::from_str(origin) {
            Ok(value) => origins.push(value),
            Err(_) => warn!("Ignoring invalid frontend origin {:?} for CORS", origin),
        }
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Start the HTTP server.
///
/// # Parameters
///
/// - `addr`: Address to bind; port 0 picks a free port
/// - `state`: API state shared across handlers
///
/// # Returns
///
/// A handle to the running server that can be used to stop it.
pub async fn start_server(addr: SocketAddr, state: ApiState) -> Result<ServerHandle> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind HTTP listener on {}", addr))?;
    let local_addr = listener
        .local_addr()
        .context("Failed to read bound address")?;

    let router = create_router(state);
    let (tx, rx) = oneshot::channel::<()>();

    let server_task = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
                debug!("Server shutdown signal received");
            })
            .await
    });

    info!("HTTP server listening on {}", local_addr);

    Ok(ServerHandle {
        local_addr,
        shutdown: Mutex::new(Some(tx)),
        join_handle: Mutex::new(Some(server_task)),
    })
}

impl ServerHandle {
    /// Address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for in-flight requests to finish.
    pub async fn stop(&self) -> Result<()> {
        if let Some(tx) = self.shutdown.lock().await.take() {
            let _ = tx.send(());
        }

        if let Some(handle) = self.join_handle.lock().await.take() {
            handle
                .await
                .context("HTTP server task panicked")?
                .context("HTTP server failed")?;
        }

        Ok(())
    }
}
