//! Server execution logic.

use std::{future::Future, sync::Arc};

use axum::{
    Router,
    routing::{delete, get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use yoriai_shared::time::Clock;

use crate::{config::HeartbeatConfig, domain::MembershipStore, usecase::Coordinator};

use super::{
    handler::{
        add_member, debug_state, get_presence, health_check, remove_member, websocket_handler,
    },
    signal::shutdown_signal,
    state::AppState,
};

/// WebSocket coordinator server
///
/// # Example
///
/// ```ignore
/// let server = Server::new(coordinator, membership_store, HeartbeatConfig::default(), clock);
/// server.run(&ServerConfig::default().bind_addr()).await?;
/// ```
pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    pub fn new(
        coordinator: Arc<Coordinator>,
        membership_store: Arc<dyn MembershipStore>,
        heartbeat: HeartbeatConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: Arc::new(AppState {
                coordinator,
                membership_store,
                heartbeat,
                clock,
            }),
        }
    }

    /// Build the router with every endpoint
    pub fn router(&self) -> Router {
        Router::new()
            // WebSocket エンドポイント
            .route("/ws", get(websocket_handler))
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .route("/api/presence", get(get_presence))
            .route("/api/rooms/{room_id}/members", post(add_member))
            .route("/api/rooms/{room_id}/members/{user_id}", delete(remove_member))
            .route("/debug/state", get(debug_state))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Run the server until Ctrl+C / SIGTERM
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, bind_addr: &str) -> Result<(), Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(bind_addr).await?;

        tracing::info!("Yoriai server listening on {}", listener.local_addr()?);
        tracing::info!("Connect to: ws://{}/ws?token=<token>", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener, shutdown_signal()).await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// Serve on an already bound listener until `shutdown` resolves
    ///
    /// コーディネーターはここで開始し、`shutdown` の完了時に停止する。
    /// 停止で全接続の送信チャンネルが閉じられ、開いているソケットは通常の切断処理を経て終了する。
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> std::io::Result<()> {
        let router = self.router();
        let coordinator = self.state.coordinator.clone();
        coordinator.start();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                coordinator.stop().await;
            })
            .await
    }
}
