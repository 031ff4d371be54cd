//! HTTP front door: one analyze route handing each request body to the
//! worker bridge, plus a health probe. Routing and CORS live here, away from
//! the bridging core.

pub mod response;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::worker::Bridge;
use response::GatewayResponse;

pub struct GatewayServer {
    bridge: Bridge,
    addr: SocketAddr,
}

impl GatewayServer {
    pub fn new(bridge: Bridge, addr: SocketAddr) -> Self {
        Self { bridge, addr }
    }

    pub async fn start(self) -> Result<()> {
        let addr = self.addr;
        let app = self.build_router();

        info!("Starting gateway on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    fn build_router(self) -> Router {
        let shared_state = Arc::new(GatewayState {
            bridge: self.bridge,
        });

        Router::new()
            .route("/api/health", get(health_check))
            .route("/api/analyze", post(analyze))
            .layer(CorsLayer::permissive())
            .with_state(shared_state)
    }
}

#[derive(Clone)]
struct GatewayState {
    bridge: Bridge,
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn analyze(State(state): State<Arc<GatewayState>>, body: Bytes) -> GatewayResponse {
    let outcome = state.bridge.run(&body).await;
    response::translate(outcome)
}
