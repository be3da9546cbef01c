//! HTTP gateway for askdesk.
//!
//! Serves the embedded chat page, a health check, and the v1 session API.
//! Built on Axum.

pub mod api_v1;
pub mod frontend;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{Router, response::Json, routing::get};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use askdesk_chat::Runtime;
use askdesk_config::AppConfig;

/// Request bodies above this are rejected with 413.
pub const BODY_LIMIT_BYTES: usize = 64 * 1024;

/// Build the full router: health, v1 API, and the embedded frontend.
///
/// Layers applied:
/// - Request body size limit (64 KiB)
/// - CORS, only when `gateway.allowed_origins` lists origins
/// - HTTP trace logging
pub fn build_router(runtime: Arc<Runtime>) -> Router {
    let cors = cors_layer(&runtime.config.gateway.allowed_origins);

    let router = Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", api_v1::v1_router(runtime))
        .merge(frontend::frontend_router())
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES));

    let router = match cors {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router.layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE])
            .max_age(std::time::Duration::from_secs(3600)),
    )
}

/// Start the gateway HTTP server.
///
/// Every startup check runs before the listener is bound, so a missing
/// credential or knowledge document means the page is never served.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = match Runtime::bootstrap(config).await {
        Ok(runtime) => Arc::new(runtime),
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return Err(e.into());
        }
    };
    serve(runtime).await
}

/// Bind and serve an already-bootstrapped runtime until Ctrl-C.
pub async fn serve(runtime: Arc<Runtime>) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!(
        "{}:{}",
        runtime.config.gateway.host, runtime.config.gateway.port
    );
    let app = build_router(runtime);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
