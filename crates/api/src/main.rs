use std::sync::Arc;

use brandhub_api::app;
use brandhub_api::auth::{InMemorySessionValidator, Permission, SessionClaims};

#[tokio::main]
async fn main() {
    brandhub_observability::init();

    let admin_token = std::env::var("ADMIN_TOKEN").unwrap_or_else(|_| {
        tracing::warn!("ADMIN_TOKEN not set; using insecure dev default");
        "dev-token".to_string()
    });

    // Single wildcard session for the admin token; real deployments register
    // sessions per authenticated user.
    let sessions = Arc::new(InMemorySessionValidator::new());
    sessions.register(
        admin_token,
        SessionClaims::new("admin", vec![Permission::new("*")]),
    );

    let (services, _worker) = app::services::build_services();
    let app = app::build_app(Arc::new(services), sessions);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {bind_addr}: {e}"));

    tracing::info!("listening on {}", bind_addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server exited with error");
    }
}
