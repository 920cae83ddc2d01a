use axum::Router;

pub mod brands;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new().nest("/brands", brands::router())
}
