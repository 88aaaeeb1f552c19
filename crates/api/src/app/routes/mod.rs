use axum::Router;

pub mod alerts;
pub mod inventory;
pub mod notifications;
pub mod system;

/// Router for all application endpoints (health is mounted separately).
pub fn router() -> Router {
    Router::new()
        .nest("/admin/inventory", inventory::router())
        .nest("/admin/alerts", alerts::router())
        .nest("/users", notifications::router())
}
