use axum::{Router, routing::get};

pub mod auth;
pub mod invoices;
pub mod schools;
pub mod students;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/auth/me", get(auth::me))
        .nest("/schools", schools::router())
        .nest("/students", students::router())
        .nest("/invoices", invoices::router())
}
