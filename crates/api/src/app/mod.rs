//! HTTP application wiring (axum router + service construction).
//!
//! Layout:
//! - `services.rs`: storage backend selection and service wiring
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request DTOs, parsing, and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{
    Extension, Router,
    routing::{get, post},
};
use tower::ServiceBuilder;

use campusbill_auth::Hs256TokenCodec;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(jwt_secret: String) -> Router {
    let codec = Arc::new(Hs256TokenCodec::new(jwt_secret.as_bytes()));
    let auth_state = middleware::AuthState {
        tokens: codec.clone(),
    };

    let services = Arc::new(services::build_services(codec).await);

    // Open routes: liveness plus the register/login pair that mints tokens.
    let open = Router::new()
        .route("/health", get(routes::system::health))
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login));

    // Protected routes: require a valid bearer token.
    let protected = routes::router().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    open.merge(protected)
        .layer(Extension(services))
        .layer(ServiceBuilder::new())
}
