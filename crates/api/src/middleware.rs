use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use campusbill_auth::TokenValidator;

use crate::app::errors;
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    pub tokens: Arc<dyn TokenValidator>,
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let token = match extract_bearer(req.headers()) {
        Ok(t) => t,
        Err(status) => {
            return errors::json_error(status, "unauthorized", "missing or invalid bearer token");
        }
    };

    let claims = match state.tokens.validate(token, Utc::now()) {
        Ok(c) => c,
        Err(_e) => {
            return errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "token rejected");
        }
    };

    req.extensions_mut()
        .insert(PrincipalContext::new(claims.sub, claims.roles));

    next.run(req).await
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token)
}
