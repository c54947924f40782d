use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Duration, Utc};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

/// Issued bearer tokens live for an hour.
const TOKEN_TTL_MINUTES: i64 = 60;

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RegisterRequest>,
) -> axum::response::Response {
    let user = match services
        .users
        .register(body.email, body.full_name, body.password)
        .await
    {
        Ok(u) => u,
        Err(e) => return errors::billing_error_to_response(e),
    };

    (StatusCode::CREATED, Json(dto::user_to_json(&user))).into_response()
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::LoginRequest>,
) -> axum::response::Response {
    let user = match services.users.authenticate(&body.email, &body.password).await {
        Ok(u) => u,
        Err(e) => return errors::billing_error_to_response(e),
    };

    let token = match services.tokens.issue(
        user.id,
        user.roles.clone(),
        Utc::now(),
        Duration::minutes(TOKEN_TTL_MINUTES),
    ) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!("token signing failed: {e}");
            return errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "token_error",
                "failed to issue token",
            );
        }
    };

    Json(serde_json::json!({
        "access_token": token,
        "token_type": "bearer",
    }))
    .into_response()
}

pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services.users.get(principal.user_id()).await {
        Ok(user) => Json(dto::user_to_json(&user)).into_response(),
        Err(e) => errors::billing_error_to_response(e),
    }
}
