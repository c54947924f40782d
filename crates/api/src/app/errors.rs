use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use campusbill_infra::services::BillingError;

/// Map a service error onto the wire contract.
///
/// Store failures are logged in full and leave the process as an opaque 500;
/// every other kind carries its own message.
pub fn billing_error_to_response(err: BillingError) -> axum::response::Response {
    match err {
        BillingError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        BillingError::InvalidAmount(msg) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_amount", msg)
        }
        BillingError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        BillingError::Unauthorized => {
            json_error(StatusCode::UNAUTHORIZED, "unauthorized", "unauthorized")
        }
        BillingError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        BillingError::Overpayment { remaining } => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "overpayment",
            format!("payment would exceed invoice total (remaining: {remaining})"),
        ),
        BillingError::Invariant(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        BillingError::Store(e) => {
            tracing::error!("store failure: {e}");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                "storage backend failure",
            )
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
