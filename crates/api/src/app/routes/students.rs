use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use campusbill_core::{SchoolId, StudentId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_student))
        .route(
            "/:id",
            get(get_student).put(update_student).delete(delete_student),
        )
        .route("/:id/invoices", get(list_invoices))
        .route("/:id/statement", get(student_statement))
}

pub async fn create_student(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateStudentRequest>,
) -> axum::response::Response {
    let school_id: SchoolId = match dto::parse_id(&body.school_id, "school id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .students
        .create(school_id, body.first_name, body.last_name, body.email)
        .await
    {
        Ok(student) => (StatusCode::CREATED, Json(dto::student_to_json(&student))).into_response(),
        Err(e) => errors::billing_error_to_response(e),
    }
}

pub async fn get_student(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: StudentId = match dto::parse_id(&id, "student id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.students.get(id).await {
        Ok(student) => (StatusCode::OK, Json(dto::student_to_json(&student))).into_response(),
        Err(e) => errors::billing_error_to_response(e),
    }
}

pub async fn update_student(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateStudentRequest>,
) -> axum::response::Response {
    let id: StudentId = match dto::parse_id(&id, "student id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .students
        .update(id, body.first_name, body.last_name, body.email)
        .await
    {
        Ok(student) => (StatusCode::OK, Json(dto::student_to_json(&student))).into_response(),
        Err(e) => errors::billing_error_to_response(e),
    }
}

pub async fn delete_student(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: StudentId = match dto::parse_id(&id, "student id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.students.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::billing_error_to_response(e),
    }
}

pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: StudentId = match dto::parse_id(&id, "student id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.invoices.list_for_student(id).await {
        Ok(invoices) => {
            let items = invoices.iter().map(dto::invoice_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::billing_error_to_response(e),
    }
}

pub async fn student_statement(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<dto::StatementQuery>,
) -> axum::response::Response {
    let id: StudentId = match dto::parse_id(&id, "student id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let period = match dto::to_period(&query) {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    match services.statements.student_statement(id, period).await {
        Ok(statement) => (
            StatusCode::OK,
            Json(dto::student_statement_to_json(&statement)),
        )
            .into_response(),
        Err(e) => errors::billing_error_to_response(e),
    }
}
