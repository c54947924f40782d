use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use campusbill_core::SchoolId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_school).get(list_schools))
        .route(
            "/:id",
            get(get_school).put(update_school).delete(delete_school),
        )
        .route("/:id/students", get(list_students))
        .route("/:id/statement", get(school_statement))
}

pub async fn create_school(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateSchoolRequest>,
) -> axum::response::Response {
    match services.schools.create(body.name, body.address).await {
        Ok(school) => (StatusCode::CREATED, Json(dto::school_to_json(&school))).into_response(),
        Err(e) => errors::billing_error_to_response(e),
    }
}

pub async fn list_schools(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.schools.list().await {
        Ok(schools) => {
            let items = schools.iter().map(dto::school_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::billing_error_to_response(e),
    }
}

pub async fn get_school(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: SchoolId = match dto::parse_id(&id, "school id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.schools.get(id).await {
        Ok(school) => (StatusCode::OK, Json(dto::school_to_json(&school))).into_response(),
        Err(e) => errors::billing_error_to_response(e),
    }
}

pub async fn update_school(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateSchoolRequest>,
) -> axum::response::Response {
    let id: SchoolId = match dto::parse_id(&id, "school id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.schools.update(id, body.name, body.address).await {
        Ok(school) => (StatusCode::OK, Json(dto::school_to_json(&school))).into_response(),
        Err(e) => errors::billing_error_to_response(e),
    }
}

pub async fn delete_school(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: SchoolId = match dto::parse_id(&id, "school id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.schools.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::billing_error_to_response(e),
    }
}

pub async fn list_students(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(page): Query<dto::PageQuery>,
) -> axum::response::Response {
    let id: SchoolId = match dto::parse_id(&id, "school id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.students.list(id, dto::to_page(&page)).await {
        Ok(students) => {
            let items = students.iter().map(dto::student_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::billing_error_to_response(e),
    }
}

pub async fn school_statement(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<dto::StatementQuery>,
) -> axum::response::Response {
    let id: SchoolId = match dto::parse_id(&id, "school id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let period = match dto::to_period(&query) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let include_invoices = query.include_invoices.unwrap_or(false);

    match services
        .statements
        .school_statement(id, period, include_invoices)
        .await
    {
        Ok(statement) => (
            StatusCode::OK,
            Json(dto::school_statement_to_json(&statement)),
        )
            .into_response(),
        Err(e) => errors::billing_error_to_response(e),
    }
}
