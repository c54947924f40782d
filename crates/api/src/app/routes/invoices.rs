use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};

use campusbill_core::{InvoiceId, InvoiceItemId, StudentId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_invoice))
        .route("/:id", get(get_invoice).delete(delete_invoice))
        .route("/:id/cancel", post(cancel_invoice))
        .route("/:id/items", post(add_item))
        .route("/:id/items/:item_id", put(update_item).delete(remove_item))
        .route("/:id/payments", post(record_payment).get(list_payments))
}

pub async fn create_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateInvoiceRequest>,
) -> axum::response::Response {
    let student_id: StudentId = match dto::parse_id(&body.student_id, "student id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let issue_date = match dto::parse_date(&body.issue_date, "issue_date") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let due_date = match body
        .due_date
        .as_deref()
        .map(|d| dto::parse_date(d, "due_date"))
        .transpose()
    {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let mut items = Vec::with_capacity(body.items.len());
    for item in body.items {
        match dto::to_new_item(item) {
            Ok(v) => items.push(v),
            Err(resp) => return resp,
        }
    }

    match services
        .invoices
        .create(student_id, issue_date, due_date, items)
        .await
    {
        Ok(details) => (
            StatusCode::CREATED,
            Json(dto::invoice_details_to_json(&details)),
        )
            .into_response(),
        Err(e) => errors::billing_error_to_response(e),
    }
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: InvoiceId = match dto::parse_id(&id, "invoice id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.invoices.get(id).await {
        Ok(details) => {
            (StatusCode::OK, Json(dto::invoice_details_to_json(&details))).into_response()
        }
        Err(e) => errors::billing_error_to_response(e),
    }
}

pub async fn delete_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: InvoiceId = match dto::parse_id(&id, "invoice id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.invoices.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::billing_error_to_response(e),
    }
}

pub async fn cancel_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: InvoiceId = match dto::parse_id(&id, "invoice id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.invoices.cancel(id).await {
        Ok(details) => {
            (StatusCode::OK, Json(dto::invoice_details_to_json(&details))).into_response()
        }
        Err(e) => errors::billing_error_to_response(e),
    }
}

pub async fn add_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::InvoiceItemRequest>,
) -> axum::response::Response {
    let invoice_id: InvoiceId = match dto::parse_id(&id, "invoice id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let input = match dto::to_new_item(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.invoices.add_item(invoice_id, input).await {
        Ok((item, total)) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "item": dto::item_to_json(&item),
                "invoice_total": dto::money_str(total),
            })),
        )
            .into_response(),
        Err(e) => errors::billing_error_to_response(e),
    }
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, item_id)): Path<(String, String)>,
    Json(body): Json<dto::UpdateInvoiceItemRequest>,
) -> axum::response::Response {
    let invoice_id: InvoiceId = match dto::parse_id(&id, "invoice id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let item_id: InvoiceItemId = match dto::parse_id(&item_id, "item id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let unit_price = match body
        .unit_price
        .as_deref()
        .map(|p| dto::parse_money(p, "unit_price"))
        .transpose()
    {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .invoices
        .update_item(invoice_id, item_id, body.description, body.quantity, unit_price)
        .await
    {
        Ok((item, total)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "item": dto::item_to_json(&item),
                "invoice_total": dto::money_str(total),
            })),
        )
            .into_response(),
        Err(e) => errors::billing_error_to_response(e),
    }
}

pub async fn remove_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, item_id)): Path<(String, String)>,
) -> axum::response::Response {
    let invoice_id: InvoiceId = match dto::parse_id(&id, "invoice id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let item_id: InvoiceItemId = match dto::parse_id(&item_id, "item id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.invoices.remove_item(invoice_id, item_id).await {
        Ok(_total) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::billing_error_to_response(e),
    }
}

pub async fn record_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::RecordPaymentRequest>,
) -> axum::response::Response {
    let invoice_id: InvoiceId = match dto::parse_id(&id, "invoice id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let amount = match dto::parse_money(&body.amount, "amount") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let paid_date = match dto::parse_date(&body.paid_date, "paid_date") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.payments.record(invoice_id, amount, paid_date).await {
        Ok(receipt) => {
            (StatusCode::CREATED, Json(dto::receipt_to_json(&receipt))).into_response()
        }
        Err(e) => errors::billing_error_to_response(e),
    }
}

pub async fn list_payments(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: InvoiceId = match dto::parse_id(&id, "invoice id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.payments.list(id).await {
        Ok(payments) => {
            let items = payments.iter().map(dto::payment_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::billing_error_to_response(e),
    }
}
