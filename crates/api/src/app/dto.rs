use std::str::FromStr;

use axum::http::StatusCode;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

use campusbill_auth::User;
use campusbill_billing::{
    Invoice, InvoiceBalance, InvoiceItem, Payment, SchoolStatement, StatementPeriod, StatementRow,
    StatementTotals, StudentStatement,
};
use campusbill_directory::{School, Student};
use campusbill_infra::services::{InvoiceDetails, NewInvoiceItem, PaymentReceipt};
use campusbill_infra::store::Page;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub full_name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateSchoolRequest {
    pub name: String,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSchoolRequest {
    pub name: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateStudentRequest {
    pub school_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStudentRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InvoiceItemRequest {
    pub description: String,
    pub quantity: i32,
    pub unit_price: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    pub student_id: String,
    pub issue_date: String, // ISO-8601 date (YYYY-MM-DD)
    pub due_date: Option<String>,
    pub items: Vec<InvoiceItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateInvoiceItemRequest {
    pub description: Option<String>,
    pub quantity: Option<i32>,
    pub unit_price: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub amount: String,
    pub paid_date: String,
}

#[derive(Debug, Deserialize)]
pub struct StatementQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub include_invoices: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

// -------------------------
// Parse helpers (failures map onto 400s)
// -------------------------

pub fn parse_id<T: FromStr>(raw: &str, what: &'static str) -> Result<T, axum::response::Response> {
    raw.parse::<T>().map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what}"))
    })
}

pub fn parse_date(raw: &str, what: &'static str) -> Result<NaiveDate, axum::response::Response> {
    raw.parse::<NaiveDate>().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_date",
            format!("{what} must be an ISO-8601 date (YYYY-MM-DD)"),
        )
    })
}

pub fn parse_money(raw: &str, what: &'static str) -> Result<Decimal, axum::response::Response> {
    Decimal::from_str(raw).map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_amount",
            format!("{what} must be a decimal string like \"100.00\""),
        )
    })
}

pub fn to_new_item(req: InvoiceItemRequest) -> Result<NewInvoiceItem, axum::response::Response> {
    Ok(NewInvoiceItem {
        description: req.description,
        quantity: req.quantity,
        unit_price: parse_money(&req.unit_price, "unit_price")?,
    })
}

pub fn to_period(query: &StatementQuery) -> Result<StatementPeriod, axum::response::Response> {
    let start = query
        .start_date
        .as_deref()
        .map(|d| parse_date(d, "start_date"))
        .transpose()?;
    let end = query
        .end_date
        .as_deref()
        .map(|d| parse_date(d, "end_date"))
        .transpose()?;
    Ok(StatementPeriod::between(start, end))
}

pub fn to_page(query: &PageQuery) -> Page {
    let default = Page::default();
    Page::new(
        query.limit.unwrap_or(default.limit),
        query.offset.unwrap_or(default.offset),
    )
}

// -------------------------
// JSON mapping helpers
// -------------------------

/// Money serializes as a string with exactly two decimal places.
pub fn money_str(amount: Decimal) -> String {
    format!("{amount:.2}")
}

pub fn school_to_json(school: &School) -> serde_json::Value {
    serde_json::json!({
        "id": school.id.to_string(),
        "name": school.name,
        "address": school.address,
        "created_at": school.created_at.to_rfc3339(),
        "updated_at": school.updated_at.to_rfc3339(),
    })
}

pub fn student_to_json(student: &Student) -> serde_json::Value {
    serde_json::json!({
        "id": student.id.to_string(),
        "school_id": student.school_id.to_string(),
        "first_name": student.first_name,
        "last_name": student.last_name,
        "email": student.email,
        "created_at": student.created_at.to_rfc3339(),
        "updated_at": student.updated_at.to_rfc3339(),
    })
}

pub fn balance_to_json(balance: &InvoiceBalance) -> serde_json::Value {
    serde_json::json!({
        "total": money_str(balance.total),
        "paid": money_str(balance.paid),
        "pending": money_str(balance.pending),
    })
}

pub fn invoice_to_json(invoice: &Invoice) -> serde_json::Value {
    serde_json::json!({
        "id": invoice.id.to_string(),
        "student_id": invoice.student_id.to_string(),
        "status": invoice.status.as_str(),
        "issue_date": invoice.issue_date.to_string(),
        "due_date": invoice.due_date.map(|d| d.to_string()),
        "total": money_str(invoice.total),
    })
}

pub fn item_to_json(item: &InvoiceItem) -> serde_json::Value {
    serde_json::json!({
        "id": item.id.to_string(),
        "invoice_id": item.invoice_id.to_string(),
        "description": item.description,
        "quantity": item.quantity,
        "unit_price": money_str(item.unit_price),
        "amount": money_str(item.amount),
    })
}

pub fn invoice_details_to_json(details: &InvoiceDetails) -> serde_json::Value {
    serde_json::json!({
        "id": details.invoice.id.to_string(),
        "student_id": details.invoice.student_id.to_string(),
        "status": details.invoice.status.as_str(),
        "issue_date": details.invoice.issue_date.to_string(),
        "due_date": details.invoice.due_date.map(|d| d.to_string()),
        "total": money_str(details.invoice.total),
        "items": details.items.iter().map(item_to_json).collect::<Vec<_>>(),
        "balance": balance_to_json(&details.balance),
    })
}

pub fn payment_to_json(payment: &Payment) -> serde_json::Value {
    serde_json::json!({
        "id": payment.id.to_string(),
        "invoice_id": payment.invoice_id.to_string(),
        "amount": money_str(payment.amount),
        "paid_date": payment.paid_date.to_string(),
        "created_at": payment.created_at.to_rfc3339(),
    })
}

pub fn receipt_to_json(receipt: &PaymentReceipt) -> serde_json::Value {
    serde_json::json!({
        "payment": payment_to_json(&receipt.payment),
        "balance": balance_to_json(&receipt.balance),
    })
}

pub fn statement_row_to_json(row: &StatementRow) -> serde_json::Value {
    serde_json::json!({
        "invoice_id": row.invoice_id.to_string(),
        "issue_date": row.issue_date.to_string(),
        "due_date": row.due_date.map(|d| d.to_string()),
        "status": row.status.as_str(),
        "total": money_str(row.balance.total),
        "paid": money_str(row.balance.paid),
        "pending": money_str(row.balance.pending),
    })
}

pub fn totals_to_json(totals: &StatementTotals) -> serde_json::Value {
    serde_json::json!({
        "total_billed": money_str(totals.total_billed),
        "total_paid": money_str(totals.total_paid),
        "total_pending": money_str(totals.total_pending),
    })
}

pub fn student_statement_to_json(statement: &StudentStatement) -> serde_json::Value {
    serde_json::json!({
        "student_id": statement.student_id.to_string(),
        "student_name": statement.student_name,
        "rows": statement.rows.iter().map(statement_row_to_json).collect::<Vec<_>>(),
        "totals": totals_to_json(&statement.totals),
    })
}

pub fn school_statement_to_json(statement: &SchoolStatement) -> serde_json::Value {
    serde_json::json!({
        "school_id": statement.school_id.to_string(),
        "school_name": statement.school_name,
        "student_count": statement.student_count,
        "totals": totals_to_json(&statement.totals),
        "rows": statement
            .rows
            .as_ref()
            .map(|rows| rows.iter().map(statement_row_to_json).collect::<Vec<_>>()),
    })
}

pub fn user_to_json(user: &User) -> serde_json::Value {
    serde_json::json!({
        "id": user.id.to_string(),
        "email": user.email,
        "full_name": user.full_name,
        "roles": user.roles.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
        "created_at": user.created_at.to_rfc3339(),
    })
}
