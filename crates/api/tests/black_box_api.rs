use campusbill_auth::{JwtClaims, Role};
use campusbill_core::UserId;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::json;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        // Build app (same router as prod), but bind to an ephemeral port.
        let app = campusbill_api::app::build_app(jwt_secret.to_string()).await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(jwt_secret: &str, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> String {
    let claims = JwtClaims {
        sub: UserId::new(),
        roles: vec![Role::user()],
        issued_at,
        expires_at,
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn register_and_login(client: &reqwest::Client, base_url: &str) -> String {
    let res = client
        .post(format!("{base_url}/auth/register"))
        .json(&json!({
            "email": "bursar@example.com",
            "full_name": "Test Bursar",
            "password": "correct horse battery",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .post(format!("{base_url}/auth/login"))
        .json(&json!({
            "email": "bursar@example.com",
            "password": "correct horse battery",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["token_type"], "bearer");
    body["access_token"].as_str().unwrap().to_string()
}

async fn create_school(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    name: &str,
) -> String {
    let res = client
        .post(format!("{base_url}/schools"))
        .bearer_auth(token)
        .json(&json!({ "name": name }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    body["id"].as_str().unwrap().to_string()
}

async fn create_student(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    school_id: &str,
    first_name: &str,
) -> String {
    let res = client
        .post(format!("{base_url}/students"))
        .bearer_auth(token)
        .json(&json!({
            "school_id": school_id,
            "first_name": first_name,
            "last_name": "Student",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    body["id"].as_str().unwrap().to_string()
}

/// Create an invoice with a single line item and return the response body.
async fn create_invoice(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    student_id: &str,
    issue_date: &str,
    unit_price: &str,
) -> serde_json::Value {
    let res = client
        .post(format!("{base_url}/invoices"))
        .bearer_auth(token)
        .json(&json!({
            "student_id": student_id,
            "issue_date": issue_date,
            "items": [
                { "description": "Tuition", "quantity": 1, "unit_price": unit_price },
            ],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    res.json().await.unwrap()
}

async fn record_payment(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    invoice_id: &str,
    amount: &str,
) -> reqwest::Response {
    client
        .post(format!("{base_url}/invoices/{invoice_id}/payments"))
        .bearer_auth(token)
        .json(&json!({ "amount": amount, "paid_date": "2025-09-15" }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_is_open_but_everything_else_requires_a_token() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/schools", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("{}/auth/me", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn expired_and_garbage_tokens_are_unauthorized() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();

    let now = Utc::now();
    let expired = mint_jwt(jwt_secret, now - ChronoDuration::hours(2), now - ChronoDuration::hours(1));
    let res = client
        .get(format!("{}/schools", srv.base_url))
        .bearer_auth(expired)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("{}/schools", srv.base_url))
        .bearer_auth("not.a.jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // A token signed with a different secret is rejected too.
    let forged = mint_jwt("other-secret", now, now + ChronoDuration::hours(1));
    let res = client
        .get(format!("{}/schools", srv.base_url))
        .bearer_auth(forged)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registration_login_and_me_round_trip() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();

    // Email is normalized on registration.
    let res = client
        .post(format!("{}/auth/register", srv.base_url))
        .json(&json!({
            "email": " Grace@Example.COM ",
            "full_name": "Grace Hopper",
            "password": "correct horse battery",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    assert_eq!(created["email"], "grace@example.com");

    // Login works with any casing of the same address.
    let res = client
        .post(format!("{}/auth/login", srv.base_url))
        .json(&json!({ "email": "GRACE@example.com", "password": "correct horse battery" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["token_type"], "bearer");
    let token = body["access_token"].as_str().unwrap();

    let res = client
        .get(format!("{}/auth/me", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let me: serde_json::Value = res.json().await.unwrap();
    assert_eq!(me["email"], "grace@example.com");
    assert_eq!(me["full_name"], "Grace Hopper");

    // Wrong password and unknown email read identically.
    let res = client
        .post(format!("{}/auth/login", srv.base_url))
        .json(&json!({ "email": "grace@example.com", "password": "wrong password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(format!("{}/auth/login", srv.base_url))
        .json(&json!({ "email": "nobody@example.com", "password": "correct horse battery" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Short passwords are rejected at registration.
    let res = client
        .post(format!("{}/auth/register", srv.base_url))
        .json(&json!({
            "email": "short@example.com",
            "full_name": "Short Password",
            "password": "short",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_registration_is_a_conflict() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();

    let payload = json!({
        "email": "twice@example.com",
        "full_name": "Registered Twice",
        "password": "correct horse battery",
    });

    let res = client
        .post(format!("{}/auth/register", srv.base_url))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .post(format!("{}/auth/register", srv.base_url))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn malformed_ids_are_bad_requests_and_unknown_ids_are_not_found() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &srv.base_url).await;

    for path in [
        "/schools/not-a-uuid",
        "/students/12345",
        "/invoices/xyz",
        "/schools/not-a-uuid/statement",
    ] {
        let res = client
            .get(format!("{}{}", srv.base_url, path))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "path: {path}");
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["error"], "invalid_id");
    }

    let missing = uuid::Uuid::now_v7();
    for path in [
        format!("/schools/{missing}"),
        format!("/students/{missing}"),
        format!("/invoices/{missing}"),
        format!("/schools/{missing}/statement"),
        format!("/students/{missing}/statement"),
    ] {
        let res = client
            .get(format!("{}{}", srv.base_url, path))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND, "path: {path}");
    }
}

#[tokio::test]
async fn school_crud_and_student_listing_paginate() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &srv.base_url).await;

    let school_id = create_school(&client, &srv.base_url, &token, "Northside Prep").await;

    let res = client
        .get(format!("{}/schools", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["items"].as_array().unwrap().len(), 1);

    let res = client
        .put(format!("{}/schools/{}", srv.base_url, school_id))
        .bearer_auth(&token)
        .json(&json!({ "name": "Northside Preparatory" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["name"], "Northside Preparatory");

    for name in ["Ada", "Brian", "Carol"] {
        create_student(&client, &srv.base_url, &token, &school_id, name).await;
    }

    let res = client
        .get(format!(
            "{}/schools/{}/students?limit=2&offset=0",
            srv.base_url, school_id
        ))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["items"].as_array().unwrap().len(), 2);

    let res = client
        .get(format!(
            "{}/schools/{}/students?limit=2&offset=2",
            srv.base_url, school_id
        ))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["items"].as_array().unwrap().len(), 1);

    // Soft-deleting the school hides it and blocks new enrollment.
    let res = client
        .delete(format!("{}/schools/{}", srv.base_url, school_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .get(format!("{}/schools/{}", srv.base_url, school_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .post(format!("{}/students", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "school_id": school_id,
            "first_name": "Late",
            "last_name": "Enrollee",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invoice_creation_requires_items_and_reports_balance() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &srv.base_url).await;

    let school_id = create_school(&client, &srv.base_url, &token, "Northside Prep").await;
    let student_id = create_student(&client, &srv.base_url, &token, &school_id, "Ada").await;

    // No items: rejected before anything is written.
    let res = client
        .post(format!("{}/invoices", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "student_id": student_id,
            "issue_date": "2025-09-01",
            "items": [],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    let res = client
        .post(format!("{}/invoices", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "student_id": student_id,
            "issue_date": "2025-09-01",
            "due_date": "2025-09-30",
            "items": [
                { "description": "Tuition", "quantity": 1, "unit_price": "450.00" },
                { "description": "Books", "quantity": 2, "unit_price": "25.00" },
            ],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let invoice: serde_json::Value = res.json().await.unwrap();
    assert_eq!(invoice["total"], "500.00");
    assert_eq!(invoice["status"], "active");
    assert_eq!(invoice["items"].as_array().unwrap().len(), 2);
    assert_eq!(invoice["balance"]["paid"], "0.00");
    assert_eq!(invoice["balance"]["pending"], "500.00");

    let invoice_id = invoice["id"].as_str().unwrap();
    let res = client
        .get(format!("{}/invoices/{}", srv.base_url, invoice_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let fetched: serde_json::Value = res.json().await.unwrap();
    assert_eq!(fetched["total"], "500.00");

    let res = client
        .get(format!("{}/students/{}/invoices", srv.base_url, student_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let listing: serde_json::Value = res.json().await.unwrap();
    assert_eq!(listing["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn payment_sequence_with_overpayment_rejection() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &srv.base_url).await;

    let school_id = create_school(&client, &srv.base_url, &token, "Northside Prep").await;
    let student_id = create_student(&client, &srv.base_url, &token, &school_id, "Ada").await;
    let invoice =
        create_invoice(&client, &srv.base_url, &token, &student_id, "2025-09-01", "100.00").await;
    let invoice_id = invoice["id"].as_str().unwrap();

    let res = record_payment(&client, &srv.base_url, &token, invoice_id, "90.00").await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let receipt: serde_json::Value = res.json().await.unwrap();
    assert_eq!(receipt["payment"]["amount"], "90.00");
    assert_eq!(receipt["balance"]["paid"], "90.00");
    assert_eq!(receipt["balance"]["pending"], "10.00");

    // 90.00 + 15.00 would exceed 100.00: rejected, state unchanged.
    let res = record_payment(&client, &srv.base_url, &token, invoice_id, "15.00").await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "overpayment");
    assert!(body["message"].as_str().unwrap().contains("10.00"));

    // The exact remainder still fits.
    let res = record_payment(&client, &srv.base_url, &token, invoice_id, "10.00").await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let receipt: serde_json::Value = res.json().await.unwrap();
    assert_eq!(receipt["balance"]["paid"], "100.00");
    assert_eq!(receipt["balance"]["pending"], "0.00");

    let res = client
        .get(format!("{}/students/{}/statement", srv.base_url, student_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let statement: serde_json::Value = res.json().await.unwrap();
    assert_eq!(statement["totals"]["total_paid"], "100.00");
    assert_eq!(statement["totals"]["total_pending"], "0.00");
}

#[tokio::test]
async fn invalid_payment_amounts_are_rejected_before_any_write() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &srv.base_url).await;

    let school_id = create_school(&client, &srv.base_url, &token, "Northside Prep").await;
    let student_id = create_student(&client, &srv.base_url, &token, &school_id, "Ada").await;
    let invoice =
        create_invoice(&client, &srv.base_url, &token, &student_id, "2025-09-01", "100.00").await;
    let invoice_id = invoice["id"].as_str().unwrap();

    for amount in ["0.00", "-5.00", "1.005", "not-a-number"] {
        let res = record_payment(&client, &srv.base_url, &token, invoice_id, amount).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "amount: {amount}");
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["error"], "invalid_amount");
    }

    // Payments against an unknown invoice are not found.
    let missing = uuid::Uuid::now_v7().to_string();
    let res = record_payment(&client, &srv.base_url, &token, &missing, "10.00").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // Nothing was written along the way.
    let res = client
        .get(format!("{}/invoices/{}", srv.base_url, invoice_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let fetched: serde_json::Value = res.json().await.unwrap();
    assert_eq!(fetched["balance"]["paid"], "0.00");
}

#[tokio::test]
async fn cancelled_invoices_keep_payments_but_stop_pending() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &srv.base_url).await;

    let school_id = create_school(&client, &srv.base_url, &token, "Northside Prep").await;
    let student_id = create_student(&client, &srv.base_url, &token, &school_id, "Ada").await;
    let invoice =
        create_invoice(&client, &srv.base_url, &token, &student_id, "2025-09-01", "200.00").await;
    let invoice_id = invoice["id"].as_str().unwrap();

    let res = record_payment(&client, &srv.base_url, &token, invoice_id, "50.00").await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .post(format!("{}/invoices/{}/cancel", srv.base_url, invoice_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let cancelled: serde_json::Value = res.json().await.unwrap();
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(cancelled["balance"]["paid"], "50.00");
    assert_eq!(cancelled["balance"]["pending"], "0.00");

    // Cancelling twice is a conflict.
    let res = client
        .post(format!("{}/invoices/{}/cancel", srv.base_url, invoice_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // New payments and item mutations are refused.
    let res = record_payment(&client, &srv.base_url, &token, invoice_id, "10.00").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .post(format!("{}/invoices/{}/items", srv.base_url, invoice_id))
        .bearer_auth(&token)
        .json(&json!({ "description": "Late fee", "quantity": 1, "unit_price": "5.00" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // The payment history stays visible.
    let res = client
        .get(format!("{}/invoices/{}/payments", srv.base_url, invoice_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let payments: serde_json::Value = res.json().await.unwrap();
    assert_eq!(payments["items"].as_array().unwrap().len(), 1);

    // And the statement reports it with zero pending.
    let res = client
        .get(format!("{}/students/{}/statement", srv.base_url, student_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let statement: serde_json::Value = res.json().await.unwrap();
    assert_eq!(statement["rows"][0]["status"], "cancelled");
    assert_eq!(statement["totals"]["total_billed"], "200.00");
    assert_eq!(statement["totals"]["total_paid"], "50.00");
    assert_eq!(statement["totals"]["total_pending"], "0.00");
}

#[tokio::test]
async fn soft_deleted_students_drop_out_of_school_statements() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &srv.base_url).await;

    let school_id = create_school(&client, &srv.base_url, &token, "Northside Prep").await;
    let ada = create_student(&client, &srv.base_url, &token, &school_id, "Ada").await;
    let brian = create_student(&client, &srv.base_url, &token, &school_id, "Brian").await;

    create_invoice(&client, &srv.base_url, &token, &ada, "2025-09-01", "100.00").await;
    create_invoice(&client, &srv.base_url, &token, &brian, "2025-09-02", "40.00").await;

    let res = client
        .get(format!("{}/schools/{}/statement", srv.base_url, school_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let statement: serde_json::Value = res.json().await.unwrap();
    assert_eq!(statement["student_count"], 2);
    assert_eq!(statement["totals"]["total_billed"], "140.00");
    assert!(statement["rows"].is_null());

    let res = client
        .delete(format!("{}/students/{}", srv.base_url, brian))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .get(format!(
            "{}/schools/{}/statement?include_invoices=true",
            srv.base_url, school_id
        ))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let statement: serde_json::Value = res.json().await.unwrap();
    assert_eq!(statement["student_count"], 1);
    assert_eq!(statement["totals"]["total_billed"], "100.00");
    assert_eq!(statement["rows"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn statement_rows_are_ordered_and_period_bounded() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &srv.base_url).await;

    let school_id = create_school(&client, &srv.base_url, &token, "Northside Prep").await;
    let student_id = create_student(&client, &srv.base_url, &token, &school_id, "Ada").await;

    // Created out of date order on purpose.
    create_invoice(&client, &srv.base_url, &token, &student_id, "2025-03-01", "10.00").await;
    create_invoice(&client, &srv.base_url, &token, &student_id, "2025-01-15", "20.00").await;
    create_invoice(&client, &srv.base_url, &token, &student_id, "2025-02-10", "30.00").await;

    let res = client
        .get(format!("{}/students/{}/statement", srv.base_url, student_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let statement: serde_json::Value = res.json().await.unwrap();
    let dates = statement["rows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["issue_date"].as_str().unwrap().to_string())
        .collect::<Vec<_>>();
    assert_eq!(dates, ["2025-01-15", "2025-02-10", "2025-03-01"]);
    assert_eq!(statement["totals"]["total_billed"], "60.00");

    // Period bounds are inclusive on both ends.
    let res = client
        .get(format!(
            "{}/students/{}/statement?start_date=2025-01-15&end_date=2025-02-10",
            srv.base_url, student_id
        ))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let statement: serde_json::Value = res.json().await.unwrap();
    assert_eq!(statement["rows"].as_array().unwrap().len(), 2);
    assert_eq!(statement["totals"]["total_billed"], "50.00");

    let res = client
        .get(format!(
            "{}/students/{}/statement?start_date=2025-01-16&end_date=2025-02-09",
            srv.base_url, student_id
        ))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let statement: serde_json::Value = res.json().await.unwrap();
    assert_eq!(statement["rows"].as_array().unwrap().len(), 0);
    assert_eq!(statement["totals"]["total_billed"], "0.00");

    // A student with no invoices gets an empty statement, all zeros.
    let idle = create_student(&client, &srv.base_url, &token, &school_id, "Idle").await;
    let res = client
        .get(format!("{}/students/{}/statement", srv.base_url, idle))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let statement: serde_json::Value = res.json().await.unwrap();
    assert_eq!(statement["rows"].as_array().unwrap().len(), 0);
    assert_eq!(statement["totals"]["total_billed"], "0.00");
    assert_eq!(statement["totals"]["total_paid"], "0.00");
    assert_eq!(statement["totals"]["total_pending"], "0.00");
}

#[tokio::test]
async fn item_management_keeps_the_total_consistent() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &srv.base_url).await;

    let school_id = create_school(&client, &srv.base_url, &token, "Northside Prep").await;
    let student_id = create_student(&client, &srv.base_url, &token, &school_id, "Ada").await;
    let invoice =
        create_invoice(&client, &srv.base_url, &token, &student_id, "2025-09-01", "100.00").await;
    let invoice_id = invoice["id"].as_str().unwrap();
    let tuition_id = invoice["items"][0]["id"].as_str().unwrap();

    let res = client
        .post(format!("{}/invoices/{}/items", srv.base_url, invoice_id))
        .bearer_auth(&token)
        .json(&json!({ "description": "Books", "quantity": 2, "unit_price": "12.50" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["invoice_total"], "125.00");
    let books_id = body["item"]["id"].as_str().unwrap().to_string();

    let res = client
        .put(format!(
            "{}/invoices/{}/items/{}",
            srv.base_url, invoice_id, tuition_id
        ))
        .bearer_auth(&token)
        .json(&json!({ "quantity": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["item"]["amount"], "200.00");
    assert_eq!(body["invoice_total"], "225.00");

    let res = client
        .delete(format!(
            "{}/invoices/{}/items/{}",
            srv.base_url, invoice_id, books_id
        ))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .get(format!("{}/invoices/{}", srv.base_url, invoice_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let fetched: serde_json::Value = res.json().await.unwrap();
    assert_eq!(fetched["total"], "200.00");
    assert_eq!(fetched["items"].as_array().unwrap().len(), 1);

    // The last active item cannot be removed.
    let res = client
        .delete(format!(
            "{}/invoices/{}/items/{}",
            srv.base_url, invoice_id, tuition_id
        ))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_payments_admit_exactly_one_winner() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &srv.base_url).await;

    let school_id = create_school(&client, &srv.base_url, &token, "Northside Prep").await;
    let student_id = create_student(&client, &srv.base_url, &token, &school_id, "Ada").await;
    let invoice =
        create_invoice(&client, &srv.base_url, &token, &student_id, "2025-09-01", "100.00").await;
    let invoice_id = invoice["id"].as_str().unwrap().to_string();

    // Four 60.00 payments race on a 100.00 invoice; only one can fit.
    let mut handles = Vec::new();
    for _ in 0..4 {
        let client = client.clone();
        let base_url = srv.base_url.clone();
        let token = token.clone();
        let invoice_id = invoice_id.clone();
        handles.push(tokio::spawn(async move {
            record_payment(&client, &base_url, &token, &invoice_id, "60.00")
                .await
                .status()
        }));
    }

    let mut created = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::CREATED => created += 1,
            StatusCode::UNPROCESSABLE_ENTITY => rejected += 1,
            other => panic!("unexpected status from concurrent payment: {other}"),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(rejected, 3);

    let res = client
        .get(format!("{}/invoices/{}", srv.base_url, invoice_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let fetched: serde_json::Value = res.json().await.unwrap();
    assert_eq!(fetched["balance"]["paid"], "60.00");
    assert_eq!(fetched["balance"]["pending"], "40.00");
}
