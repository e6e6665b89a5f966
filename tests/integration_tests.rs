use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use tower::ServiceExt;

use slotbook::config::AppConfig;
use slotbook::db;
use slotbook::services::assistant::{LlmProvider, Message};
use slotbook::state::AppState;

// ── Mock LLM ──

struct MockLlm;

#[async_trait]
impl LlmProvider for MockLlm {
    async fn chat(&self, _system_prompt: &str, messages: &[Message]) -> anyhow::Result<String> {
        let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");

        // Deterministic canned responses keyed on the user message.
        if last.contains("add") {
            Ok(r#"{"reply":"I staged a Beard Trim service for you to confirm.","tool":{"name":"create_service","args":{"name":"Beard Trim","duration_minutes":15,"price_cents":1500,"available_days":null}}}"#.to_string())
        } else if last.contains("list") {
            Ok(r#"{"reply":"Here is your catalog.","tool":{"name":"list_services"}}"#.to_string())
        } else if last.contains("garbled") {
            Ok("this is not json at all".to_string())
        } else {
            Ok(r#"{"reply":"Happy to help with your catalog.","tool":null}"#.to_string())
        }
    }
}

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        llm_provider: "ollama".to_string(),
        groq_api_key: String::new(),
        groq_model: String::new(),
        ollama_url: "http://localhost:11434".to_string(),
        ollama_model: "llama3.2".to_string(),
        slot_interval_minutes: 30,
    }
}

fn test_app() -> Router {
    let conn = db::init_db(":memory:").unwrap();
    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: test_config(),
        llm: Box::new(MockLlm),
    });
    slotbook::app(state)
}

fn request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let res: Response<_> = app
        .clone()
        .oneshot(request(method, uri, token, body))
        .await
        .unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Registers an owner and returns their API token.
async fn register(app: &Router, name: &str, email: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/register",
        None,
        Some(serde_json::json!({"name": name, "email": email})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["api_token"].as_str().unwrap().to_string()
}

/// Creates a Monday-to-Friday 09:00-17:00 business, returns its id.
async fn create_business(app: &Router, token: &str) -> String {
    let hours = serde_json::json!({
        "mon": {"open": "09:00", "close": "17:00"},
        "tue": {"open": "09:00", "close": "17:00"},
        "wed": {"open": "09:00", "close": "17:00"},
        "thu": {"open": "09:00", "close": "17:00"},
        "fri": {"open": "09:00", "close": "17:00"},
    });
    let (status, body) = send(
        app,
        "POST",
        "/api/my/business",
        Some(token),
        Some(serde_json::json!({"name": "Test Salon", "working_hours": hours})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

async fn create_service(app: &Router, token: &str, name: &str, duration: i64) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/my/services",
        Some(token),
        Some(serde_json::json!({
            "name": name,
            "duration_minutes": duration,
            "price_cents": 3500,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

// 2030-01-07 is a Monday, comfortably in the future so lead-time filtering
// never interferes.
const MONDAY: &str = "2030-01-07";

async fn book_slot(
    app: &Router,
    business_id: &str,
    service_id: &str,
    start: &str,
) -> (StatusCode, serde_json::Value) {
    send(
        app,
        "POST",
        &format!("/api/businesses/{business_id}/bookings"),
        None,
        Some(serde_json::json!({
            "service_id": service_id,
            "date": MONDAY,
            "start_time": start,
            "customer_name": "Bob",
            "customer_email": "bob@example.com",
        })),
    )
    .await
}

// ── Health ──

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

// ── Registration and business ──

#[tokio::test]
async fn test_register_returns_token_once() {
    let app = test_app();
    let token = register(&app, "Alice", "alice@example.com").await;
    assert!(!token.is_empty());

    let business_id = create_business(&app, &token).await;

    // Owner view of the business works with the token.
    let (status, body) = send(&app, "GET", "/api/my/business", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], business_id.as_str());
    assert_eq!(body["name"], "Test Salon");
}

#[tokio::test]
async fn test_register_duplicate_email() {
    let app = test_app();
    register(&app, "Alice", "alice@example.com").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/register",
        None,
        Some(serde_json::json!({"name": "Imposter", "email": "alice@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("already registered"));
}

#[tokio::test]
async fn test_owner_endpoints_require_auth() {
    let app = test_app();

    let (status, _) = send(&app, "GET", "/api/my/business", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/api/my/business", Some("bogus"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_second_business_rejected() {
    let app = test_app();
    let token = register(&app, "Alice", "alice@example.com").await;
    create_business(&app, &token).await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/my/business",
        Some(&token),
        Some(serde_json::json!({"name": "Another", "working_hours": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_business_hours_validated() {
    let app = test_app();
    let token = register(&app, "Alice", "alice@example.com").await;
    create_business(&app, &token).await;

    // open after close
    let (status, _) = send(
        &app,
        "PATCH",
        "/api/my/business",
        Some(&token),
        Some(serde_json::json!({
            "working_hours": {"mon": {"open": "17:00", "close": "09:00"}}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "PATCH",
        "/api/my/business",
        Some(&token),
        Some(serde_json::json!({"name": "Renamed Salon"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Renamed Salon");
}

// ── Service catalog ──

#[tokio::test]
async fn test_service_crud() {
    let app = test_app();
    let token = register(&app, "Alice", "alice@example.com").await;
    create_business(&app, &token).await;
    let service_id = create_service(&app, &token, "Haircut", 30).await;

    let (status, body) = send(&app, "GET", "/api/my/services", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/api/my/services/{service_id}"),
        Some(&token),
        Some(serde_json::json!({"price_cents": 4200})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["price_cents"], 4200);

    // Soft delete: gone from the default list, visible with the flag.
    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/my/services/{service_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", "/api/my/services", Some(&token), None).await;
    assert!(body.as_array().unwrap().is_empty());

    let (_, body) = send(
        &app,
        "GET",
        "/api/my/services?include_inactive=true",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["is_active"], false);
}

#[tokio::test]
async fn test_service_duration_floor() {
    let app = test_app();
    let token = register(&app, "Alice", "alice@example.com").await;
    create_business(&app, &token).await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/my/services",
        Some(&token),
        Some(serde_json::json!({"name": "Blink", "duration_minutes": 5, "price_cents": 100})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ── Availability ──

#[tokio::test]
async fn test_availability_full_day() {
    let app = test_app();
    let token = register(&app, "Alice", "alice@example.com").await;
    let business_id = create_business(&app, &token).await;
    let service_id = create_service(&app, &token, "Haircut", 30).await;

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/businesses/{business_id}/availability?service_id={service_id}&date={MONDAY}"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let slots = body["slots"].as_array().unwrap();
    // 09:00 through 16:30 on a 30-minute grid.
    assert_eq!(slots.len(), 16);
    assert_eq!(slots[0], "09:00");
    assert_eq!(slots[15], "16:30");
}

#[tokio::test]
async fn test_availability_closed_day() {
    let app = test_app();
    let token = register(&app, "Alice", "alice@example.com").await;
    let business_id = create_business(&app, &token).await;
    let service_id = create_service(&app, &token, "Haircut", 30).await;

    // 2030-01-12 is a Saturday; the test business only opens Mon-Fri.
    let (status, body) = send(
        &app,
        "GET",
        &format!(
            "/api/businesses/{business_id}/availability?service_id={service_id}&date=2030-01-12"
        ),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["slots"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_availability_excludes_booked_slots() {
    let app = test_app();
    let token = register(&app, "Alice", "alice@example.com").await;
    let business_id = create_business(&app, &token).await;
    let service_id = create_service(&app, &token, "Haircut", 30).await;

    let (status, _) = book_slot(&app, &business_id, &service_id, "10:00").await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = send(
        &app,
        "GET",
        &format!("/api/businesses/{business_id}/availability?service_id={service_id}&date={MONDAY}"),
        None,
        None,
    )
    .await;
    let slots: Vec<&str> = body["slots"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert!(!slots.contains(&"10:00"));
    assert!(slots.contains(&"09:30"));
    assert!(slots.contains(&"10:30"));
}

#[tokio::test]
async fn test_availability_past_date_is_empty_not_404() {
    let app = test_app();

    // Bogus ids on a past date: the short-circuit answers before lookups.
    let (status, body) = send(
        &app,
        "GET",
        "/api/businesses/nope/availability?service_id=nope&date=2020-01-01",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["slots"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_availability_malformed_date() {
    let app = test_app();
    let token = register(&app, "Alice", "alice@example.com").await;
    let business_id = create_business(&app, &token).await;
    let service_id = create_service(&app, &token, "Haircut", 30).await;

    for bad in ["2030-1-7", "07-01-2030", "2030-02-30", "not-a-date"] {
        let (status, _) = send(
            &app,
            "GET",
            &format!(
                "/api/businesses/{business_id}/availability?service_id={service_id}&date={bad}"
            ),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "date {bad} should 400");
    }
}

// ── Bookings ──

#[tokio::test]
async fn test_booking_create_and_reference_lookup() {
    let app = test_app();
    let token = register(&app, "Alice", "alice@example.com").await;
    let business_id = create_business(&app, &token).await;
    let service_id = create_service(&app, &token, "Haircut", 30).await;

    let (status, body) = book_slot(&app, &business_id, &service_id, "10:00").await;
    assert_eq!(status, StatusCode::CREATED);

    let booking = &body["booking"];
    assert_eq!(booking["status"], "pending");
    assert_eq!(booking["end_time"], "10:30");
    let reference = booking["reference"].as_str().unwrap().to_string();
    assert!(reference.starts_with("BK-"));
    assert_eq!(reference.len(), 7);

    // Lookup is case-insensitive.
    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/bookings/{}", reference.to_ascii_lowercase()),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booking"]["id"], booking["id"]);
    assert_eq!(body["service_name"], "Haircut");
}

#[tokio::test]
async fn test_booking_reference_not_found() {
    let app = test_app();

    let (status, _) = send(&app, "GET", "/api/bookings/BK-ZZZZ", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/api/bookings/nonsense", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_booking_off_grid_slot_rejected() {
    let app = test_app();
    let token = register(&app, "Alice", "alice@example.com").await;
    let business_id = create_business(&app, &token).await;
    let service_id = create_service(&app, &token, "Haircut", 30).await;

    let (status, body) = book_slot(&app, &business_id, &service_id, "10:07").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("no longer available"));
}

#[tokio::test]
async fn test_double_booking_rejected() {
    let app = test_app();
    let token = register(&app, "Alice", "alice@example.com").await;
    let business_id = create_business(&app, &token).await;
    let service_id = create_service(&app, &token, "Haircut", 30).await;

    let (status, _) = book_slot(&app, &business_id, &service_id, "10:00").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = book_slot(&app, &business_id, &service_id, "10:00").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("no longer available"));
}

#[tokio::test]
async fn test_booking_status_transitions() {
    let app = test_app();
    let token = register(&app, "Alice", "alice@example.com").await;
    let business_id = create_business(&app, &token).await;
    let service_id = create_service(&app, &token, "Haircut", 30).await;

    let (_, body) = book_slot(&app, &business_id, &service_id, "10:00").await;
    let booking_id = body["booking"]["id"].as_str().unwrap().to_string();

    // pending → completed is not a legal jump.
    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/api/my/bookings/{booking_id}/status"),
        Some(&token),
        Some(serde_json::json!({"status": "completed"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/api/my/bookings/{booking_id}/status"),
        Some(&token),
        Some(serde_json::json!({"status": "confirmed"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "confirmed");

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/api/my/bookings/{booking_id}/status"),
        Some(&token),
        Some(serde_json::json!({"status": "completed"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
}

#[tokio::test]
async fn test_booking_status_requires_ownership() {
    let app = test_app();
    let token = register(&app, "Alice", "alice@example.com").await;
    let business_id = create_business(&app, &token).await;
    let service_id = create_service(&app, &token, "Haircut", 30).await;

    let (_, body) = book_slot(&app, &business_id, &service_id, "10:00").await;
    let booking_id = body["booking"]["id"].as_str().unwrap().to_string();

    let other_token = register(&app, "Zoe", "zoe@example.com").await;

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/api/my/bookings/{booking_id}/status"),
        Some(&other_token),
        Some(serde_json::json!({"status": "confirmed"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_owner_booking_list_and_stats() {
    let app = test_app();
    let token = register(&app, "Alice", "alice@example.com").await;
    let business_id = create_business(&app, &token).await;
    let service_id = create_service(&app, &token, "Haircut", 30).await;

    book_slot(&app, &business_id, &service_id, "09:00").await;
    let (_, body) = book_slot(&app, &business_id, &service_id, "10:00").await;
    let second_id = body["booking"]["id"].as_str().unwrap().to_string();

    send(
        &app,
        "PATCH",
        &format!("/api/my/bookings/{second_id}/status"),
        Some(&token),
        Some(serde_json::json!({"status": "confirmed"})),
    )
    .await;

    let (status, body) = send(&app, "GET", "/api/my/bookings", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = send(
        &app,
        "GET",
        "/api/my/bookings?status=confirmed",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        "GET",
        "/api/my/bookings?status=bogus",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "GET", "/api/my/stats", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pending"], 1);
    assert_eq!(body["confirmed"], 1);
    assert_eq!(body["upcoming"], 1);
}

// ── Assistant ──

#[tokio::test]
async fn test_assistant_mutation_becomes_proposal() {
    let app = test_app();
    let token = register(&app, "Alice", "alice@example.com").await;
    create_business(&app, &token).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/my/assistant/message",
        Some(&token),
        Some(serde_json::json!({"message": "please add a beard trim"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let proposal = &body["proposal"];
    assert_eq!(proposal["status"], "pending");
    let proposal_id = proposal["id"].as_str().unwrap().to_string();

    // Nothing is in the catalog until the owner confirms.
    let (_, services) = send(&app, "GET", "/api/my/services", Some(&token), None).await;
    assert!(services.as_array().unwrap().is_empty());

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/my/assistant/proposals/{proposal_id}/confirm"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, services) = send(&app, "GET", "/api/my/services", Some(&token), None).await;
    let services = services.as_array().unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0]["name"], "Beard Trim");

    // A second confirm is refused.
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/my/assistant/proposals/{proposal_id}/confirm"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_assistant_reject_leaves_catalog_untouched() {
    let app = test_app();
    let token = register(&app, "Alice", "alice@example.com").await;
    create_business(&app, &token).await;

    let (_, body) = send(
        &app,
        "POST",
        "/api/my/assistant/message",
        Some(&token),
        Some(serde_json::json!({"message": "add a beard trim"})),
    )
    .await;
    let proposal_id = body["proposal"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/my/assistant/proposals/{proposal_id}/reject"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, services) = send(&app, "GET", "/api/my/services", Some(&token), None).await;
    assert!(services.as_array().unwrap().is_empty());

    let (_, proposals) = send(
        &app,
        "GET",
        "/api/my/assistant/proposals",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(proposals[0]["status"], "rejected");
}

#[tokio::test]
async fn test_assistant_list_services_runs_directly() {
    let app = test_app();
    let token = register(&app, "Alice", "alice@example.com").await;
    create_business(&app, &token).await;
    create_service(&app, &token, "Haircut", 30).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/my/assistant/message",
        Some(&token),
        Some(serde_json::json!({"message": "list my services"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Read-only tool: no proposal, result inlined.
    assert!(body["proposal"].is_null());
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["name"], "Haircut");
}

#[tokio::test]
async fn test_assistant_degrades_on_non_json_reply() {
    let app = test_app();
    let token = register(&app, "Alice", "alice@example.com").await;
    create_business(&app, &token).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/my/assistant/message",
        Some(&token),
        Some(serde_json::json!({"message": "garbled please"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], "this is not json at all");
    assert!(body["proposal"].is_null());
}

#[tokio::test]
async fn test_assistant_requires_business() {
    let app = test_app();
    let token = register(&app, "Alice", "alice@example.com").await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/my/assistant/message",
        Some(&token),
        Some(serde_json::json!({"message": "hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
