use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{Local, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{BookingStatus, Business, Owner, WeekSchedule};
use crate::services::{booking, catalog};
use crate::state::AppState;

/// Resolves the Bearer token in the Authorization header to an owner.
pub fn authenticate(conn: &Connection, headers: &HeaderMap) -> Result<Owner, AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() {
        return Err(AppError::Unauthorized);
    }
    queries::get_owner_by_token(conn, token)?.ok_or(AppError::Unauthorized)
}

fn require_business(conn: &Connection, owner: &Owner) -> Result<Business, AppError> {
    queries::get_business_by_owner(conn, &owner.id)?
        .ok_or_else(|| AppError::NotFound("no business registered for this account".to_string()))
}

// POST /api/register
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    if body.name.trim().is_empty() {
        return Err(AppError::Validation("name must not be empty".to_string()));
    }
    if !body.email.contains('@') {
        return Err(AppError::Validation(format!("invalid email: {}", body.email)));
    }

    let email = body.email.trim().to_ascii_lowercase();
    let db = state.db.lock().unwrap();
    if queries::email_taken(&db, &email)? {
        return Err(AppError::Validation("email already registered".to_string()));
    }

    let owner = Owner {
        id: Uuid::new_v4().to_string(),
        name: body.name.trim().to_string(),
        email,
        api_token: Uuid::new_v4().to_string(),
        created_at: Utc::now().naive_utc(),
    };
    queries::create_owner(&db, &owner)?;

    tracing::info!(owner_id = %owner.id, "owner registered");

    // The token is returned exactly once, at registration.
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": owner.id,
            "name": owner.name,
            "email": owner.email,
            "api_token": owner.api_token,
        })),
    ))
}

// POST /api/my/business
#[derive(Deserialize)]
pub struct CreateBusinessRequest {
    pub name: String,
    pub working_hours: WeekSchedule,
}

pub async fn create_business(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateBusinessRequest>,
) -> Result<(StatusCode, Json<Business>), AppError> {
    let db = state.db.lock().unwrap();
    let owner = authenticate(&db, &headers)?;

    if body.name.trim().is_empty() {
        return Err(AppError::Validation("business name must not be empty".to_string()));
    }
    body.working_hours
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    if queries::get_business_by_owner(&db, &owner.id)?.is_some() {
        return Err(AppError::Validation(
            "this account already has a business".to_string(),
        ));
    }

    let now = Utc::now().naive_utc();
    let business = Business {
        id: Uuid::new_v4().to_string(),
        owner_id: owner.id.clone(),
        name: body.name.trim().to_string(),
        working_hours: body.working_hours,
        created_at: now,
        updated_at: now,
    };
    queries::create_business(&db, &business).map_err(anyhow::Error::from)?;

    tracing::info!(business_id = %business.id, owner_id = %owner.id, "business created");
    Ok((StatusCode::CREATED, Json(business)))
}

// GET /api/my/business
pub async fn get_my_business(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Business>, AppError> {
    let db = state.db.lock().unwrap();
    let owner = authenticate(&db, &headers)?;
    let business = require_business(&db, &owner)?;
    Ok(Json(business))
}

// PATCH /api/my/business
#[derive(Deserialize)]
pub struct UpdateBusinessRequest {
    pub name: Option<String>,
    pub working_hours: Option<WeekSchedule>,
}

pub async fn update_business(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<UpdateBusinessRequest>,
) -> Result<Json<Business>, AppError> {
    let db = state.db.lock().unwrap();
    let owner = authenticate(&db, &headers)?;
    let business = require_business(&db, &owner)?;

    let name = match body.name {
        Some(name) => {
            if name.trim().is_empty() {
                return Err(AppError::Validation("business name must not be empty".to_string()));
            }
            name.trim().to_string()
        }
        None => business.name.clone(),
    };
    let working_hours = match body.working_hours {
        Some(hours) => {
            hours
                .validate()
                .map_err(|e| AppError::Validation(e.to_string()))?;
            hours
        }
        None => business.working_hours.clone(),
    };

    queries::update_business(&db, &business.id, &name, &working_hours)?;
    let updated = queries::get_business(&db, &business.id)?
        .ok_or_else(|| AppError::NotFound(format!("business {}", business.id)))?;
    Ok(Json(updated))
}

// POST /api/my/services
#[derive(Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    pub duration_minutes: i64,
    pub price_cents: i64,
    pub available_days: Option<Vec<String>>,
}

pub async fn create_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateServiceRequest>,
) -> Result<(StatusCode, Json<crate::models::Service>), AppError> {
    let db = state.db.lock().unwrap();
    let owner = authenticate(&db, &headers)?;
    let business = require_business(&db, &owner)?;

    let service = catalog::create_service(
        &db,
        &business.id,
        catalog::NewService {
            name: body.name,
            duration_minutes: body.duration_minutes,
            price_cents: body.price_cents,
            available_days: body.available_days,
        },
    )?;
    Ok((StatusCode::CREATED, Json(service)))
}

// GET /api/my/services?include_inactive=true
#[derive(Deserialize)]
pub struct ListServicesQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

pub async fn list_services(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListServicesQuery>,
) -> Result<Json<Vec<crate::models::Service>>, AppError> {
    let db = state.db.lock().unwrap();
    let owner = authenticate(&db, &headers)?;
    let business = require_business(&db, &owner)?;

    let services = catalog::list_services(&db, &business.id, query.include_inactive)?;
    Ok(Json(services))
}

// PATCH /api/my/services/:id
#[derive(Deserialize)]
pub struct UpdateServiceRequest {
    pub name: Option<String>,
    pub duration_minutes: Option<i64>,
    pub price_cents: Option<i64>,
    pub available_days: Option<Vec<String>>,
}

pub async fn update_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(service_id): Path<String>,
    Json(body): Json<UpdateServiceRequest>,
) -> Result<Json<crate::models::Service>, AppError> {
    let db = state.db.lock().unwrap();
    let owner = authenticate(&db, &headers)?;
    let business = require_business(&db, &owner)?;

    let service = catalog::update_service(
        &db,
        &business.id,
        &service_id,
        catalog::ServicePatch {
            name: body.name,
            duration_minutes: body.duration_minutes,
            price_cents: body.price_cents,
            available_days: body.available_days,
        },
    )?;
    Ok(Json(service))
}

// DELETE /api/my/services/:id
pub async fn delete_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(service_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = state.db.lock().unwrap();
    let owner = authenticate(&db, &headers)?;
    let business = require_business(&db, &owner)?;

    catalog::deactivate_service(&db, &business.id, &service_id)?;
    Ok(Json(serde_json::json!({"ok": true})))
}

// GET /api/my/bookings?status=&date=&limit=
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub date: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<crate::models::Booking>>, AppError> {
    if let Some(status) = &query.status {
        if BookingStatus::parse(status).is_none() {
            return Err(AppError::Validation(format!("unknown status: {status}")));
        }
    }

    let db = state.db.lock().unwrap();
    let owner = authenticate(&db, &headers)?;
    let business = require_business(&db, &owner)?;

    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let bookings = queries::list_bookings(
        &db,
        &business.id,
        query.status.as_deref(),
        query.date.as_deref(),
        limit,
    )?;
    Ok(Json(bookings))
}

// PATCH /api/my/bookings/:id/status
#[derive(Deserialize)]
pub struct UpdateBookingStatusRequest {
    pub status: String,
}

pub async fn update_booking_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(booking_id): Path<String>,
    Json(body): Json<UpdateBookingStatusRequest>,
) -> Result<Json<crate::models::Booking>, AppError> {
    let status = BookingStatus::parse(&body.status)
        .ok_or_else(|| AppError::Validation(format!("unknown status: {}", body.status)))?;

    let db = state.db.lock().unwrap();
    let owner = authenticate(&db, &headers)?;

    let updated = booking::update_status(&db, &booking_id, status, &owner.id)?;
    Ok(Json(updated))
}

// GET /api/my/stats
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = state.db.lock().unwrap();
    let owner = authenticate(&db, &headers)?;
    let business = require_business(&db, &owner)?;

    let today = Local::now().date_naive().format("%Y-%m-%d").to_string();
    let stats = queries::get_booking_stats(&db, &business.id, &today)?;

    Ok(Json(serde_json::json!({
        "pending": stats.pending,
        "confirmed": stats.confirmed,
        "cancelled": stats.cancelled,
        "completed": stats.completed,
        "no_show": stats.no_show,
        "upcoming": stats.upcoming,
    })))
}
