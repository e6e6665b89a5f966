use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Local;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::services::{availability, booking};
use crate::state::AppState;

// GET /api/businesses/:id
pub async fn get_business(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = state.db.lock().unwrap();
    let business = queries::get_business(&db, &business_id)?
        .ok_or_else(|| AppError::NotFound(format!("business {business_id}")))?;
    let services = queries::list_services(&db, &business_id, false)?;

    Ok(Json(serde_json::json!({
        "id": business.id,
        "name": business.name,
        "working_hours": business.working_hours,
        "services": services,
    })))
}

// GET /api/businesses/:id/availability?service_id=&date=
#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub service_id: String,
    pub date: String,
}

pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let now = Local::now().naive_local();
    let slots = {
        let db = state.db.lock().unwrap();
        availability::get_availability(
            &db,
            &business_id,
            &query.service_id,
            &query.date,
            now.date(),
            now.time(),
            state.config.slot_interval_minutes,
        )?
    };

    Ok(Json(serde_json::json!({
        "date": query.date,
        "service_id": query.service_id,
        "slots": slots,
    })))
}

// POST /api/businesses/:id/bookings
#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub service_id: String,
    pub date: String,
    pub start_time: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_id: Option<String>,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<String>,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    if body.customer_name.trim().is_empty() {
        return Err(AppError::Validation(
            "customer name must not be empty".to_string(),
        ));
    }
    if !body.customer_email.contains('@') {
        return Err(AppError::Validation(format!(
            "invalid email: {}",
            body.customer_email
        )));
    }

    let req = booking::BookingRequest {
        service_id: body.service_id,
        date: body.date,
        start_time: body.start_time,
        customer_id: body
            .customer_id
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        customer_name: body.customer_name.trim().to_string(),
        customer_email: body.customer_email,
    };

    let now = Local::now().naive_local();
    let (created, service) = {
        let db = state.db.lock().unwrap();
        booking::create_booking(
            &db,
            &business_id,
            &req,
            now.date(),
            now.time(),
            state.config.slot_interval_minutes,
        )?
    };

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "booking": created,
            "service_name": service.name,
        })),
    ))
}

// GET /api/bookings/:reference
pub async fn get_booking_by_reference(
    State(state): State<Arc<AppState>>,
    Path(reference): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = state.db.lock().unwrap();
    let found = booking::find_by_reference(&db, &reference)?;
    let service_name = queries::get_service_by_id(&db, &found.service_id)?
        .map(|s| s.name);

    Ok(Json(serde_json::json!({
        "booking": found,
        "service_name": service_name,
    })))
}
