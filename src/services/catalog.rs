use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::business::WEEKDAY_KEYS;
use crate::models::Service;

pub const MIN_DURATION_MINUTES: i64 = 15;
pub const MAX_DURATION_MINUTES: i64 = 24 * 60;

pub struct NewService {
    pub name: String,
    pub duration_minutes: i64,
    pub price_cents: i64,
    pub available_days: Option<Vec<String>>,
}

#[derive(Default)]
pub struct ServicePatch {
    pub name: Option<String>,
    pub duration_minutes: Option<i64>,
    pub price_cents: Option<i64>,
    /// Some(days) replaces the restriction; an empty list clears it.
    pub available_days: Option<Vec<String>>,
}

fn validate_duration(duration: i64) -> Result<(), AppError> {
    if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&duration) {
        return Err(AppError::Validation(format!(
            "duration must be between {MIN_DURATION_MINUTES} and {MAX_DURATION_MINUTES} minutes"
        )));
    }
    Ok(())
}

fn validate_price(price_cents: i64) -> Result<(), AppError> {
    if price_cents < 0 {
        return Err(AppError::Validation("price must not be negative".to_string()));
    }
    Ok(())
}

fn validate_days(days: &[String]) -> Result<(), AppError> {
    for day in days {
        if !WEEKDAY_KEYS.contains(&day.as_str()) {
            return Err(AppError::Validation(format!("invalid weekday: {day}")));
        }
    }
    Ok(())
}

pub fn create_service(
    conn: &Connection,
    business_id: &str,
    req: NewService,
) -> Result<Service, AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::Validation("service name must not be empty".to_string()));
    }
    validate_duration(req.duration_minutes)?;
    validate_price(req.price_cents)?;
    if let Some(days) = &req.available_days {
        validate_days(days)?;
    }

    let now = Utc::now().naive_utc();
    let service = Service {
        id: Uuid::new_v4().to_string(),
        business_id: business_id.to_string(),
        name: req.name.trim().to_string(),
        duration_minutes: req.duration_minutes,
        price_cents: req.price_cents,
        available_days: req.available_days.filter(|d| !d.is_empty()),
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    queries::create_service(conn, &service)?;

    tracing::info!(service_id = %service.id, business_id, name = %service.name, "service created");
    Ok(service)
}

pub fn update_service(
    conn: &Connection,
    business_id: &str,
    service_id: &str,
    patch: ServicePatch,
) -> Result<Service, AppError> {
    let mut service = queries::get_active_service(conn, service_id, business_id)?
        .ok_or_else(|| AppError::NotFound(format!("service {service_id}")))?;

    if let Some(name) = patch.name {
        if name.trim().is_empty() {
            return Err(AppError::Validation("service name must not be empty".to_string()));
        }
        service.name = name.trim().to_string();
    }
    if let Some(duration) = patch.duration_minutes {
        validate_duration(duration)?;
        service.duration_minutes = duration;
    }
    if let Some(price) = patch.price_cents {
        validate_price(price)?;
        service.price_cents = price;
    }
    if let Some(days) = patch.available_days {
        validate_days(&days)?;
        service.available_days = if days.is_empty() { None } else { Some(days) };
    }

    queries::update_service(conn, &service)?;
    let updated = queries::get_service_by_id(conn, service_id)?
        .ok_or_else(|| AppError::NotFound(format!("service {service_id}")))?;
    Ok(updated)
}

/// Soft delete: flips is_active so historical bookings keep a valid
/// service row. Never removes the row.
pub fn deactivate_service(
    conn: &Connection,
    business_id: &str,
    service_id: &str,
) -> Result<(), AppError> {
    let mut service = queries::get_active_service(conn, service_id, business_id)?
        .ok_or_else(|| AppError::NotFound(format!("service {service_id}")))?;

    service.is_active = false;
    queries::update_service(conn, &service)?;

    tracing::info!(service_id, business_id, "service deactivated");
    Ok(())
}

pub fn list_services(
    conn: &Connection,
    business_id: &str,
    include_inactive: bool,
) -> Result<Vec<Service>, AppError> {
    Ok(queries::list_services(conn, business_id, include_inactive)?)
}
