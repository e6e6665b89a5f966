use chrono::{NaiveDate, NaiveTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, Service};
use crate::services::{availability, ownership, slots};

/// Uppercase letters and digits minus the visually ambiguous I, O, 0, 1.
/// 32 symbols, so a uuid byte maps onto it without modulo bias.
const REFERENCE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// "BK-" + 4 alphabet chars. ~1 in 1M chance of collision per attempt; the
/// unique constraint on the column is the backstop and there is no retry.
pub fn generate_reference() -> String {
    let bytes = *Uuid::new_v4().as_bytes();
    let mut code = String::with_capacity(7);
    code.push_str("BK-");
    for b in &bytes[..4] {
        code.push(REFERENCE_ALPHABET[*b as usize % REFERENCE_ALPHABET.len()] as char);
    }
    code
}

pub fn is_valid_reference(reference: &str) -> bool {
    let upper = reference.to_ascii_uppercase();
    match upper.strip_prefix("BK-") {
        Some(rest) => rest.len() == 4 && rest.bytes().all(|b| REFERENCE_ALPHABET.contains(&b)),
        None => false,
    }
}

pub struct BookingRequest {
    pub service_id: String,
    pub date: String,
    pub start_time: String,
    pub customer_id: String,
    pub customer_name: String,
    pub customer_email: String,
}

/// Creates a pending booking after re-checking availability. The recheck
/// rejects anything not currently offered ("slot is no longer available");
/// the partial unique index on (business, date, start) catches the
/// remaining race between two concurrent creates and is reported as the
/// same validation error.
pub fn create_booking(
    conn: &Connection,
    business_id: &str,
    req: &BookingRequest,
    today: NaiveDate,
    now: NaiveTime,
    interval_minutes: u16,
) -> Result<(Booking, Service), AppError> {
    queries::get_business(conn, business_id)?
        .ok_or_else(|| AppError::NotFound(format!("business {business_id}")))?;

    let service = queries::get_active_service(conn, &req.service_id, business_id)?
        .ok_or_else(|| AppError::NotFound(format!("service {}", req.service_id)))?;

    let start = slots::parse_hhmm(&req.start_time)
        .ok_or_else(|| AppError::Validation(format!("invalid start time: {}", req.start_time)))?;

    let open_slots = availability::get_availability(
        conn,
        business_id,
        &req.service_id,
        &req.date,
        today,
        now,
        interval_minutes,
    )?;
    if !open_slots.contains(&req.start_time) {
        return Err(AppError::Validation(
            "slot is no longer available".to_string(),
        ));
    }

    let duration = u16::try_from(service.duration_minutes)
        .map_err(|_| anyhow::anyhow!("service duration out of range"))?;
    let end_time = slots::format_hhmm(start + duration);

    let created_at = Utc::now().naive_utc();
    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        business_id: business_id.to_string(),
        service_id: service.id.clone(),
        customer_id: req.customer_id.clone(),
        customer_name: req.customer_name.clone(),
        customer_email: req.customer_email.clone(),
        date: req.date.clone(),
        start_time: req.start_time.clone(),
        end_time,
        status: BookingStatus::Pending,
        reference: generate_reference(),
        created_at,
        updated_at: created_at,
    };

    match queries::create_booking(conn, &booking) {
        Ok(()) => {}
        Err(e) if is_slot_constraint_violation(&e) => {
            return Err(AppError::Validation(
                "slot is no longer available".to_string(),
            ));
        }
        Err(e) => return Err(anyhow::Error::from(e).into()),
    }

    tracing::info!(
        booking_id = %booking.id,
        reference = %booking.reference,
        business_id,
        date = %booking.date,
        start = %booking.start_time,
        "booking created"
    );

    Ok((booking, service))
}

fn is_slot_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, Some(msg))
            if err.code == rusqlite::ErrorCode::ConstraintViolation
                && msg.contains("bookings.business_id")
    )
}

/// Case-insensitive lookup by reference code. Malformed references are a
/// validation error rather than a silent miss.
pub fn find_by_reference(conn: &Connection, reference: &str) -> Result<Booking, AppError> {
    if !is_valid_reference(reference) {
        return Err(AppError::Validation(format!(
            "invalid reference: {reference}"
        )));
    }
    let upper = reference.to_ascii_uppercase();
    queries::get_booking_by_reference(conn, &upper)?
        .ok_or_else(|| AppError::NotFound(format!("booking {upper}")))
}

/// Owner-initiated status change, ownership-checked and constrained to the
/// transition table.
pub fn update_status(
    conn: &Connection,
    booking_id: &str,
    new_status: BookingStatus,
    owner_id: &str,
) -> Result<Booking, AppError> {
    let booking = queries::get_booking_by_id(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

    ownership::verify_ownership(conn, &booking.business_id, owner_id)?;

    if !booking.status.can_transition_to(new_status) {
        return Err(AppError::Validation(format!(
            "cannot change booking status from {} to {}",
            booking.status.as_str(),
            new_status.as_str()
        )));
    }

    queries::update_booking_status(conn, booking_id, new_status)?;
    let updated = queries::get_booking_by_id(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;
    Ok(updated)
}
