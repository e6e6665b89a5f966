use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::services::slots;

/// Minimum minutes between "now" and the earliest bookable same-day slot.
/// Fixed policy, not per-business.
pub const LEAD_TIME_MINUTES: u16 = 30;

/// Strict "YYYY-MM-DD" parse: zero-padded and a real calendar date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let bytes = s.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    for (i, b) in bytes.iter().enumerate() {
        if i != 4 && i != 7 && !b.is_ascii_digit() {
            return None;
        }
    }
    let year: i32 = s[0..4].parse().ok()?;
    let month: u32 = s[5..7].parse().ok()?;
    let day: u32 = s[8..10].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Open start times for a service on a date, ascending "HH:mm" strings.
///
/// Past dates short-circuit to an empty list before the business and
/// service are resolved, so a past date never 404s. `today`/`now` are the
/// server-local clock, injected by the caller.
pub fn get_availability(
    conn: &Connection,
    business_id: &str,
    service_id: &str,
    date: &str,
    today: NaiveDate,
    now: NaiveTime,
    interval_minutes: u16,
) -> Result<Vec<String>, AppError> {
    let day = parse_date(date)
        .ok_or_else(|| AppError::Validation(format!("invalid date: {date}")))?;

    if day < today {
        return Ok(Vec::new());
    }

    let business = queries::get_business(conn, business_id)?
        .ok_or_else(|| AppError::NotFound(format!("business {business_id}")))?;

    let service = queries::get_active_service(conn, service_id, business_id)?
        .ok_or_else(|| AppError::NotFound(format!("service {service_id}")))?;

    let weekday = day.weekday();
    let hours = match business.working_hours.open_hours(weekday) {
        Some(hours) => hours,
        None => return Ok(Vec::new()),
    };

    if !service.allows_weekday(weekday) {
        return Ok(Vec::new());
    }

    // Stored hours are validated on write; a malformed row is a data bug.
    let open = slots::parse_hhmm(&hours.open)
        .ok_or_else(|| anyhow::anyhow!("malformed open time: {}", hours.open))?;
    let close = slots::parse_hhmm(&hours.close)
        .ok_or_else(|| anyhow::anyhow!("malformed close time: {}", hours.close))?;
    let duration = u16::try_from(service.duration_minutes)
        .map_err(|_| anyhow::anyhow!("service duration out of range"))?;

    let mut candidates = slots::generate_slots(open, close, duration, interval_minutes);

    let booked: Vec<(u16, u16)> = queries::get_bookings_for_day(conn, business_id, date)?
        .iter()
        .filter_map(|b| {
            Some((slots::parse_hhmm(&b.start_time)?, slots::parse_hhmm(&b.end_time)?))
        })
        .collect();

    candidates.retain(|&start| {
        !booked
            .iter()
            .any(|&(bs, be)| slots::overlaps(start, duration, bs, be))
    });

    if day == today {
        let earliest = now.hour() as u16 * 60 + now.minute() as u16 + LEAD_TIME_MINUTES;
        candidates.retain(|&start| start >= earliest);
    }

    Ok(candidates.into_iter().map(slots::format_hhmm).collect())
}
