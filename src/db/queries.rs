use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use crate::models::{
    Booking, BookingStatus, Business, ChatMessage, Owner, Proposal, ProposalStatus, Service,
    ToolCall, WeekSchedule,
};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

fn parse_ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TS_FORMAT).unwrap_or_else(|_| Utc::now().naive_utc())
}

// ── Owners ──

pub fn create_owner(conn: &Connection, owner: &Owner) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO owners (id, name, email, api_token, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            owner.id,
            owner.name,
            owner.email,
            owner.api_token,
            format_ts(&owner.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_owner_by_token(conn: &Connection, token: &str) -> anyhow::Result<Option<Owner>> {
    let result = conn.query_row(
        "SELECT id, name, email, api_token, created_at FROM owners WHERE api_token = ?1",
        params![token],
        |row| {
            Ok(Owner {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                api_token: row.get(3)?,
                created_at: parse_ts(&row.get::<_, String>(4)?),
            })
        },
    );

    match result {
        Ok(owner) => Ok(Some(owner)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn email_taken(conn: &Connection, email: &str) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM owners WHERE email = ?1",
        params![email],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

// ── Businesses ──

pub fn create_business(conn: &Connection, business: &Business) -> rusqlite::Result<()> {
    let working_hours = serde_json::to_string(&business.working_hours)
        .unwrap_or_else(|_| "{}".to_string());
    conn.execute(
        "INSERT INTO businesses (id, owner_id, name, working_hours, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            business.id,
            business.owner_id,
            business.name,
            working_hours,
            format_ts(&business.created_at),
            format_ts(&business.updated_at),
        ],
    )?;
    Ok(())
}

fn parse_business_row(row: &rusqlite::Row) -> anyhow::Result<Business> {
    let working_hours_json: String = row.get(3)?;
    let working_hours: WeekSchedule = serde_json::from_str(&working_hours_json)?;
    Ok(Business {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        working_hours,
        created_at: parse_ts(&row.get::<_, String>(4)?),
        updated_at: parse_ts(&row.get::<_, String>(5)?),
    })
}

const BUSINESS_COLUMNS: &str = "id, owner_id, name, working_hours, created_at, updated_at";

pub fn get_business(conn: &Connection, id: &str) -> anyhow::Result<Option<Business>> {
    let result = conn.query_row(
        &format!("SELECT {BUSINESS_COLUMNS} FROM businesses WHERE id = ?1"),
        params![id],
        |row| Ok(parse_business_row(row)),
    );

    match result {
        Ok(business) => Ok(Some(business?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_business_by_owner(conn: &Connection, owner_id: &str) -> anyhow::Result<Option<Business>> {
    let result = conn.query_row(
        &format!("SELECT {BUSINESS_COLUMNS} FROM businesses WHERE owner_id = ?1"),
        params![owner_id],
        |row| Ok(parse_business_row(row)),
    );

    match result {
        Ok(business) => Ok(Some(business?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn update_business(
    conn: &Connection,
    id: &str,
    name: &str,
    working_hours: &WeekSchedule,
) -> anyhow::Result<bool> {
    let working_hours_json = serde_json::to_string(working_hours)?;
    let now = format_ts(&Utc::now().naive_utc());
    let count = conn.execute(
        "UPDATE businesses SET name = ?1, working_hours = ?2, updated_at = ?3 WHERE id = ?4",
        params![name, working_hours_json, now, id],
    )?;
    Ok(count > 0)
}

// ── Services ──

const SERVICE_COLUMNS: &str =
    "id, business_id, name, duration_minutes, price_cents, available_days, is_active, created_at, updated_at";

fn parse_service_row(row: &rusqlite::Row) -> anyhow::Result<Service> {
    let available_days_json: Option<String> = row.get(5)?;
    let available_days = match available_days_json {
        Some(json) => Some(serde_json::from_str(&json)?),
        None => None,
    };
    Ok(Service {
        id: row.get(0)?,
        business_id: row.get(1)?,
        name: row.get(2)?,
        duration_minutes: row.get(3)?,
        price_cents: row.get(4)?,
        available_days,
        is_active: row.get::<_, i64>(6)? != 0,
        created_at: parse_ts(&row.get::<_, String>(7)?),
        updated_at: parse_ts(&row.get::<_, String>(8)?),
    })
}

pub fn create_service(conn: &Connection, service: &Service) -> anyhow::Result<()> {
    let available_days = service
        .available_days
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    conn.execute(
        &format!("INSERT INTO services ({SERVICE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
        params![
            service.id,
            service.business_id,
            service.name,
            service.duration_minutes,
            service.price_cents,
            available_days,
            service.is_active as i64,
            format_ts(&service.created_at),
            format_ts(&service.updated_at),
        ],
    )?;
    Ok(())
}

/// Active service scoped to a business. Rejects cross-business service ids
/// and soft-deleted services in one lookup.
pub fn get_active_service(
    conn: &Connection,
    id: &str,
    business_id: &str,
) -> anyhow::Result<Option<Service>> {
    let result = conn.query_row(
        &format!(
            "SELECT {SERVICE_COLUMNS} FROM services
             WHERE id = ?1 AND business_id = ?2 AND is_active = 1"
        ),
        params![id, business_id],
        |row| Ok(parse_service_row(row)),
    );

    match result {
        Ok(service) => Ok(Some(service?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_service_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Service>> {
    let result = conn.query_row(
        &format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = ?1"),
        params![id],
        |row| Ok(parse_service_row(row)),
    );

    match result {
        Ok(service) => Ok(Some(service?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_services(
    conn: &Connection,
    business_id: &str,
    include_inactive: bool,
) -> anyhow::Result<Vec<Service>> {
    let sql = if include_inactive {
        format!("SELECT {SERVICE_COLUMNS} FROM services WHERE business_id = ?1 ORDER BY created_at ASC")
    } else {
        format!(
            "SELECT {SERVICE_COLUMNS} FROM services
             WHERE business_id = ?1 AND is_active = 1 ORDER BY created_at ASC"
        )
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![business_id], |row| Ok(parse_service_row(row)))?;

    let mut services = vec![];
    for row in rows {
        services.push(row??);
    }
    Ok(services)
}

pub fn update_service(conn: &Connection, service: &Service) -> anyhow::Result<bool> {
    let available_days = service
        .available_days
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let now = format_ts(&Utc::now().naive_utc());
    let count = conn.execute(
        "UPDATE services
         SET name = ?1, duration_minutes = ?2, price_cents = ?3, available_days = ?4,
             is_active = ?5, updated_at = ?6
         WHERE id = ?7",
        params![
            service.name,
            service.duration_minutes,
            service.price_cents,
            available_days,
            service.is_active as i64,
            now,
            service.id,
        ],
    )?;
    Ok(count > 0)
}

// ── Bookings ──

const BOOKING_COLUMNS: &str =
    "id, business_id, service_id, customer_id, customer_name, customer_email, date, start_time, end_time, status, reference, created_at, updated_at";

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let status_str: String = row.get(9)?;
    let status = BookingStatus::parse(&status_str)
        .ok_or_else(|| anyhow::anyhow!("unknown booking status: {status_str}"))?;
    Ok(Booking {
        id: row.get(0)?,
        business_id: row.get(1)?,
        service_id: row.get(2)?,
        customer_id: row.get(3)?,
        customer_name: row.get(4)?,
        customer_email: row.get(5)?,
        date: row.get(6)?,
        start_time: row.get(7)?,
        end_time: row.get(8)?,
        status,
        reference: row.get(10)?,
        created_at: parse_ts(&row.get::<_, String>(11)?),
        updated_at: parse_ts(&row.get::<_, String>(12)?),
    })
}

/// Returns the raw rusqlite error so callers can tell a slot-uniqueness
/// constraint hit apart from other failures.
pub fn create_booking(conn: &Connection, booking: &Booking) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
        ),
        params![
            booking.id,
            booking.business_id,
            booking.service_id,
            booking.customer_id,
            booking.customer_name,
            booking.customer_email,
            booking.date,
            booking.start_time,
            booking.end_time,
            booking.status.as_str(),
            booking.reference,
            format_ts(&booking.created_at),
            format_ts(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Reference column is COLLATE NOCASE, so the match is case-insensitive.
pub fn get_booking_by_reference(
    conn: &Connection,
    reference: &str,
) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE reference = ?1"),
        params![reference],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Non-cancelled bookings for one business day, ascending by start time.
pub fn get_bookings_for_day(
    conn: &Connection,
    business_id: &str,
    date: &str,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE business_id = ?1 AND date = ?2 AND status != 'cancelled'
         ORDER BY start_time ASC"
    ))?;

    let rows = stmt.query_map(params![business_id, date], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn list_bookings(
    conn: &Connection,
    business_id: &str,
    status_filter: Option<&str>,
    date_filter: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let mut sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE business_id = ?1");
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> =
        vec![Box::new(business_id.to_string())];

    if let Some(status) = status_filter {
        params_vec.push(Box::new(status.to_string()));
        sql.push_str(&format!(" AND status = ?{}", params_vec.len()));
    }
    if let Some(date) = date_filter {
        params_vec.push(Box::new(date.to_string()));
        sql.push_str(&format!(" AND date = ?{}", params_vec.len()));
    }
    params_vec.push(Box::new(limit));
    sql.push_str(&format!(
        " ORDER BY date DESC, start_time DESC LIMIT ?{}",
        params_vec.len()
    ));

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
) -> anyhow::Result<bool> {
    let now = format_ts(&Utc::now().naive_utc());
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now, id],
    )?;
    Ok(count > 0)
}

pub struct BookingStats {
    pub pending: i64,
    pub confirmed: i64,
    pub cancelled: i64,
    pub completed: i64,
    pub no_show: i64,
    pub upcoming: i64,
}

pub fn get_booking_stats(
    conn: &Connection,
    business_id: &str,
    today: &str,
) -> anyhow::Result<BookingStats> {
    let count_status = |status: &str| -> anyhow::Result<i64> {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM bookings WHERE business_id = ?1 AND status = ?2",
            params![business_id, status],
            |row| row.get(0),
        )?)
    };

    let upcoming: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings
         WHERE business_id = ?1 AND status = 'confirmed' AND date >= ?2",
        params![business_id, today],
        |row| row.get(0),
    )?;

    Ok(BookingStats {
        pending: count_status("pending")?,
        confirmed: count_status("confirmed")?,
        cancelled: count_status("cancelled")?,
        completed: count_status("completed")?,
        no_show: count_status("no_show")?,
        upcoming,
    })
}

// ── Chat sessions ──

pub fn get_chat_messages(conn: &Connection, owner_id: &str) -> anyhow::Result<Vec<ChatMessage>> {
    let result = conn.query_row(
        "SELECT messages FROM chat_sessions WHERE owner_id = ?1",
        params![owner_id],
        |row| row.get::<_, String>(0),
    );

    match result {
        Ok(json) => Ok(serde_json::from_str(&json).unwrap_or_default()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

pub fn save_chat_messages(
    conn: &Connection,
    owner_id: &str,
    messages: &[ChatMessage],
) -> anyhow::Result<()> {
    let json = serde_json::to_string(messages)?;
    let now = format_ts(&Utc::now().naive_utc());
    conn.execute(
        "INSERT INTO chat_sessions (owner_id, messages, updated_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(owner_id) DO UPDATE SET
           messages = excluded.messages,
           updated_at = excluded.updated_at",
        params![owner_id, json, now],
    )?;
    Ok(())
}

// ── Proposals ──

fn parse_proposal_row(row: &rusqlite::Row) -> anyhow::Result<Proposal> {
    let tool_call_json: String = row.get(2)?;
    let tool_call: ToolCall = serde_json::from_str(&tool_call_json)?;
    let status_str: String = row.get(4)?;
    let status = ProposalStatus::parse(&status_str)
        .ok_or_else(|| anyhow::anyhow!("unknown proposal status: {status_str}"))?;
    Ok(Proposal {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        tool_call,
        summary: row.get(3)?,
        status,
        created_at: parse_ts(&row.get::<_, String>(5)?),
        updated_at: parse_ts(&row.get::<_, String>(6)?),
    })
}

const PROPOSAL_COLUMNS: &str = "id, owner_id, tool_call, summary, status, created_at, updated_at";

pub fn insert_proposal(conn: &Connection, proposal: &Proposal) -> anyhow::Result<()> {
    let tool_call = serde_json::to_string(&proposal.tool_call)?;
    conn.execute(
        &format!("INSERT INTO proposals ({PROPOSAL_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
        params![
            proposal.id,
            proposal.owner_id,
            tool_call,
            proposal.summary,
            proposal.status.as_str(),
            format_ts(&proposal.created_at),
            format_ts(&proposal.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_proposal(
    conn: &Connection,
    id: &str,
    owner_id: &str,
) -> anyhow::Result<Option<Proposal>> {
    let result = conn.query_row(
        &format!("SELECT {PROPOSAL_COLUMNS} FROM proposals WHERE id = ?1 AND owner_id = ?2"),
        params![id, owner_id],
        |row| Ok(parse_proposal_row(row)),
    );

    match result {
        Ok(proposal) => Ok(Some(proposal?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_proposals(conn: &Connection, owner_id: &str, limit: i64) -> anyhow::Result<Vec<Proposal>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PROPOSAL_COLUMNS} FROM proposals
         WHERE owner_id = ?1 ORDER BY created_at DESC LIMIT ?2"
    ))?;

    let rows = stmt.query_map(params![owner_id, limit], |row| Ok(parse_proposal_row(row)))?;

    let mut proposals = vec![];
    for row in rows {
        proposals.push(row??);
    }
    Ok(proposals)
}

pub fn update_proposal_status(
    conn: &Connection,
    id: &str,
    status: ProposalStatus,
) -> anyhow::Result<bool> {
    let now = format_ts(&Utc::now().naive_utc());
    let count = conn.execute(
        "UPDATE proposals SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now, id],
    )?;
    Ok(count > 0)
}
