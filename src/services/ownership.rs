use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Business;

/// Single-tenant isolation check used by every owner-facing mutation:
/// NotFound when the business does not exist, Forbidden when it belongs to
/// someone else.
pub fn verify_ownership(
    conn: &Connection,
    business_id: &str,
    owner_id: &str,
) -> Result<Business, AppError> {
    let business = queries::get_business(conn, business_id)?
        .ok_or_else(|| AppError::NotFound(format!("business {business_id}")))?;

    if business.owner_id != owner_id {
        return Err(AppError::Forbidden);
    }

    Ok(business)
}
