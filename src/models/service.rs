use chrono::{NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::models::business::weekday_key;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub business_id: String,
    pub name: String,
    pub duration_minutes: i64,
    pub price_cents: i64,
    /// Weekday keys ("mon".."sun") the service is offered on. None means
    /// every day the business is open.
    pub available_days: Option<Vec<String>>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Service {
    pub fn allows_weekday(&self, weekday: Weekday) -> bool {
        match &self.available_days {
            Some(days) => days.iter().any(|d| d == weekday_key(weekday)),
            None => true,
        }
    }
}
