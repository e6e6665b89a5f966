use std::collections::BTreeMap;

use chrono::{NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::services::slots;

pub const WEEKDAY_KEYS: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Business {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub working_hours: WeekSchedule,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Open/close window for a single weekday. Times are business-local
/// wall-clock "HH:mm" strings; there is no timezone handling anywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayHours {
    pub open: String,
    pub close: String,
    #[serde(default = "default_true")]
    pub is_open: bool,
}

fn default_true() -> bool {
    true
}

/// Per-weekday working hours, keyed by "mon".."sun". A missing key means
/// the business is closed that day.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeekSchedule {
    pub days: BTreeMap<String, DayHours>,
}

impl WeekSchedule {
    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        let schedule: WeekSchedule = serde_json::from_str(s)?;
        schedule.validate()?;
        Ok(schedule)
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (day, hours) in &self.days {
            if !WEEKDAY_KEYS.contains(&day.as_str()) {
                anyhow::bail!("invalid weekday: {day}");
            }
            let open = slots::parse_hhmm(&hours.open)
                .ok_or_else(|| anyhow::anyhow!("invalid time format: {}", hours.open))?;
            let close = slots::parse_hhmm(&hours.close)
                .ok_or_else(|| anyhow::anyhow!("invalid time format: {}", hours.close))?;
            if open >= close {
                anyhow::bail!("open time {} is not before close time {}", hours.open, hours.close);
            }
        }
        Ok(())
    }

    /// Hours entry for a weekday, or None when the entry is absent or
    /// flagged closed.
    pub fn open_hours(&self, weekday: Weekday) -> Option<&DayHours> {
        self.days
            .get(weekday_key(weekday))
            .filter(|h| h.is_open)
    }
}

pub fn weekday_key(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}
