use rusqlite::Connection;

use crate::errors::AppError;
use crate::models::business::WEEKDAY_KEYS;
use crate::models::{AssistantReply, ToolCall};
use crate::services::catalog::{self, NewService, ServicePatch, MAX_DURATION_MINUTES, MIN_DURATION_MINUTES};

/// Parses the LLM's reply into `{reply, tool}`. Tolerates markdown fences
/// and surrounding prose; degrades to a tool-less reply carrying the raw
/// text when nothing parses.
pub fn parse_assistant_reply(response: &str) -> AssistantReply {
    if let Ok(reply) = serde_json::from_str::<AssistantReply>(response) {
        return reply;
    }

    let cleaned = response
        .trim()
        .strip_prefix("```json")
        .or_else(|| response.trim().strip_prefix("```"))
        .unwrap_or(response.trim());
    let cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned).trim();

    if let Ok(reply) = serde_json::from_str::<AssistantReply>(cleaned) {
        return reply;
    }

    if let Some(start) = cleaned.find('{') {
        if let Some(end) = cleaned.rfind('}') {
            if let Ok(reply) = serde_json::from_str::<AssistantReply>(&cleaned[start..=end]) {
                return reply;
            }
        }
    }

    tracing::warn!("failed to parse assistant response as JSON, using raw text");
    AssistantReply {
        reply: response.to_string(),
        tool: None,
    }
}

impl ToolCall {
    /// Argument validation mirroring the catalog rules, so a bad proposal
    /// is refused before it is ever stored.
    pub fn validate(&self) -> Result<(), String> {
        let check_days = |days: &Option<Vec<String>>| -> Result<(), String> {
            if let Some(days) = days {
                for day in days {
                    if !WEEKDAY_KEYS.contains(&day.as_str()) {
                        return Err(format!("invalid weekday: {day}"));
                    }
                }
            }
            Ok(())
        };
        let check_duration = |duration: i64| -> Result<(), String> {
            if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&duration) {
                return Err(format!(
                    "duration must be between {MIN_DURATION_MINUTES} and {MAX_DURATION_MINUTES} minutes"
                ));
            }
            Ok(())
        };

        match self {
            ToolCall::CreateService {
                name,
                duration_minutes,
                price_cents,
                available_days,
            } => {
                if name.trim().is_empty() {
                    return Err("service name must not be empty".to_string());
                }
                check_duration(*duration_minutes)?;
                if *price_cents < 0 {
                    return Err("price must not be negative".to_string());
                }
                check_days(available_days)
            }
            ToolCall::UpdateService {
                service_id,
                duration_minutes,
                price_cents,
                available_days,
                ..
            } => {
                if service_id.trim().is_empty() {
                    return Err("service_id must not be empty".to_string());
                }
                if let Some(duration) = duration_minutes {
                    check_duration(*duration)?;
                }
                if let Some(price) = price_cents {
                    if *price < 0 {
                        return Err("price must not be negative".to_string());
                    }
                }
                check_days(available_days)
            }
            ToolCall::DeleteService { service_id } => {
                if service_id.trim().is_empty() {
                    return Err("service_id must not be empty".to_string());
                }
                Ok(())
            }
            ToolCall::ListServices => Ok(()),
        }
    }

    /// Human-readable description shown to the owner before confirmation.
    pub fn summary(&self) -> String {
        match self {
            ToolCall::CreateService {
                name,
                duration_minutes,
                price_cents,
                ..
            } => format!(
                "Create service \"{name}\" ({duration_minutes} min, ${}.{:02})",
                price_cents / 100,
                price_cents % 100
            ),
            ToolCall::UpdateService { service_id, .. } => {
                format!("Update service {service_id}")
            }
            ToolCall::DeleteService { service_id } => {
                format!("Deactivate service {service_id}")
            }
            ToolCall::ListServices => "List services".to_string(),
        }
    }
}

/// Applies a confirmed mutation through the same catalog path as the REST
/// endpoints. ListServices never reaches here; it executes directly at chat
/// time.
pub fn apply_tool(
    conn: &Connection,
    business_id: &str,
    tool: &ToolCall,
) -> Result<serde_json::Value, AppError> {
    match tool {
        ToolCall::CreateService {
            name,
            duration_minutes,
            price_cents,
            available_days,
        } => {
            let service = catalog::create_service(
                conn,
                business_id,
                NewService {
                    name: name.clone(),
                    duration_minutes: *duration_minutes,
                    price_cents: *price_cents,
                    available_days: available_days.clone(),
                },
            )?;
            Ok(serde_json::to_value(service).map_err(anyhow::Error::from)?)
        }
        ToolCall::UpdateService {
            service_id,
            name,
            duration_minutes,
            price_cents,
            available_days,
        } => {
            let service = catalog::update_service(
                conn,
                business_id,
                service_id,
                ServicePatch {
                    name: name.clone(),
                    duration_minutes: *duration_minutes,
                    price_cents: *price_cents,
                    available_days: available_days.clone(),
                },
            )?;
            Ok(serde_json::to_value(service).map_err(anyhow::Error::from)?)
        }
        ToolCall::DeleteService { service_id } => {
            catalog::deactivate_service(conn, business_id, service_id)?;
            Ok(serde_json::json!({ "deactivated": service_id }))
        }
        ToolCall::ListServices => {
            let services = catalog::list_services(conn, business_id, false)?;
            Ok(serde_json::to_value(services).map_err(anyhow::Error::from)?)
        }
    }
}
