use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Business, ChatMessage, Owner, Proposal, ProposalStatus, ToolCall};
use crate::services::assistant::{tools, Message};
use crate::services::catalog;
use crate::state::AppState;

/// Sessions are trimmed to this many messages on every save.
pub const MAX_SESSION_MESSAGES: usize = 20;

const SYSTEM_PROMPT: &str = r#"You are a booking-platform assistant helping a business owner manage their service catalog. Analyze the owner's latest message in context of the conversation history.

Return ONLY valid JSON (no markdown, no explanation) with this exact structure:
{
  "reply": "Your concise reply to the owner",
  "tool": null
}

When the owner asks you to change the catalog, set "tool" to exactly one of:
  {"name": "create_service", "args": {"name": "...", "duration_minutes": 30, "price_cents": 3500, "available_days": ["mon","tue"] or null}}
  {"name": "update_service", "args": {"service_id": "...", "name": null, "duration_minutes": null, "price_cents": null, "available_days": null}}
  {"name": "delete_service", "args": {"service_id": "..."}}
  {"name": "list_services"}

Rules:
- Durations are minutes (minimum 15). Prices are integer cents. Weekdays are mon..sun.
- For update/delete, use a service_id from the catalog shown in the context.
- Mutations are staged as proposals the owner must confirm; say so in your reply.
- If the request is unrelated to the catalog, answer briefly with "tool": null."#;

pub struct AssistantOutcome {
    pub reply: String,
    pub proposal: Option<Proposal>,
    /// Direct result of a read-only tool (list_services).
    pub data: Option<serde_json::Value>,
}

fn business_context(conn: &rusqlite::Connection, business: &Business) -> Result<String, AppError> {
    let services = catalog::list_services(conn, &business.id, false)?;
    let mut lines = vec![format!("Business: {}", business.name)];
    if services.is_empty() {
        lines.push("Catalog: empty".to_string());
    } else {
        lines.push("Catalog:".to_string());
        for s in services {
            let days = s
                .available_days
                .map(|d| d.join(","))
                .unwrap_or_else(|| "any open day".to_string());
            lines.push(format!(
                "- id={} name={} duration={}min price_cents={} days={}",
                s.id, s.name, s.duration_minutes, s.price_cents, days
            ));
        }
    }
    Ok(lines.join("\n"))
}

pub async fn process_owner_message(
    state: &Arc<AppState>,
    owner: &Owner,
    business: &Business,
    text: &str,
) -> Result<AssistantOutcome, AppError> {
    let (mut history, context) = {
        let db = state.db.lock().unwrap();
        let history = queries::get_chat_messages(&db, &owner.id)?;
        let context = business_context(&db, business)?;
        (history, context)
    };

    history.push(ChatMessage {
        role: "user".to_string(),
        content: text.to_string(),
    });

    let messages: Vec<Message> = history
        .iter()
        .map(|m| Message {
            role: m.role.clone(),
            content: m.content.clone(),
        })
        .collect();

    let system = format!("{SYSTEM_PROMPT}\n\nBusiness context:\n{context}");

    let response = state
        .llm
        .chat(&system, &messages)
        .await
        .map_err(|e| AppError::Ai(e.to_string()))?;

    let parsed = tools::parse_assistant_reply(&response);

    tracing::info!(
        owner_id = %owner.id,
        tool = ?parsed.tool,
        "assistant turn"
    );

    let mut outcome = AssistantOutcome {
        reply: parsed.reply,
        proposal: None,
        data: None,
    };

    if let Some(tool) = parsed.tool {
        match tool.validate() {
            Err(msg) => {
                tracing::warn!(owner_id = %owner.id, error = %msg, "assistant tool rejected");
                outcome.reply = format!("{} (The suggested change was not staged: {msg})", outcome.reply);
            }
            Ok(()) => {
                if tool.is_mutation() {
                    let proposal = stage_proposal(state, owner, tool)?;
                    outcome.proposal = Some(proposal);
                } else {
                    let db = state.db.lock().unwrap();
                    outcome.data = Some(tools::apply_tool(&db, &business.id, &tool)?);
                }
            }
        }
    }

    history.push(ChatMessage {
        role: "assistant".to_string(),
        content: outcome.reply.clone(),
    });
    if history.len() > MAX_SESSION_MESSAGES {
        history.drain(..history.len() - MAX_SESSION_MESSAGES);
    }
    {
        let db = state.db.lock().unwrap();
        queries::save_chat_messages(&db, &owner.id, &history)?;
    }

    Ok(outcome)
}

fn stage_proposal(
    state: &Arc<AppState>,
    owner: &Owner,
    tool: ToolCall,
) -> Result<Proposal, AppError> {
    let now = Utc::now().naive_utc();
    let proposal = Proposal {
        id: Uuid::new_v4().to_string(),
        owner_id: owner.id.clone(),
        summary: tool.summary(),
        tool_call: tool,
        status: ProposalStatus::Pending,
        created_at: now,
        updated_at: now,
    };

    let db = state.db.lock().unwrap();
    queries::insert_proposal(&db, &proposal)?;
    Ok(proposal)
}

/// Confirms a pending proposal: applies its tool through the catalog and
/// marks it applied. Already-resolved proposals are a validation error.
pub fn confirm_proposal(
    conn: &rusqlite::Connection,
    owner: &Owner,
    business: &Business,
    proposal_id: &str,
) -> Result<serde_json::Value, AppError> {
    let proposal = queries::get_proposal(conn, proposal_id, &owner.id)?
        .ok_or_else(|| AppError::NotFound(format!("proposal {proposal_id}")))?;

    if proposal.status != ProposalStatus::Pending {
        return Err(AppError::Validation(format!(
            "proposal is already {}",
            proposal.status.as_str()
        )));
    }

    let result = tools::apply_tool(conn, &business.id, &proposal.tool_call)?;
    queries::update_proposal_status(conn, proposal_id, ProposalStatus::Applied)?;

    tracing::info!(proposal_id, owner_id = %owner.id, "proposal applied");
    Ok(result)
}

pub fn reject_proposal(
    conn: &rusqlite::Connection,
    owner: &Owner,
    proposal_id: &str,
) -> Result<(), AppError> {
    let proposal = queries::get_proposal(conn, proposal_id, &owner.id)?
        .ok_or_else(|| AppError::NotFound(format!("proposal {proposal_id}")))?;

    if proposal.status != ProposalStatus::Pending {
        return Err(AppError::Validation(format!(
            "proposal is already {}",
            proposal.status.as_str()
        )));
    }

    queries::update_proposal_status(conn, proposal_id, ProposalStatus::Rejected)?;
    Ok(())
}
