use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// What the assistant LLM is asked to return: a customer-facing reply plus
/// at most one tool invocation.
#[derive(Debug, Clone, Deserialize)]
pub struct AssistantReply {
    pub reply: String,
    #[serde(default)]
    pub tool: Option<ToolCall>,
}

/// Closed union of the operations the assistant may request. Dispatch is a
/// match over these variants; adding one without handling it is a compile
/// error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "name", content = "args", rename_all = "snake_case")]
pub enum ToolCall {
    CreateService {
        name: String,
        duration_minutes: i64,
        price_cents: i64,
        #[serde(default)]
        available_days: Option<Vec<String>>,
    },
    UpdateService {
        service_id: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        duration_minutes: Option<i64>,
        #[serde(default)]
        price_cents: Option<i64>,
        #[serde(default)]
        available_days: Option<Vec<String>>,
    },
    DeleteService {
        service_id: String,
    },
    ListServices,
}

impl ToolCall {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, ToolCall::ListServices)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Applied,
    Rejected,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Pending => "pending",
            ProposalStatus::Applied => "applied",
            ProposalStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ProposalStatus::Pending),
            "applied" => Some(ProposalStatus::Applied),
            "rejected" => Some(ProposalStatus::Rejected),
            _ => None,
        }
    }
}

/// A pending AI-suggested mutation awaiting owner confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: String,
    pub owner_id: String,
    pub tool_call: ToolCall,
    pub summary: String,
    pub status: ProposalStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_call_tagged_deserialization() {
        let json = r#"{"name":"create_service","args":{"name":"Haircut","duration_minutes":30,"price_cents":3500}}"#;
        let tool: ToolCall = serde_json::from_str(json).unwrap();
        assert_eq!(
            tool,
            ToolCall::CreateService {
                name: "Haircut".to_string(),
                duration_minutes: 30,
                price_cents: 3500,
                available_days: None,
            }
        );
        assert!(tool.is_mutation());
    }

    #[test]
    fn test_list_services_has_no_args() {
        let json = r#"{"name":"list_services"}"#;
        let tool: ToolCall = serde_json::from_str(json).unwrap();
        assert_eq!(tool, ToolCall::ListServices);
        assert!(!tool.is_mutation());
    }

    #[test]
    fn test_unknown_tool_rejected() {
        let json = r#"{"name":"drop_tables","args":{}}"#;
        assert!(serde_json::from_str::<ToolCall>(json).is_err());
    }

    #[test]
    fn test_reply_without_tool() {
        let json = r#"{"reply":"You have 3 services."}"#;
        let reply: AssistantReply = serde_json::from_str(json).unwrap();
        assert!(reply.tool.is_none());
    }
}
