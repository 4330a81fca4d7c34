//! Help-Desk Ticket Entity
//!
//! A support request with a status lifecycle:
//! open -> in-progress -> resolved -> closed.

use serde::{Deserialize, Serialize};

use super::entity::{new_id, now_millis, require_text, DomainError, DomainResult, Entity};
use super::task::Priority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TicketStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in-progress",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "open" => Ok(TicketStatus::Open),
            "in-progress" => Ok(TicketStatus::InProgress),
            "resolved" => Ok(TicketStatus::Resolved),
            "closed" => Ok(TicketStatus::Closed),
            other => Err(DomainError::InvalidInput(format!("unknown ticket status '{}'", other))),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            TicketStatus::Open => 0,
            TicketStatus::InProgress => 1,
            TicketStatus::Resolved => 2,
            TicketStatus::Closed => 3,
        }
    }

    /// Forward moves (skipping allowed) plus reopening a resolved ticket.
    /// Closed is terminal.
    pub fn can_transition_to(&self, next: TicketStatus) -> bool {
        match (self, next) {
            (TicketStatus::Resolved, TicketStatus::Open) => true,
            (current, next) => next.rank() >= current.rank(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketNote {
    pub id: String,
    pub author: String,
    pub content: String,
    pub created_at: i64,
}

impl TicketNote {
    pub fn new(author: &str, content: &str) -> DomainResult<Self> {
        Ok(Self {
            id: new_id(),
            author: require_text("author", author)?,
            content: require_text("content", content)?,
            created_at: now_millis(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelpDeskTicket {
    pub id: String,
    /// Human-facing sequential number, e.g. "TKT-00042"
    pub ticket_number: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TicketStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub category: String,
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub notes: Vec<TicketNote>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl HelpDeskTicket {
    pub fn new(user_id: &str, title: &str) -> DomainResult<Self> {
        let now = now_millis();
        Ok(Self {
            id: new_id(),
            ticket_number: String::new(),
            user_id: require_text("userId", user_id)?,
            title: require_text("title", title)?,
            description: String::new(),
            status: TicketStatus::Open,
            priority: Priority::default(),
            category: "general".to_string(),
            assigned_to: None,
            notes: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Move to `next`, enforcing the lifecycle
    pub fn transition(&mut self, next: TicketStatus) -> DomainResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::Conflict(format!(
                "ticket {} cannot move from {} to {}",
                self.ticket_number,
                self.status.as_str(),
                next.as_str()
            )));
        }
        self.status = next;
        Ok(())
    }
}

impl Entity for HelpDeskTicket {
    type Id = String;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Format the n-th ticket number
pub fn format_ticket_number(seq: i64) -> String {
    format!("TKT-{:05}", seq)
}
