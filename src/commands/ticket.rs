//! Help-Desk Commands

use reqwest::Method;
use serde::Serialize;

use super::ApiClient;
use crate::error::ClientResult;
use crate::models::{HelpDeskTicket, Priority, TicketStatus};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTicket<'a> {
    pub user_id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<&'a str>,
}

/// Listing filters; unset ones are not sent
#[derive(Debug, Clone, Default)]
pub struct TicketQuery {
    pub status: Option<TicketStatus>,
    pub assigned_to: Option<String>,
    pub user_id: Option<String>,
}

impl TicketQuery {
    fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(assigned_to) = &self.assigned_to {
            pairs.push(("assignedTo", assigned_to.clone()));
        }
        if let Some(user_id) = &self.user_id {
            pairs.push(("userId", user_id.clone()));
        }
        pairs
    }
}

#[derive(Serialize)]
struct StatusArgs {
    status: TicketStatus,
}

#[derive(Serialize)]
struct NoteArgs<'a> {
    author: &'a str,
    content: &'a str,
}

impl ApiClient {
    pub async fn list_tickets(&self, query: &TicketQuery) -> ClientResult<Vec<HelpDeskTicket>> {
        self.get(self.url(&["help-desk"]), &query.pairs()).await
    }

    pub async fn create_ticket(&self, ticket: &NewTicket<'_>) -> ClientResult<HelpDeskTicket> {
        self.send_json(Method::POST, self.url(&["help-desk"]), ticket).await
    }

    pub async fn set_ticket_status(&self, id: &str, status: TicketStatus) -> ClientResult<HelpDeskTicket> {
        let url = self.url(&["help-desk", id, "status"]);
        self.send_json(Method::POST, url, &StatusArgs { status }).await
    }

    pub async fn add_ticket_note(&self, id: &str, author: &str, content: &str) -> ClientResult<HelpDeskTicket> {
        let url = self.url(&["help-desk", id, "notes"]);
        self.send_json(Method::POST, url, &NoteArgs { author, content }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_sends_only_set_filters() {
        let query = TicketQuery {
            status: Some(TicketStatus::InProgress),
            user_id: Some("alice".into()),
            ..Default::default()
        };
        assert_eq!(
            query.pairs(),
            vec![("status", "in-progress".to_string()), ("userId", "alice".to_string())]
        );
        assert!(TicketQuery::default().pairs().is_empty());
    }
}
