//! Help-Desk Commands

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::error::{double_option, not_found, CommandResult, JsonBody};
use crate::domain::{require_text, HelpDeskTicket, Priority, TicketNote, TicketStatus};
use crate::repository::{Repository, TicketFilter};
use crate::SharedState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicketInput {
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub assigned_to: Option<String>,
}

/// Status changes go through `/status`, not here
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTicketInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub assigned_to: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct StatusInput {
    pub status: TicketStatus,
}

#[derive(Debug, Deserialize)]
pub struct NoteInput {
    pub author: String,
    pub content: String,
}

pub async fn list_tickets(
    State(state): State<SharedState>,
    Query(filter): Query<TicketFilter>,
) -> CommandResult<Json<Vec<HelpDeskTicket>>> {
    Ok(Json(state.ticket_repo.list_filtered(&filter).await?))
}

pub async fn create_ticket(
    State(state): State<SharedState>,
    JsonBody(input): JsonBody<CreateTicketInput>,
) -> CommandResult<(StatusCode, Json<HelpDeskTicket>)> {
    let mut ticket = HelpDeskTicket::new(&input.user_id, &input.title)?;
    ticket.description = input.description;
    ticket.priority = input.priority.unwrap_or_default();
    if let Some(category) = input.category {
        ticket.category = require_text("category", &category)?;
    }
    ticket.assigned_to = input.assigned_to.filter(|a| !a.trim().is_empty());

    let created = state.ticket_repo.create(&ticket).await?;
    log::info!("Opened ticket {} for {}", created.ticket_number, created.user_id);
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_ticket(State(state): State<SharedState>, Path(id): Path<String>) -> CommandResult<Json<HelpDeskTicket>> {
    let ticket = state.ticket_repo.find_by_id(&id).await?.ok_or_else(|| not_found("Ticket", &id))?;
    Ok(Json(ticket))
}

pub async fn update_ticket(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<UpdateTicketInput>,
) -> CommandResult<Json<HelpDeskTicket>> {
    let mut ticket = state.ticket_repo.find_by_id(&id).await?.ok_or_else(|| not_found("Ticket", &id))?;

    if let Some(title) = input.title {
        ticket.title = require_text("title", &title)?;
    }
    if let Some(description) = input.description {
        ticket.description = description;
    }
    if let Some(priority) = input.priority {
        ticket.priority = priority;
    }
    if let Some(category) = input.category {
        ticket.category = require_text("category", &category)?;
    }
    if let Some(assigned_to) = input.assigned_to {
        ticket.assigned_to = assigned_to;
    }

    Ok(Json(state.ticket_repo.update(&ticket).await?))
}

pub async fn delete_ticket(State(state): State<SharedState>, Path(id): Path<String>) -> CommandResult<StatusCode> {
    state.ticket_repo.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_ticket_status(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<StatusInput>,
) -> CommandResult<Json<HelpDeskTicket>> {
    let ticket = state.ticket_repo.set_status(&id, input.status).await?;
    log::info!("Ticket {} is now {}", ticket.ticket_number, ticket.status.as_str());
    Ok(Json(ticket))
}

pub async fn add_ticket_note(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<NoteInput>,
) -> CommandResult<(StatusCode, Json<HelpDeskTicket>)> {
    let note = TicketNote::new(&input.author, &input.content)?;
    let ticket = state.ticket_repo.add_note(&id, &note).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}
