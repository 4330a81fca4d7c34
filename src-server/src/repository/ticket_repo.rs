//! Help-Desk Ticket Repository
//!
//! Tickets, their notes, and the sequential ticket-number counter.

use async_trait::async_trait;
use rusqlite::{params, Connection, Row};
use serde::Deserialize;

use super::db::{not_initialized, SharedConnection};
use super::traits::Repository;
use crate::domain::{
    format_ticket_number, now_millis, require_text, DomainError, DomainResult, HelpDeskTicket, Priority,
    TicketNote, TicketStatus,
};

const TICKET_COLUMNS: &str = "id, ticket_number, user_id, title, description, status, priority, category, \
     assigned_to, created_at, updated_at";

/// Optional listing filters, all combined with AND
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub assigned_to: Option<String>,
    pub user_id: Option<String>,
}

pub struct TicketRepository {
    conn: SharedConnection,
}

impl TicketRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// Reserve the next ticket number
    pub async fn next_ticket_number(&self) -> DomainResult<String> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;
        allocate_number(conn)
    }

    pub async fn list_filtered(&self, filter: &TicketFilter) -> DomainResult<Vec<HelpDeskTicket>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let sql = format!(
            "SELECT {} FROM tickets \
             WHERE (?1 IS NULL OR status = ?1) \
             AND (?2 IS NULL OR assigned_to = ?2) \
             AND (?3 IS NULL OR user_id = ?3) \
             ORDER BY created_at DESC, ticket_number DESC",
            TICKET_COLUMNS
        );
        query_tickets(
            conn,
            &sql,
            params![filter.status.map(|s| s.as_str()), filter.assigned_to, filter.user_id],
        )
    }

    pub async fn add_note(&self, ticket_id: &str, note: &TicketNote) -> DomainResult<HelpDeskTicket> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let mut ticket =
            load_ticket(conn, ticket_id)?.ok_or_else(|| DomainError::NotFound(format!("Ticket {}", ticket_id)))?;

        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO ticket_notes (id, ticket_id, author, content, created_at) VALUES (?, ?, ?, ?, ?)",
            params![note.id, ticket_id, note.author, note.content, note.created_at],
        )?;
        ticket.updated_at = now_millis();
        tx.execute(
            "UPDATE tickets SET updated_at = ? WHERE id = ?",
            params![ticket.updated_at, ticket_id],
        )?;
        tx.commit()?;

        ticket.notes.push(note.clone());
        Ok(ticket)
    }

    /// Apply a lifecycle transition
    pub async fn set_status(&self, ticket_id: &str, status: TicketStatus) -> DomainResult<HelpDeskTicket> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let mut ticket =
            load_ticket(conn, ticket_id)?.ok_or_else(|| DomainError::NotFound(format!("Ticket {}", ticket_id)))?;
        if ticket.status == status {
            return Ok(ticket);
        }
        ticket.transition(status)?;
        ticket.updated_at = now_millis();

        conn.execute(
            "UPDATE tickets SET status = ?, updated_at = ? WHERE id = ?",
            params![ticket.status.as_str(), ticket.updated_at, ticket_id],
        )?;
        Ok(ticket)
    }
}

#[async_trait]
impl Repository<HelpDeskTicket> for TicketRepository {
    /// Inserts the ticket, allocating a number when it has none
    async fn create(&self, entity: &HelpDeskTicket) -> DomainResult<HelpDeskTicket> {
        require_text("title", &entity.title)?;

        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        if load_ticket(conn, &entity.id)?.is_some() {
            return Err(DomainError::Conflict(format!("Ticket {} already exists", entity.id)));
        }

        let tx = conn.unchecked_transaction()?;
        let mut ticket = entity.clone();
        if ticket.ticket_number.is_empty() {
            ticket.ticket_number = allocate_number(&tx)?;
        }
        tx.execute(
            "INSERT INTO tickets (id, ticket_number, user_id, title, description, status, priority, category, \
             assigned_to, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                ticket.id,
                ticket.ticket_number,
                ticket.user_id,
                ticket.title,
                ticket.description,
                ticket.status.as_str(),
                ticket.priority.as_str(),
                ticket.category,
                ticket.assigned_to,
                ticket.created_at,
                ticket.updated_at
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation => {
                DomainError::Conflict(format!("Ticket number {} already used", ticket.ticket_number))
            }
            other => other.into(),
        })?;
        for note in &ticket.notes {
            tx.execute(
                "INSERT INTO ticket_notes (id, ticket_id, author, content, created_at) VALUES (?, ?, ?, ?, ?)",
                params![note.id, ticket.id, note.author, note.content, note.created_at],
            )?;
        }
        tx.commit()?;

        Ok(ticket)
    }

    async fn find_by_id(&self, id: &String) -> DomainResult<Option<HelpDeskTicket>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;
        load_ticket(conn, id)
    }

    async fn list(&self) -> DomainResult<Vec<HelpDeskTicket>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let sql = format!("SELECT {} FROM tickets ORDER BY created_at DESC, ticket_number DESC", TICKET_COLUMNS);
        query_tickets(conn, &sql, [])
    }

    /// Writes editable fields. Status changes go through `set_status`.
    async fn update(&self, entity: &HelpDeskTicket) -> DomainResult<HelpDeskTicket> {
        require_text("title", &entity.title)?;

        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let mut current =
            load_ticket(conn, &entity.id)?.ok_or_else(|| DomainError::NotFound(format!("Ticket {}", entity.id)))?;

        current.title = entity.title.clone();
        current.description = entity.description.clone();
        current.priority = entity.priority;
        current.category = entity.category.clone();
        current.assigned_to = entity.assigned_to.clone();
        current.updated_at = now_millis();

        conn.execute(
            "UPDATE tickets SET title = ?, description = ?, priority = ?, category = ?, assigned_to = ?, \
             updated_at = ? WHERE id = ?",
            params![
                current.title,
                current.description,
                current.priority.as_str(),
                current.category,
                current.assigned_to,
                current.updated_at,
                current.id
            ],
        )?;
        Ok(current)
    }

    async fn delete(&self, id: &String) -> DomainResult<()> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let changed = conn.execute("DELETE FROM tickets WHERE id = ?", params![id])?;
        if changed == 0 {
            return Err(DomainError::NotFound(format!("Ticket {}", id)));
        }
        Ok(())
    }
}

fn allocate_number(conn: &Connection) -> DomainResult<String> {
    let next: i64 = conn.query_row(
        "UPDATE ticket_counter SET last_value = last_value + 1 WHERE id = 1 RETURNING last_value",
        [],
        |row| row.get(0),
    )?;
    Ok(format_ticket_number(next))
}

fn load_ticket(conn: &Connection, id: &str) -> DomainResult<Option<HelpDeskTicket>> {
    let sql = format!("SELECT {} FROM tickets WHERE id = ?", TICKET_COLUMNS);
    Ok(query_tickets(conn, &sql, params![id])?.into_iter().next())
}

fn query_tickets<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> DomainResult<Vec<HelpDeskTicket>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;

    let mut tickets = Vec::new();
    while let Some(row) = rows.next()? {
        tickets.push(row_to_ticket(row)?);
    }
    drop(rows);

    for ticket in tickets.iter_mut() {
        let mut stmt = conn.prepare(
            "SELECT id, author, content, created_at FROM ticket_notes WHERE ticket_id = ? ORDER BY created_at ASC",
        )?;
        let notes = stmt.query_map(params![ticket.id], |row| {
            Ok(TicketNote {
                id: row.get(0)?,
                author: row.get(1)?,
                content: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?;
        ticket.notes = notes.collect::<Result<_, _>>()?;
    }
    Ok(tickets)
}

fn row_to_ticket(row: &Row) -> DomainResult<HelpDeskTicket> {
    Ok(HelpDeskTicket {
        id: row.get(0)?,
        ticket_number: row.get(1)?,
        user_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        status: TicketStatus::parse(&row.get::<_, String>(5)?)?,
        priority: Priority::from_str(&row.get::<_, String>(6)?),
        category: row.get(7)?,
        assigned_to: row.get(8)?,
        notes: Vec::new(),
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}
