//! Template Repository
//!
//! SQLite-backed implementation for task templates.

use async_trait::async_trait;
use rusqlite::{params, Row};

use super::db::{not_initialized, SharedConnection};
use super::traits::{Repository, UserScopedRepository};
use crate::domain::{now_millis, require_text, DomainError, DomainResult, Priority, Template};

const TEMPLATE_COLUMNS: &str =
    "id, user_id, name, description, task_title, priority, created_at, updated_at";

pub struct TemplateRepository {
    conn: SharedConnection,
}

impl TemplateRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl Repository<Template> for TemplateRepository {
    async fn create(&self, entity: &Template) -> DomainResult<Template> {
        require_text("name", &entity.name)?;
        require_text("taskTitle", &entity.task_title)?;

        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        conn.execute(
            "INSERT INTO templates (id, user_id, name, description, task_title, priority, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                entity.id,
                entity.user_id,
                entity.name,
                entity.description,
                entity.task_title,
                entity.priority.as_str(),
                entity.created_at,
                entity.updated_at
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation => {
                DomainError::Conflict(format!("Template {} already exists", entity.id))
            }
            other => other.into(),
        })?;

        Ok(entity.clone())
    }

    async fn find_by_id(&self, id: &String) -> DomainResult<Option<Template>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let mut stmt = conn.prepare(&format!("SELECT {} FROM templates WHERE id = ?", TEMPLATE_COLUMNS))?;
        let mut rows = stmt.query(params![id])?;

        match rows.next()? {
            Some(row) => Ok(Some(row_to_template(row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> DomainResult<Vec<Template>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM templates ORDER BY name COLLATE NOCASE ASC",
            TEMPLATE_COLUMNS
        ))?;
        let mut rows = stmt.query([])?;

        let mut templates = Vec::new();
        while let Some(row) = rows.next()? {
            templates.push(row_to_template(row)?);
        }
        Ok(templates)
    }

    async fn update(&self, entity: &Template) -> DomainResult<Template> {
        require_text("name", &entity.name)?;
        require_text("taskTitle", &entity.task_title)?;

        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let now = now_millis();
        let changed = conn.execute(
            "UPDATE templates SET name = ?, description = ?, task_title = ?, priority = ?, updated_at = ? WHERE id = ?",
            params![
                entity.name,
                entity.description,
                entity.task_title,
                entity.priority.as_str(),
                now,
                entity.id
            ],
        )?;
        if changed == 0 {
            return Err(DomainError::NotFound(format!("Template {}", entity.id)));
        }

        let mut updated = entity.clone();
        updated.updated_at = now;
        Ok(updated)
    }

    async fn delete(&self, id: &String) -> DomainResult<()> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let changed = conn.execute("DELETE FROM templates WHERE id = ?", params![id])?;
        if changed == 0 {
            return Err(DomainError::NotFound(format!("Template {}", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl UserScopedRepository<Template> for TemplateRepository {
    async fn list_by_user(&self, user_id: &str) -> DomainResult<Vec<Template>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM templates WHERE user_id = ? ORDER BY name COLLATE NOCASE ASC",
            TEMPLATE_COLUMNS
        ))?;
        let mut rows = stmt.query(params![user_id])?;

        let mut templates = Vec::new();
        while let Some(row) = rows.next()? {
            templates.push(row_to_template(row)?);
        }
        Ok(templates)
    }
}

fn row_to_template(row: &Row) -> DomainResult<Template> {
    Ok(Template {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        task_title: row.get(4)?,
        priority: Priority::from_str(&row.get::<_, String>(5)?),
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
