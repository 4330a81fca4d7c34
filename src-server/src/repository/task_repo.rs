//! Task Repository
//!
//! SQLite-backed implementation for tasks, their subtasks and assignees.
//! A task row owns its `subtasks` and `task_assignees` rows (cascade delete).

use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::db::{not_initialized, SharedConnection};
use super::traits::{Repository, UserScopedRepository};
use crate::domain::{now_millis, DomainError, DomainResult, Priority, Schedule, Subtask, Task};

const TASK_COLUMNS: &str = "t.id, t.user_id, t.title, t.description, t.due_date, t.priority, t.completed, \
     t.has_schedule, t.schedule_time, t.schedule_reminder, t.created_at, t.updated_at";

/// SQLite implementation of Task repository
pub struct TaskRepository {
    conn: SharedConnection,
}

impl TaskRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// Tasks linked to a group or team, in link order
    pub async fn list_for_group(&self, group_id: &str) -> DomainResult<Vec<Task>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let sql = format!(
            "SELECT {} FROM tasks t JOIN group_tasks g ON g.task_id = t.id \
             WHERE g.group_id = ? ORDER BY g.position ASC",
            TASK_COLUMNS
        );
        query_tasks(conn, &sql, params![group_id])
    }

    /// Append a subtask at the end of the task's checklist
    pub async fn add_subtask(&self, task_id: &str, subtask: &Subtask) -> DomainResult<Subtask> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        ensure_task_exists(conn, task_id)?;

        let position: i64 = conn.query_row(
            "SELECT COALESCE(MAX(position), -1) + 1 FROM subtasks WHERE task_id = ?",
            params![task_id],
            |row| row.get(0),
        )?;

        insert_subtask(conn, task_id, subtask, position)?;
        touch_task(conn, task_id)?;

        Ok(subtask.clone())
    }

    pub async fn update_subtask(&self, task_id: &str, subtask: &Subtask) -> DomainResult<Subtask> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let now = now_millis();
        let changed = conn.execute(
            "UPDATE subtasks SET title = ?, completed = ?, updated_at = ? WHERE id = ? AND task_id = ?",
            params![subtask.title, subtask.completed as i64, now, subtask.id, task_id],
        )?;
        if changed == 0 {
            return Err(DomainError::NotFound(format!("Subtask {} in task {}", subtask.id, task_id)));
        }
        touch_task(conn, task_id)?;

        let mut updated = subtask.clone();
        updated.updated_at = now;
        Ok(updated)
    }

    pub async fn delete_subtask(&self, task_id: &str, subtask_id: &str) -> DomainResult<()> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let changed = conn.execute(
            "DELETE FROM subtasks WHERE id = ? AND task_id = ?",
            params![subtask_id, task_id],
        )?;
        if changed == 0 {
            return Err(DomainError::NotFound(format!("Subtask {} in task {}", subtask_id, task_id)));
        }
        touch_task(conn, task_id)?;
        Ok(())
    }

    /// Add assignees, keeping existing ones and their order
    pub async fn assign_users(&self, task_id: &str, user_ids: &[String]) -> DomainResult<Task> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        ensure_task_exists(conn, task_id)?;

        let tx = conn.unchecked_transaction()?;
        for user_id in user_ids {
            tx.execute(
                "INSERT OR IGNORE INTO task_assignees (task_id, user_id, position) \
                 SELECT ?1, ?2, COALESCE(MAX(position), -1) + 1 FROM task_assignees WHERE task_id = ?1",
                params![task_id, user_id],
            )?;
        }
        touch_task(&tx, task_id)?;
        tx.commit()?;

        load_task(conn, task_id)?.ok_or_else(|| DomainError::NotFound(format!("Task {}", task_id)))
    }
}

#[async_trait]
impl Repository<Task> for TaskRepository {
    async fn create(&self, entity: &Task) -> DomainResult<Task> {
        entity.validate()?;

        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        if task_exists(conn, &entity.id)? {
            return Err(DomainError::Conflict(format!("Task {} already exists", entity.id)));
        }

        let tx = conn.unchecked_transaction()?;
        let (has_schedule, schedule_time, schedule_reminder) = schedule_columns(&entity.schedule);
        tx.execute(
            "INSERT INTO tasks (id, user_id, title, description, due_date, priority, completed, \
             has_schedule, schedule_time, schedule_reminder, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                entity.id,
                entity.user_id,
                entity.title,
                entity.description,
                entity.due_date.map(format_date),
                entity.priority.as_str(),
                entity.completed as i64,
                has_schedule,
                schedule_time,
                schedule_reminder,
                entity.created_at,
                entity.updated_at
            ],
        )?;
        write_children(&tx, entity)?;
        tx.commit()?;

        Ok(entity.clone())
    }

    async fn find_by_id(&self, id: &String) -> DomainResult<Option<Task>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;
        load_task(conn, id)
    }

    async fn list(&self) -> DomainResult<Vec<Task>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let sql = format!("SELECT {} FROM tasks t ORDER BY t.created_at ASC, t.id ASC", TASK_COLUMNS);
        query_tasks(conn, &sql, [])
    }

    async fn update(&self, entity: &Task) -> DomainResult<Task> {
        entity.validate()?;

        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let now = now_millis();
        let (has_schedule, schedule_time, schedule_reminder) = schedule_columns(&entity.schedule);

        let tx = conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE tasks SET title = ?, description = ?, due_date = ?, priority = ?, completed = ?, \
             has_schedule = ?, schedule_time = ?, schedule_reminder = ?, updated_at = ? WHERE id = ?",
            params![
                entity.title,
                entity.description,
                entity.due_date.map(format_date),
                entity.priority.as_str(),
                entity.completed as i64,
                has_schedule,
                schedule_time,
                schedule_reminder,
                now,
                entity.id
            ],
        )?;
        if changed == 0 {
            return Err(DomainError::NotFound(format!("Task {}", entity.id)));
        }
        tx.execute("DELETE FROM subtasks WHERE task_id = ?", params![entity.id])?;
        tx.execute("DELETE FROM task_assignees WHERE task_id = ?", params![entity.id])?;
        write_children(&tx, entity)?;
        tx.commit()?;

        let mut updated = entity.clone();
        updated.updated_at = now;
        Ok(updated)
    }

    async fn delete(&self, id: &String) -> DomainResult<()> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        // subtasks, assignees and group links cascade
        let changed = conn.execute("DELETE FROM tasks WHERE id = ?", params![id])?;
        if changed == 0 {
            return Err(DomainError::NotFound(format!("Task {}", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl UserScopedRepository<Task> for TaskRepository {
    async fn list_by_user(&self, user_id: &str) -> DomainResult<Vec<Task>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let sql = format!(
            "SELECT {} FROM tasks t WHERE t.user_id = ?1 \
             OR t.id IN (SELECT task_id FROM task_assignees WHERE user_id = ?1) \
             ORDER BY t.created_at ASC, t.id ASC",
            TASK_COLUMNS
        );
        query_tasks(conn, &sql, params![user_id])
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn schedule_columns(schedule: &Option<Schedule>) -> (i64, Option<String>, i64) {
    match schedule {
        Some(s) => (1, s.time.clone(), s.reminder as i64),
        None => (0, None, 0),
    }
}

fn task_exists(conn: &Connection, id: &str) -> DomainResult<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM tasks WHERE id = ?", params![id], |_| Ok(()))
        .optional()?
        .is_some())
}

fn ensure_task_exists(conn: &Connection, id: &str) -> DomainResult<()> {
    if task_exists(conn, id)? {
        Ok(())
    } else {
        Err(DomainError::NotFound(format!("Task {}", id)))
    }
}

fn touch_task(conn: &Connection, id: &str) -> DomainResult<()> {
    conn.execute("UPDATE tasks SET updated_at = ? WHERE id = ?", params![now_millis(), id])?;
    Ok(())
}

fn write_children(conn: &Connection, task: &Task) -> DomainResult<()> {
    for (position, subtask) in task.subtasks.iter().enumerate() {
        insert_subtask(conn, &task.id, subtask, position as i64)?;
    }
    for (position, user_id) in task.assigned_users.iter().enumerate() {
        conn.execute(
            "INSERT OR IGNORE INTO task_assignees (task_id, user_id, position) VALUES (?, ?, ?)",
            params![task.id, user_id, position as i64],
        )?;
    }
    Ok(())
}

/// Subtask ids are unique across all tasks; a reused one is a conflict
fn insert_subtask(conn: &Connection, task_id: &str, subtask: &Subtask, position: i64) -> DomainResult<()> {
    conn.execute(
        "INSERT INTO subtasks (id, task_id, title, completed, position, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
            subtask.id,
            task_id,
            subtask.title,
            subtask.completed as i64,
            position,
            subtask.created_at,
            subtask.updated_at
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation => {
            DomainError::Conflict(format!("Subtask {} already exists", subtask.id))
        }
        other => other.into(),
    })?;
    Ok(())
}

fn load_task(conn: &Connection, id: &str) -> DomainResult<Option<Task>> {
    let sql = format!("SELECT {} FROM tasks t WHERE t.id = ?", TASK_COLUMNS);
    Ok(query_tasks(conn, &sql, params![id])?.into_iter().next())
}

fn query_tasks<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> DomainResult<Vec<Task>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;

    let mut tasks = Vec::new();
    while let Some(row) = rows.next()? {
        tasks.push(row_to_task(row)?);
    }
    drop(rows);

    for task in tasks.iter_mut() {
        load_children(conn, task)?;
    }
    Ok(tasks)
}

fn load_children(conn: &Connection, task: &mut Task) -> DomainResult<()> {
    let mut stmt = conn.prepare(
        "SELECT id, title, completed, created_at, updated_at FROM subtasks \
         WHERE task_id = ? ORDER BY position ASC, created_at ASC",
    )?;
    let subtasks = stmt.query_map(params![task.id], |row| {
        Ok(Subtask {
            id: row.get(0)?,
            title: row.get(1)?,
            completed: row.get::<_, i64>(2)? != 0,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    })?;
    task.subtasks = subtasks.collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare("SELECT user_id FROM task_assignees WHERE task_id = ? ORDER BY position ASC")?;
    let users = stmt.query_map(params![task.id], |row| row.get::<_, String>(0))?;
    task.assigned_users = users.collect::<Result<Vec<_>, _>>()?;
    Ok(())
}

/// Convert a database row to Task (without subtasks/assignees)
fn row_to_task(row: &Row) -> DomainResult<Task> {
    let due_date = match row.get::<_, Option<String>>(4)? {
        Some(raw) => Some(
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map_err(|e| DomainError::Internal(format!("bad due_date '{}': {}", raw, e)))?,
        ),
        None => None,
    };
    let schedule = if row.get::<_, i64>(7)? != 0 {
        Some(Schedule {
            time: row.get(8)?,
            reminder: row.get::<_, i64>(9)? != 0,
        })
    } else {
        None
    };

    Ok(Task {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        due_date,
        priority: Priority::from_str(&row.get::<_, String>(5)?),
        completed: row.get::<_, i64>(6)? != 0,
        subtasks: Vec::new(),
        assigned_users: Vec::new(),
        schedule,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}
