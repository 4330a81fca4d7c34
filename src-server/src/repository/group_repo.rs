//! Group Repository
//!
//! Groups and teams share `user_groups`; members and linked tasks live in
//! `group_members` / `group_tasks`. Membership rules are enforced by the
//! `Group` entity, so every mutation here is load -> mutate -> write back
//! under one connection lock.

use async_trait::async_trait;
use rusqlite::{params, Connection, Row};

use super::db::{not_initialized, SharedConnection};
use super::traits::Repository;
use crate::domain::{now_millis, require_text, DomainError, DomainResult, Group, GroupKind, MemberRole};

const GROUP_COLUMNS: &str = "id, kind, name, description, leader_id, created_at, updated_at";

pub struct GroupRepository {
    conn: SharedConnection,
}

impl GroupRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    pub async fn list_by_kind(&self, kind: GroupKind) -> DomainResult<Vec<Group>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let sql = format!(
            "SELECT {} FROM user_groups WHERE kind = ? ORDER BY name COLLATE NOCASE ASC",
            GROUP_COLUMNS
        );
        query_groups(conn, &sql, params![kind.as_str()])
    }

    /// Groups of `kind` that `user_id` belongs to
    pub async fn list_for_member(&self, kind: GroupKind, user_id: &str) -> DomainResult<Vec<Group>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let sql = format!(
            "SELECT {} FROM user_groups WHERE kind = ? \
             AND id IN (SELECT group_id FROM group_members WHERE user_id = ?) \
             ORDER BY name COLLATE NOCASE ASC",
            GROUP_COLUMNS
        );
        query_groups(conn, &sql, params![kind.as_str(), user_id])
    }

    pub async fn add_member(&self, id: &str, user_id: &str) -> DomainResult<Group> {
        self.modify(id, |group| group.add_member(user_id)).await
    }

    pub async fn remove_member(&self, id: &str, user_id: &str) -> DomainResult<Group> {
        self.modify(id, |group| group.remove_member(user_id)).await
    }

    pub async fn set_leader(&self, id: &str, user_id: &str) -> DomainResult<Group> {
        self.modify(id, |group| group.set_leader(user_id)).await
    }

    pub async fn add_task(&self, id: &str, task_id: &str) -> DomainResult<Group> {
        self.modify(id, |group| {
            group.link_task(task_id);
            Ok(())
        })
        .await
    }

    pub async fn remove_task(&self, id: &str, task_id: &str) -> DomainResult<Group> {
        self.modify(id, |group| {
            group.unlink_task(task_id);
            Ok(())
        })
        .await
    }

    async fn modify<F>(&self, id: &str, change: F) -> DomainResult<Group>
    where
        F: FnOnce(&mut Group) -> DomainResult<()> + Send,
    {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let mut group = load_group(conn, id)?.ok_or_else(|| DomainError::NotFound(format!("Group {}", id)))?;
        change(&mut group)?;
        group.updated_at = now_millis();

        let tx = conn.unchecked_transaction()?;
        write_group(&tx, &group)?;
        tx.commit()?;
        Ok(group)
    }
}

#[async_trait]
impl Repository<Group> for GroupRepository {
    async fn create(&self, entity: &Group) -> DomainResult<Group> {
        require_text("name", &entity.name)?;

        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        if load_group(conn, &entity.id)?.is_some() {
            return Err(DomainError::Conflict(format!("Group {} already exists", entity.id)));
        }

        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO user_groups (id, kind, name, description, leader_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                entity.id,
                entity.kind.as_str(),
                entity.name,
                entity.description,
                entity.leader_id,
                entity.created_at,
                entity.updated_at
            ],
        )?;
        write_children(&tx, entity)?;
        tx.commit()?;

        Ok(entity.clone())
    }

    async fn find_by_id(&self, id: &String) -> DomainResult<Option<Group>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;
        load_group(conn, id)
    }

    async fn list(&self) -> DomainResult<Vec<Group>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let sql = format!("SELECT {} FROM user_groups ORDER BY name COLLATE NOCASE ASC", GROUP_COLUMNS);
        query_groups(conn, &sql, [])
    }

    async fn update(&self, entity: &Group) -> DomainResult<Group> {
        require_text("name", &entity.name)?;

        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        if load_group(conn, &entity.id)?.is_none() {
            return Err(DomainError::NotFound(format!("Group {}", entity.id)));
        }

        let mut updated = entity.clone();
        updated.updated_at = now_millis();

        let tx = conn.unchecked_transaction()?;
        write_group(&tx, &updated)?;
        tx.commit()?;
        Ok(updated)
    }

    async fn delete(&self, id: &String) -> DomainResult<()> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let changed = conn.execute("DELETE FROM user_groups WHERE id = ?", params![id])?;
        if changed == 0 {
            return Err(DomainError::NotFound(format!("Group {}", id)));
        }
        Ok(())
    }
}

fn write_group(conn: &Connection, group: &Group) -> DomainResult<()> {
    conn.execute(
        "UPDATE user_groups SET name = ?, description = ?, leader_id = ?, updated_at = ? WHERE id = ?",
        params![group.name, group.description, group.leader_id, group.updated_at, group.id],
    )?;
    conn.execute("DELETE FROM group_members WHERE group_id = ?", params![group.id])?;
    conn.execute("DELETE FROM group_tasks WHERE group_id = ?", params![group.id])?;
    write_children(conn, group)
}

fn write_children(conn: &Connection, group: &Group) -> DomainResult<()> {
    for (user_id, role) in &group.members {
        conn.execute(
            "INSERT INTO group_members (group_id, user_id, role) VALUES (?, ?, ?)",
            params![group.id, user_id, role.as_str()],
        )?;
    }
    for (position, task_id) in group.tasks.iter().enumerate() {
        conn.execute(
            "INSERT INTO group_tasks (group_id, task_id, position) VALUES (?, ?, ?)",
            params![group.id, task_id, position as i64],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation => {
                DomainError::NotFound(format!("Task {}", task_id))
            }
            other => other.into(),
        })?;
    }
    Ok(())
}

fn load_group(conn: &Connection, id: &str) -> DomainResult<Option<Group>> {
    let sql = format!("SELECT {} FROM user_groups WHERE id = ?", GROUP_COLUMNS);
    Ok(query_groups(conn, &sql, params![id])?.into_iter().next())
}

fn query_groups<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> DomainResult<Vec<Group>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;

    let mut groups = Vec::new();
    while let Some(row) = rows.next()? {
        groups.push(row_to_group(row)?);
    }
    drop(rows);

    for group in groups.iter_mut() {
        let mut stmt = conn.prepare("SELECT user_id, role FROM group_members WHERE group_id = ?")?;
        let members = stmt.query_map(params![group.id], |row| {
            Ok((row.get::<_, String>(0)?, MemberRole::from_str(&row.get::<_, String>(1)?)))
        })?;
        group.members = members.collect::<Result<_, _>>()?;

        let mut stmt = conn.prepare("SELECT task_id FROM group_tasks WHERE group_id = ? ORDER BY position ASC")?;
        let tasks = stmt.query_map(params![group.id], |row| row.get::<_, String>(0))?;
        group.tasks = tasks.collect::<Result<_, _>>()?;
    }
    Ok(groups)
}

fn row_to_group(row: &Row) -> DomainResult<Group> {
    Ok(Group {
        id: row.get(0)?,
        kind: GroupKind::from_str(&row.get::<_, String>(1)?),
        name: row.get(2)?,
        description: row.get(3)?,
        members: Default::default(),
        tasks: Vec::new(),
        leader_id: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}
