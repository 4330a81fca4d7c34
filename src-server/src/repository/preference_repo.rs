//! Preference Repository
//!
//! Settings and profile bags, one row per (scope, user, key). Values are
//! stored as JSON text.

use rusqlite::{params, Connection};
use serde_json::Value;

use super::db::{not_initialized, SharedConnection};
use crate::domain::{merge_preferences, now_millis, validate_key, DomainResult, PreferenceScope, Preferences};

pub struct PreferenceRepository {
    conn: SharedConnection,
}

impl PreferenceRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// Stored bag; empty if the user has none
    pub async fn get(&self, scope: PreferenceScope, user_id: &str) -> DomainResult<Preferences> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;
        load_bag(conn, scope, user_id)
    }

    /// Merge `patch` into the stored bag (`null` removes a key)
    pub async fn merge(&self, scope: PreferenceScope, user_id: &str, patch: Preferences) -> DomainResult<Preferences> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let mut bag = load_bag(conn, scope, user_id)?;
        merge_preferences(&mut bag, patch)?;
        store_bag(conn, scope, user_id, &bag)?;
        Ok(bag)
    }

    /// Replace the whole bag
    pub async fn replace(&self, scope: PreferenceScope, user_id: &str, bag: Preferences) -> DomainResult<Preferences> {
        for key in bag.keys() {
            validate_key(key)?;
        }
        let bag: Preferences = bag.into_iter().filter(|(_, v)| !v.is_null()).collect();

        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;
        store_bag(conn, scope, user_id, &bag)?;
        Ok(bag)
    }
}

fn load_bag(conn: &Connection, scope: PreferenceScope, user_id: &str) -> DomainResult<Preferences> {
    let mut stmt =
        conn.prepare("SELECT key, value FROM preferences WHERE scope = ? AND user_id = ? ORDER BY key ASC")?;
    let mut rows = stmt.query(params![scope.as_str(), user_id])?;

    let mut bag = Preferences::new();
    while let Some(row) = rows.next()? {
        let key: String = row.get(0)?;
        let raw: String = row.get(1)?;
        bag.insert(key, serde_json::from_str::<Value>(&raw)?);
    }
    Ok(bag)
}

fn store_bag(conn: &Connection, scope: PreferenceScope, user_id: &str, bag: &Preferences) -> DomainResult<()> {
    let now = now_millis();
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM preferences WHERE scope = ? AND user_id = ?",
        params![scope.as_str(), user_id],
    )?;
    for (key, value) in bag {
        tx.execute(
            "INSERT INTO preferences (scope, user_id, key, value, updated_at) VALUES (?, ?, ?, ?, ?)",
            params![scope.as_str(), user_id, key, serde_json::to_string(value)?, now],
        )?;
    }
    tx.commit()?;
    Ok(())
}
