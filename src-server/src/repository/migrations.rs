//! Schema Migrations
//!
//! A linear list of SQL statement groups. Group `n` (1-based) upgrades the
//! schema from version `n - 1` to `n`. The applied version lives in
//! `PRAGMA user_version`.

use rusqlite::Connection;

/// Statements per schema version
pub const MIGRATIONS: &[&[&str]] = &[
    // v1: tasks, subtasks, templates
    &[
        "CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            due_date TEXT,
            priority TEXT NOT NULL DEFAULT 'medium',
            completed INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks(user_id)",
        "CREATE TABLE IF NOT EXISTS subtasks (
            id TEXT PRIMARY KEY,
            task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            completed INTEGER NOT NULL DEFAULT 0,
            position INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_subtasks_task ON subtasks(task_id)",
        "CREATE TABLE IF NOT EXISTS templates (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            task_title TEXT NOT NULL,
            priority TEXT NOT NULL DEFAULT 'medium',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
    ],
    // v2: assignment + schedule
    &[
        "CREATE TABLE IF NOT EXISTS task_assignees (
            task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL,
            position INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (task_id, user_id)
        )",
        "CREATE INDEX IF NOT EXISTS idx_task_assignees_user ON task_assignees(user_id)",
        "ALTER TABLE tasks ADD COLUMN has_schedule INTEGER NOT NULL DEFAULT 0",
        "ALTER TABLE tasks ADD COLUMN schedule_time TEXT",
        "ALTER TABLE tasks ADD COLUMN schedule_reminder INTEGER NOT NULL DEFAULT 0",
    ],
    // v3: groups and teams
    &[
        "CREATE TABLE IF NOT EXISTS user_groups (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL DEFAULT 'group',
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            leader_id TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS group_members (
            group_id TEXT NOT NULL REFERENCES user_groups(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'member',
            PRIMARY KEY (group_id, user_id)
        )",
        "CREATE INDEX IF NOT EXISTS idx_group_members_user ON group_members(user_id)",
        "CREATE TABLE IF NOT EXISTS group_tasks (
            group_id TEXT NOT NULL REFERENCES user_groups(id) ON DELETE CASCADE,
            task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            position INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (group_id, task_id)
        )",
    ],
    // v4: help desk
    &[
        "CREATE TABLE IF NOT EXISTS tickets (
            id TEXT PRIMARY KEY,
            ticket_number TEXT NOT NULL UNIQUE,
            user_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'open',
            priority TEXT NOT NULL DEFAULT 'medium',
            category TEXT NOT NULL DEFAULT 'general',
            assigned_to TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_tickets_status ON tickets(status)",
        "CREATE TABLE IF NOT EXISTS ticket_notes (
            id TEXT PRIMARY KEY,
            ticket_id TEXT NOT NULL REFERENCES tickets(id) ON DELETE CASCADE,
            author TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS ticket_counter (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            last_value INTEGER NOT NULL
        )",
        "INSERT OR IGNORE INTO ticket_counter (id, last_value) VALUES (1, 0)",
    ],
    // v5: settings + profile
    &[
        "CREATE TABLE IF NOT EXISTS preferences (
            scope TEXT NOT NULL,
            user_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (scope, user_id, key)
        )",
    ],
];

/// Version the binary knows how to reach
pub fn target_version() -> u32 {
    MIGRATIONS.len() as u32
}

/// Read the stored schema version
pub fn schema_version(conn: &Connection) -> Result<u32, String> {
    conn.query_row("PRAGMA user_version", [], |row| row.get::<_, i64>(0))
        .map(|v| v as u32)
        .map_err(|e| format!("Failed to read schema version: {}", e))
}

fn is_duplicate_column(e: &rusqlite::Error) -> bool {
    e.to_string().contains("duplicate column name")
}

/// Bring the schema up to `target_version()`.
///
/// Returns the resulting version. Re-adding an existing column is skipped so
/// a half-applied version can be run again.
pub fn run_migrations(conn: &Connection) -> Result<u32, String> {
    run_migration_list(conn, MIGRATIONS)
}

pub(crate) fn run_migration_list(conn: &Connection, migrations: &[&[&str]]) -> Result<u32, String> {
    let current = schema_version(conn)?;
    let target = migrations.len() as u32;

    if current > target {
        log::warn!(
            "Database schema v{} is newer than this build (v{}), leaving it untouched",
            current,
            target
        );
        return Ok(current);
    }

    for version in (current + 1)..=target {
        let statements = migrations[(version - 1) as usize];
        for sql in statements {
            match conn.execute_batch(sql) {
                Ok(()) => {}
                Err(e) if is_duplicate_column(&e) => {
                    log::debug!("Migration v{}: column already present, skipping", version);
                }
                Err(e) => return Err(format!("Migration v{} failed: {}", version, e)),
            }
        }
        conn.execute_batch(&format!("PRAGMA user_version = {}", version))
            .map_err(|e| format!("Failed to record schema version {}: {}", version, e))?;
        log::info!("Applied migration v{}", version);
    }

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_database_reaches_target() {
        let conn = Connection::open_in_memory().unwrap();
        let version = run_migrations(&conn).unwrap();

        assert_eq!(version, target_version());
        assert_eq!(schema_version(&conn).unwrap(), target_version());
    }

    #[test]
    fn test_rerun_is_noop() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(run_migrations(&conn).unwrap(), target_version());
    }

    #[test]
    fn test_duplicate_column_is_swallowed() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, extra TEXT)").unwrap();

        let list: &[&[&str]] = &[&["ALTER TABLE t ADD COLUMN extra TEXT"]];
        assert_eq!(run_migration_list(&conn, list).unwrap(), 1);
    }

    #[test]
    fn test_other_errors_stop_the_run() {
        let conn = Connection::open_in_memory().unwrap();
        let list: &[&[&str]] = &[
            &["CREATE TABLE a (id INTEGER)"],
            &["ALTER TABLE missing ADD COLUMN x TEXT"],
        ];

        assert!(run_migration_list(&conn, list).is_err());
        assert_eq!(schema_version(&conn).unwrap(), 1);
    }

    #[test]
    fn test_partial_upgrade_resumes_from_stored_version() {
        let conn = Connection::open_in_memory().unwrap();
        run_migration_list(&conn, &MIGRATIONS[..1]).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 1);

        run_migrations(&conn).unwrap();
        let has_schedule: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('tasks') WHERE name = 'has_schedule'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(has_schedule, 1);
    }

    #[test]
    fn test_newer_database_left_alone() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA user_version = 99").unwrap();
        assert_eq!(run_migrations(&conn).unwrap(), 99);
    }
}
