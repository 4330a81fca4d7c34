//! Database Connection and Setup
//!
//! Manages the SQLite connection shared by all repositories.

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::migrations::{run_migrations, schema_version};
use crate::domain::DomainError;

/// Shared connection slot. `None` until `init_db` has run or after `close`.
pub type SharedConnection = Arc<Mutex<Option<Connection>>>;

/// Database state wrapper
#[derive(Clone)]
pub struct DbState {
    pub conn: SharedConnection,
    pub path: PathBuf,
}

impl DbState {
    pub fn new(path: PathBuf) -> Self {
        Self {
            conn: Arc::new(Mutex::new(None)),
            path,
        }
    }

    pub async fn is_ready(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    /// Current schema version of the open database
    pub async fn schema_version(&self) -> Result<u32, String> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or("Database not initialized")?;
        schema_version(conn)
    }

    /// Drop the connection; repositories fail until re-initialized
    pub async fn close(&self) {
        *self.conn.lock().await = None;
    }
}

pub(crate) fn not_initialized() -> DomainError {
    DomainError::Internal("Database not initialized".to_string())
}

/// Open the database at `db_path` and run migrations.
/// `:memory:` opens a private in-memory database.
pub async fn init_db(db_path: &Path) -> Result<DbState, String> {
    let conn = if db_path == Path::new(":memory:") {
        Connection::open_in_memory()
    } else {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
            }
        }
        Connection::open(db_path)
    }
    .map_err(|e| format!("Failed to open db: {}", e))?;

    conn.execute_batch("PRAGMA foreign_keys = ON")
        .map_err(|e| format!("Failed to enable foreign keys: {}", e))?;

    let version = run_migrations(&conn)?;
    log::info!("Database ready at {} (schema v{})", db_path.display(), version);

    let state = DbState::new(db_path.to_path_buf());
    *state.conn.lock().await = Some(conn);
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::migrations::target_version;

    #[tokio::test]
    async fn test_uninitialized_state() {
        let state = DbState::new(PathBuf::from("unused.db"));
        assert!(!state.is_ready().await);
        assert!(state.schema_version().await.is_err());
    }

    #[tokio::test]
    async fn test_file_database_persists_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("itaskorg.db");

        let state = init_db(&path).await.unwrap();
        assert_eq!(state.schema_version().await.unwrap(), target_version());
        state.close().await;
        assert!(!state.is_ready().await);

        let reopened = init_db(&path).await.unwrap();
        assert_eq!(reopened.schema_version().await.unwrap(), target_version());
    }
}
