//! HTTP command handlers, one module per resource

pub mod error;
pub mod group_cmd;
pub mod settings_cmd;
pub mod task_cmd;
pub mod template_cmd;
pub mod ticket_cmd;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::domain::DomainError;
use crate::SharedState;
pub use error::{CommandResult, JsonBody};

/// Liveness plus the schema version the database is on
pub async fn health(State(state): State<SharedState>) -> CommandResult<Json<Value>> {
    let version = state.db_state.schema_version().await.map_err(DomainError::Internal)?;
    Ok(Json(json!({ "status": "ok", "schemaVersion": version })))
}
