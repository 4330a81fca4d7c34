//! Template Commands

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use super::error::{not_found, CommandResult, JsonBody};
use super::task_cmd::TaskQuery;
use crate::domain::{require_text, Priority, Task, Template};
use crate::repository::{Repository, UserScopedRepository};
use crate::SharedState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTemplateInput {
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub task_title: String,
    pub priority: Option<Priority>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTemplateInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub task_title: Option<String>,
    pub priority: Option<Priority>,
}

/// Overrides applied to the task created from a template
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyTemplateInput {
    /// Defaults to the template's owner
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub priority: Option<Priority>,
}

pub async fn list_templates(
    State(state): State<SharedState>,
    Query(query): Query<TaskQuery>,
) -> CommandResult<Json<Vec<Template>>> {
    let templates = match query.user_id {
        Some(user_id) => state.template_repo.list_by_user(&user_id).await?,
        None => state.template_repo.list().await?,
    };
    Ok(Json(templates))
}

pub async fn create_template(
    State(state): State<SharedState>,
    JsonBody(input): JsonBody<CreateTemplateInput>,
) -> CommandResult<(StatusCode, Json<Template>)> {
    let mut template = Template::new(&input.user_id, &input.name, &input.task_title)?;
    template.description = input.description;
    template.priority = input.priority.unwrap_or_default();

    let created = state.template_repo.create(&template).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_template(State(state): State<SharedState>, Path(id): Path<String>) -> CommandResult<Json<Template>> {
    let template = state.template_repo.find_by_id(&id).await?.ok_or_else(|| not_found("Template", &id))?;
    Ok(Json(template))
}

pub async fn update_template(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<UpdateTemplateInput>,
) -> CommandResult<Json<Template>> {
    let existing = state.template_repo.find_by_id(&id).await?.ok_or_else(|| not_found("Template", &id))?;

    let updated = Template {
        name: match input.name {
            Some(name) => require_text("name", &name)?,
            None => existing.name,
        },
        description: input.description.unwrap_or(existing.description),
        task_title: match input.task_title {
            Some(title) => require_text("taskTitle", &title)?,
            None => existing.task_title,
        },
        priority: input.priority.unwrap_or(existing.priority),
        ..existing
    };

    Ok(Json(state.template_repo.update(&updated).await?))
}

pub async fn delete_template(State(state): State<SharedState>, Path(id): Path<String>) -> CommandResult<StatusCode> {
    state.template_repo.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create a task from a template
pub async fn apply_template(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<ApplyTemplateInput>,
) -> CommandResult<(StatusCode, Json<Task>)> {
    let template = state.template_repo.find_by_id(&id).await?.ok_or_else(|| not_found("Template", &id))?;

    let user_id = input.user_id.unwrap_or_else(|| template.user_id.clone());
    let mut task = template.instantiate(&user_id)?;
    if let Some(title) = input.title {
        task.title = require_text("title", &title)?;
    }
    task.due_date = input.due_date;
    if let Some(priority) = input.priority {
        task.priority = priority;
    }

    let created = state.task_repo.create(&task).await?;
    log::info!("Created task {} from template {}", created.id, template.id);
    Ok((StatusCode::CREATED, Json(created)))
}
