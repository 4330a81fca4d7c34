//! Task Commands
//!
//! `/api/tasks` handlers: task CRUD, completion toggles and subtasks.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use super::error::{double_option, not_found, CommandResult, JsonBody};
use crate::domain::{now_millis, require_text, Priority, Schedule, Subtask, Task};
use crate::repository::{Repository, UserScopedRepository};
use crate::SharedState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskInput {
    /// Kept when re-posting a task created offline
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskInput {
    /// Client-chosen id; a duplicate is rejected with 409
    pub id: Option<String>,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub priority: Option<Priority>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub subtasks: Vec<SubtaskInput>,
    #[serde(default)]
    pub assigned_users: Vec<String>,
    pub schedule: Option<Schedule>,
    pub created_at: Option<i64>,
}

impl CreateTaskInput {
    pub fn into_task(self) -> CommandResult<Task> {
        let mut task = Task::new(&self.user_id, &self.title)?;
        if let Some(id) = self.id {
            task.id = require_text("id", &id)?;
        }
        task.description = self.description;
        task.due_date = self.due_date;
        task.priority = self.priority.unwrap_or_default();
        task.completed = self.completed;
        task.schedule = self.schedule;
        task.assign(&self.assigned_users);
        if let Some(created_at) = self.created_at {
            task.created_at = created_at;
        }
        for input in self.subtasks {
            let mut subtask = Subtask::new(&input.title)?;
            if let Some(id) = input.id {
                subtask.id = id;
            }
            subtask.completed = input.completed;
            task.subtasks.push(subtask);
        }
        Ok(task)
    }
}

/// Partial update; absent fields are left alone, `null` clears nullable ones
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskInput {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<NaiveDate>>,
    pub priority: Option<Priority>,
    pub completed: Option<bool>,
    pub assigned_users: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub schedule: Option<Option<Schedule>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubtaskInput {
    pub title: Option<String>,
    pub completed: Option<bool>,
}

/// List tasks, optionally only those owned by or assigned to `userId`
pub async fn list_tasks(
    State(state): State<SharedState>,
    Query(query): Query<TaskQuery>,
) -> CommandResult<Json<Vec<Task>>> {
    let tasks = match query.user_id {
        Some(user_id) => state.task_repo.list_by_user(&user_id).await?,
        None => state.task_repo.list().await?,
    };
    Ok(Json(tasks))
}

pub async fn create_task(
    State(state): State<SharedState>,
    JsonBody(input): JsonBody<CreateTaskInput>,
) -> CommandResult<(StatusCode, Json<Task>)> {
    let task = input.into_task()?;
    let created = state.task_repo.create(&task).await?;
    log::info!("Created task {} for {}", created.id, created.user_id);
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_task(State(state): State<SharedState>, Path(id): Path<String>) -> CommandResult<Json<Task>> {
    let task = state.task_repo.find_by_id(&id).await?.ok_or_else(|| not_found("Task", &id))?;
    Ok(Json(task))
}

pub async fn update_task(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<UpdateTaskInput>,
) -> CommandResult<Json<Task>> {
    let mut task = state.task_repo.find_by_id(&id).await?.ok_or_else(|| not_found("Task", &id))?;

    if let Some(title) = input.title {
        task.title = require_text("title", &title)?;
    }
    if let Some(description) = input.description {
        task.description = description;
    }
    if let Some(due_date) = input.due_date {
        task.due_date = due_date;
    }
    if let Some(priority) = input.priority {
        task.priority = priority;
    }
    if let Some(completed) = input.completed {
        task.completed = completed;
    }
    if let Some(users) = input.assigned_users {
        task.assigned_users.clear();
        task.assign(&users);
    }
    if let Some(schedule) = input.schedule {
        task.schedule = schedule;
    }

    Ok(Json(state.task_repo.update(&task).await?))
}

pub async fn delete_task(State(state): State<SharedState>, Path(id): Path<String>) -> CommandResult<StatusCode> {
    state.task_repo.delete(&id).await?;
    log::info!("Deleted task {}", id);
    Ok(StatusCode::NO_CONTENT)
}

/// Flip completion status
pub async fn toggle_task(State(state): State<SharedState>, Path(id): Path<String>) -> CommandResult<Json<Task>> {
    let mut task = state.task_repo.find_by_id(&id).await?.ok_or_else(|| not_found("Task", &id))?;
    task.completed = !task.completed;
    Ok(Json(state.task_repo.update(&task).await?))
}

pub async fn add_subtask(
    State(state): State<SharedState>,
    Path(task_id): Path<String>,
    JsonBody(input): JsonBody<SubtaskInput>,
) -> CommandResult<(StatusCode, Json<Subtask>)> {
    let mut subtask = Subtask::new(&input.title)?;
    if let Some(id) = input.id {
        subtask.id = require_text("id", &id)?;
    }
    subtask.completed = input.completed;

    let created = state.task_repo.add_subtask(&task_id, &subtask).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_subtask(
    State(state): State<SharedState>,
    Path((task_id, subtask_id)): Path<(String, String)>,
    JsonBody(input): JsonBody<UpdateSubtaskInput>,
) -> CommandResult<Json<Subtask>> {
    let mut task = state.task_repo.find_by_id(&task_id).await?.ok_or_else(|| not_found("Task", &task_id))?;
    let subtask = task.subtask_mut(&subtask_id)?;

    if let Some(title) = input.title {
        subtask.title = require_text("subtask title", &title)?;
    }
    if let Some(completed) = input.completed {
        subtask.completed = completed;
    }

    let subtask = subtask.clone();
    Ok(Json(state.task_repo.update_subtask(&task_id, &subtask).await?))
}

pub async fn delete_subtask(
    State(state): State<SharedState>,
    Path((task_id, subtask_id)): Path<(String, String)>,
) -> CommandResult<StatusCode> {
    state.task_repo.delete_subtask(&task_id, &subtask_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_subtask(
    State(state): State<SharedState>,
    Path((task_id, subtask_id)): Path<(String, String)>,
) -> CommandResult<Json<Subtask>> {
    let mut task = state.task_repo.find_by_id(&task_id).await?.ok_or_else(|| not_found("Task", &task_id))?;
    let subtask = task.subtask_mut(&subtask_id)?;
    subtask.completed = !subtask.completed;
    subtask.updated_at = now_millis();

    let subtask = subtask.clone();
    Ok(Json(state.task_repo.update_subtask(&task_id, &subtask).await?))
}
