//! Task Commands
//!
//! Client bindings for `/api/tasks`.

use chrono::NaiveDate;
use reqwest::Method;
use serde::Serialize;

use super::ApiClient;
use crate::error::ClientResult;
use crate::models::{Priority, Schedule, Subtask, Task};

/// Body for `POST /api/tasks`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<&'a str>,
    pub user_id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub due_date: Option<NaiveDate>,
    pub priority: Priority,
    pub completed: bool,
    pub subtasks: &'a [Subtask],
    pub assigned_users: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<&'a Schedule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

impl<'a> From<&'a Task> for NewTask<'a> {
    /// Re-post a full task, keeping its id
    fn from(task: &'a Task) -> Self {
        Self {
            id: Some(&task.id),
            user_id: &task.user_id,
            title: &task.title,
            description: &task.description,
            due_date: task.due_date,
            priority: task.priority,
            completed: task.completed,
            subtasks: &task.subtasks,
            assigned_users: &task.assigned_users,
            schedule: task.schedule.as_ref(),
            created_at: Some(task.created_at),
        }
    }
}

/// Body for `PUT /api/tasks/:id`; unset fields are left alone
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

#[derive(Serialize)]
struct TitleArgs<'a> {
    title: &'a str,
}

impl ApiClient {
    pub async fn list_tasks(&self, user_id: &str) -> ClientResult<Vec<Task>> {
        self.get(self.url(&["tasks"]), &[("userId", user_id.to_string())]).await
    }

    pub async fn create_task(&self, task: &NewTask<'_>) -> ClientResult<Task> {
        self.send_json(Method::POST, self.url(&["tasks"]), task).await
    }

    pub async fn get_task(&self, id: &str) -> ClientResult<Task> {
        self.get(self.url(&["tasks", id]), &[]).await
    }

    pub async fn update_task(&self, id: &str, patch: &TaskPatch) -> ClientResult<Task> {
        self.send_json(Method::PUT, self.url(&["tasks", id]), patch).await
    }

    pub async fn delete_task(&self, id: &str) -> ClientResult<()> {
        self.delete(self.url(&["tasks", id])).await
    }

    pub async fn toggle_task(&self, id: &str) -> ClientResult<Task> {
        self.send_json(Method::POST, self.url(&["tasks", id, "toggle"]), &()).await
    }

    pub async fn add_subtask(&self, task_id: &str, title: &str) -> ClientResult<Subtask> {
        self.send_json(Method::POST, self.url(&["tasks", task_id, "subtasks"]), &TitleArgs { title })
            .await
    }

    pub async fn toggle_subtask(&self, task_id: &str, subtask_id: &str) -> ClientResult<Subtask> {
        let url = self.url(&["tasks", task_id, "subtasks", subtask_id, "toggle"]);
        self.send_json(Method::POST, url, &()).await
    }
}
