//! Template Commands

use reqwest::Method;
use serde::Serialize;

use super::ApiClient;
use crate::error::ClientResult;
use crate::models::{Priority, Task, Template};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTemplate<'a> {
    pub user_id: &'a str,
    pub name: &'a str,
    pub task_title: &'a str,
    pub description: &'a str,
    pub priority: Priority,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplyArgs<'a> {
    user_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
}

impl ApiClient {
    pub async fn list_templates(&self, user_id: &str) -> ClientResult<Vec<Template>> {
        self.get(self.url(&["templates"]), &[("userId", user_id.to_string())]).await
    }

    pub async fn create_template(&self, template: &NewTemplate<'_>) -> ClientResult<Template> {
        self.send_json(Method::POST, self.url(&["templates"]), template).await
    }

    /// Create a task for `user_id` from a template
    pub async fn apply_template(&self, id: &str, user_id: &str, title: Option<&str>) -> ClientResult<Task> {
        let url = self.url(&["templates", id, "apply"]);
        self.send_json(Method::POST, url, &ApplyArgs { user_id, title }).await
    }
}
