//! Team Commands

use reqwest::Method;
use serde::Serialize;

use super::ApiClient;
use crate::error::ClientResult;
use crate::models::{Group, Task, TeamAssignment};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTeamArgs<'a> {
    name: &'a str,
    leader_id: &'a str,
    members: &'a [String],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AssignArgs<'a> {
    team_id: &'a str,
    task_id: &'a str,
    user_ids: &'a [String],
}

impl ApiClient {
    /// Teams `user_id` belongs to
    pub async fn list_teams(&self, user_id: &str) -> ClientResult<Vec<Group>> {
        self.get(self.url(&["teams"]), &[("member", user_id.to_string())]).await
    }

    pub async fn create_team(&self, name: &str, leader_id: &str, members: &[String]) -> ClientResult<Group> {
        let args = CreateTeamArgs { name, leader_id, members };
        self.send_json(Method::POST, self.url(&["teams"]), &args).await
    }

    pub async fn team_tasks(&self, team_id: &str) -> ClientResult<Vec<Task>> {
        self.get(self.url(&["teams", team_id, "tasks"]), &[]).await
    }

    pub async fn assign_team_task(
        &self,
        team_id: &str,
        task_id: &str,
        user_ids: &[String],
    ) -> ClientResult<TeamAssignment> {
        let args = AssignArgs { team_id, task_id, user_ids };
        self.send_json(Method::POST, self.url(&["teams", "tasks", "assign"]), &args).await
    }
}
