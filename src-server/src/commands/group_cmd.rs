//! Group and Team Commands
//!
//! `/api/groups` and `/api/teams` share the same handlers, parameterised by
//! `GroupKind`. A group id looked up through the wrong route is a 404.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::error::{double_option, not_found, CommandResult, JsonBody};
use crate::domain::{require_text, DomainError, Group, GroupKind, MemberRole, Task};
use crate::repository::Repository;
use crate::SharedState;

#[derive(Debug, Default, Deserialize)]
pub struct GroupQuery {
    /// Only groups this user belongs to
    pub member: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub leader_id: Option<String>,
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGroupInput {
    pub name: Option<String>,
    pub description: Option<String>,
    /// `null` clears the leader (they stay a member)
    #[serde(default, deserialize_with = "double_option")]
    pub leader_id: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberInput {
    pub user_id: String,
    #[serde(default)]
    pub role: MemberRole,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignTeamTaskInput {
    pub team_id: String,
    pub task_id: String,
    #[serde(default)]
    pub user_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AssignTeamTaskResult {
    pub team: Group,
    pub task: Task,
}

async fn load_of_kind(state: &SharedState, kind: GroupKind, id: &str) -> CommandResult<Group> {
    state
        .group_repo
        .find_by_id(&id.to_string())
        .await?
        .filter(|g| g.kind == kind)
        .ok_or_else(|| not_found(kind_label(kind), id))
}

fn kind_label(kind: GroupKind) -> &'static str {
    match kind {
        GroupKind::Group => "Group",
        GroupKind::Team => "Team",
    }
}

async fn list_of_kind(state: SharedState, kind: GroupKind, query: GroupQuery) -> CommandResult<Json<Vec<Group>>> {
    let groups = match query.member {
        Some(user_id) => state.group_repo.list_for_member(kind, &user_id).await?,
        None => state.group_repo.list_by_kind(kind).await?,
    };
    Ok(Json(groups))
}

async fn create_of_kind(
    state: SharedState,
    kind: GroupKind,
    input: CreateGroupInput,
) -> CommandResult<(StatusCode, Json<Group>)> {
    let mut group = Group::new(kind, &input.name)?;
    group.description = input.description;
    for user_id in &input.members {
        group.add_member(user_id)?;
    }
    if let Some(leader_id) = &input.leader_id {
        group.set_leader(leader_id)?;
    }

    let created = state.group_repo.create(&group).await?;
    log::info!("Created {} {} ({})", kind.as_str(), created.name, created.id);
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_of_kind(
    state: SharedState,
    kind: GroupKind,
    id: String,
    input: UpdateGroupInput,
) -> CommandResult<Json<Group>> {
    let mut group = load_of_kind(&state, kind, &id).await?;

    if let Some(name) = input.name {
        group.name = require_text("name", &name)?;
    }
    if let Some(description) = input.description {
        group.description = description;
    }
    match input.leader_id {
        Some(Some(leader_id)) => group.set_leader(&leader_id)?,
        Some(None) => {
            if let Some(previous) = group.leader_id.take() {
                group.members.insert(previous, MemberRole::Member);
            }
        }
        None => {}
    }

    Ok(Json(state.group_repo.update(&group).await?))
}

async fn delete_of_kind(state: SharedState, kind: GroupKind, id: String) -> CommandResult<StatusCode> {
    load_of_kind(&state, kind, &id).await?;
    state.group_repo.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_member_of_kind(
    state: SharedState,
    kind: GroupKind,
    id: String,
    input: AddMemberInput,
) -> CommandResult<(StatusCode, Json<Group>)> {
    load_of_kind(&state, kind, &id).await?;
    let group = match input.role {
        MemberRole::Leader => state.group_repo.set_leader(&id, &input.user_id).await?,
        MemberRole::Member => state.group_repo.add_member(&id, &input.user_id).await?,
    };
    Ok((StatusCode::CREATED, Json(group)))
}

async fn remove_member_of_kind(
    state: SharedState,
    kind: GroupKind,
    id: String,
    user_id: String,
) -> CommandResult<Json<Group>> {
    load_of_kind(&state, kind, &id).await?;
    Ok(Json(state.group_repo.remove_member(&id, &user_id).await?))
}

// ========================
// Groups
// ========================

pub async fn list_groups(State(state): State<SharedState>, Query(query): Query<GroupQuery>) -> CommandResult<Json<Vec<Group>>> {
    list_of_kind(state, GroupKind::Group, query).await
}

pub async fn create_group(
    State(state): State<SharedState>,
    JsonBody(input): JsonBody<CreateGroupInput>,
) -> CommandResult<(StatusCode, Json<Group>)> {
    create_of_kind(state, GroupKind::Group, input).await
}

pub async fn get_group(State(state): State<SharedState>, Path(id): Path<String>) -> CommandResult<Json<Group>> {
    Ok(Json(load_of_kind(&state, GroupKind::Group, &id).await?))
}

pub async fn update_group(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<UpdateGroupInput>,
) -> CommandResult<Json<Group>> {
    update_of_kind(state, GroupKind::Group, id, input).await
}

pub async fn delete_group(State(state): State<SharedState>, Path(id): Path<String>) -> CommandResult<StatusCode> {
    delete_of_kind(state, GroupKind::Group, id).await
}

pub async fn add_group_member(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<AddMemberInput>,
) -> CommandResult<(StatusCode, Json<Group>)> {
    add_member_of_kind(state, GroupKind::Group, id, input).await
}

pub async fn remove_group_member(
    State(state): State<SharedState>,
    Path((id, user_id)): Path<(String, String)>,
) -> CommandResult<Json<Group>> {
    remove_member_of_kind(state, GroupKind::Group, id, user_id).await
}

// ========================
// Teams
// ========================

pub async fn list_teams(State(state): State<SharedState>, Query(query): Query<GroupQuery>) -> CommandResult<Json<Vec<Group>>> {
    list_of_kind(state, GroupKind::Team, query).await
}

pub async fn create_team(
    State(state): State<SharedState>,
    JsonBody(input): JsonBody<CreateGroupInput>,
) -> CommandResult<(StatusCode, Json<Group>)> {
    create_of_kind(state, GroupKind::Team, input).await
}

pub async fn get_team(State(state): State<SharedState>, Path(id): Path<String>) -> CommandResult<Json<Group>> {
    Ok(Json(load_of_kind(&state, GroupKind::Team, &id).await?))
}

pub async fn update_team(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<UpdateGroupInput>,
) -> CommandResult<Json<Group>> {
    update_of_kind(state, GroupKind::Team, id, input).await
}

pub async fn delete_team(State(state): State<SharedState>, Path(id): Path<String>) -> CommandResult<StatusCode> {
    delete_of_kind(state, GroupKind::Team, id).await
}

pub async fn add_team_member(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<AddMemberInput>,
) -> CommandResult<(StatusCode, Json<Group>)> {
    add_member_of_kind(state, GroupKind::Team, id, input).await
}

pub async fn remove_team_member(
    State(state): State<SharedState>,
    Path((id, user_id)): Path<(String, String)>,
) -> CommandResult<Json<Group>> {
    remove_member_of_kind(state, GroupKind::Team, id, user_id).await
}

/// Tasks linked to a team
pub async fn list_team_tasks(State(state): State<SharedState>, Path(id): Path<String>) -> CommandResult<Json<Vec<Task>>> {
    load_of_kind(&state, GroupKind::Team, &id).await?;
    Ok(Json(state.task_repo.list_for_group(&id).await?))
}

/// Link a task to a team and assign it to some of the team's members
pub async fn assign_team_task(
    State(state): State<SharedState>,
    JsonBody(input): JsonBody<AssignTeamTaskInput>,
) -> CommandResult<Json<AssignTeamTaskResult>> {
    let team = load_of_kind(&state, GroupKind::Team, &input.team_id).await?;

    if state.task_repo.find_by_id(&input.task_id).await?.is_none() {
        return Err(not_found("Task", &input.task_id));
    }
    let outsiders: Vec<&str> = input
        .user_ids
        .iter()
        .filter(|u| !team.is_member(u))
        .map(|u| u.as_str())
        .collect();
    if !outsiders.is_empty() {
        return Err(DomainError::InvalidInput(format!(
            "not members of team {}: {}",
            team.id,
            outsiders.join(", ")
        )));
    }

    let team = state.group_repo.add_task(&team.id, &input.task_id).await?;
    let task = state.task_repo.assign_users(&input.task_id, &input.user_ids).await?;
    log::info!(
        "Assigned task {} in team {} to {} user(s)",
        task.id,
        team.id,
        input.user_ids.len()
    );

    Ok(Json(AssignTeamTaskResult { team, task }))
}
