//! Settings and Profile Commands
//!
//! GET returns the bag, PUT replaces it, PATCH merges into it.

use axum::extract::{Path, State};
use axum::Json;

use super::error::{CommandResult, JsonBody};
use crate::domain::{require_text, PreferenceScope, Preferences};
use crate::SharedState;

async fn read(state: SharedState, scope: PreferenceScope, user_id: String) -> CommandResult<Json<Preferences>> {
    let user_id = require_text("userId", &user_id)?;
    Ok(Json(state.preference_repo.get(scope, &user_id).await?))
}

async fn replace(
    state: SharedState,
    scope: PreferenceScope,
    user_id: String,
    bag: Preferences,
) -> CommandResult<Json<Preferences>> {
    let user_id = require_text("userId", &user_id)?;
    let stored = state.preference_repo.replace(scope, &user_id, bag).await?;
    log::info!("Replaced {} for {} ({} keys)", scope.as_str(), user_id, stored.len());
    Ok(Json(stored))
}

async fn merge(
    state: SharedState,
    scope: PreferenceScope,
    user_id: String,
    patch: Preferences,
) -> CommandResult<Json<Preferences>> {
    let user_id = require_text("userId", &user_id)?;
    Ok(Json(state.preference_repo.merge(scope, &user_id, patch).await?))
}

pub async fn get_settings(State(state): State<SharedState>, Path(user_id): Path<String>) -> CommandResult<Json<Preferences>> {
    read(state, PreferenceScope::Settings, user_id).await
}

pub async fn put_settings(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
    JsonBody(bag): JsonBody<Preferences>,
) -> CommandResult<Json<Preferences>> {
    replace(state, PreferenceScope::Settings, user_id, bag).await
}

pub async fn patch_settings(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
    JsonBody(patch): JsonBody<Preferences>,
) -> CommandResult<Json<Preferences>> {
    merge(state, PreferenceScope::Settings, user_id, patch).await
}

pub async fn get_profile(State(state): State<SharedState>, Path(user_id): Path<String>) -> CommandResult<Json<Preferences>> {
    read(state, PreferenceScope::Profile, user_id).await
}

pub async fn put_profile(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
    JsonBody(bag): JsonBody<Preferences>,
) -> CommandResult<Json<Preferences>> {
    replace(state, PreferenceScope::Profile, user_id, bag).await
}

pub async fn patch_profile(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
    JsonBody(patch): JsonBody<Preferences>,
) -> CommandResult<Json<Preferences>> {
    merge(state, PreferenceScope::Profile, user_id, patch).await
}
