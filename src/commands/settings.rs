//! Settings Commands

use reqwest::Method;

use super::ApiClient;
use crate::error::ClientResult;
use crate::models::Preferences;

impl ApiClient {
    pub async fn get_settings(&self, user_id: &str) -> ClientResult<Preferences> {
        self.get(self.url(&["settings", user_id]), &[]).await
    }

    /// Merge `patch` into the stored settings; `null` values remove keys
    pub async fn patch_settings(&self, user_id: &str, patch: &Preferences) -> ClientResult<Preferences> {
        self.send_json(Method::PATCH, self.url(&["settings", user_id]), patch).await
    }
}
