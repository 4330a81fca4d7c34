//! Client State Store
//!
//! Tasks, templates and settings for the current user, cached as a JSON
//! file between runs. Tasks created while the server was unreachable are
//! kept here and marked local-only until a sync pushes them.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ClientResult;
use crate::models::{Preferences, Task, Template};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreState {
    pub user_id: Option<String>,
    pub tasks: Vec<Task>,
    pub templates: Vec<Template>,
    pub settings: Preferences,
    /// Ids of tasks the server has not seen yet
    pub local_only: BTreeSet<String>,
    pub last_synced_at: Option<i64>,
}

pub struct Store {
    path: PathBuf,
    state: StoreState,
}

impl Store {
    /// Load from `path`; a missing file is an empty store
    pub fn load(path: &Path) -> ClientResult<Self> {
        let state = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str(&raw)?
        } else {
            StoreState::default()
        };
        Ok(Self { path: path.to_path_buf(), state })
    }

    /// Write through a temp file, then rename over the old one
    pub fn save(&self) -> ClientResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&self.state)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn state(&self) -> &StoreState {
        &self.state
    }

    /// Switching users drops everything cached for the previous one
    pub fn bind_user(&mut self, user_id: &str) {
        if self.state.user_id.as_deref() != Some(user_id) {
            if self.state.user_id.is_some() {
                tracing::info!("Store switched user; clearing cached data");
            }
            self.state = StoreState {
                user_id: Some(user_id.to_string()),
                ..Default::default()
            };
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.state.tasks
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.state.tasks.iter().find(|t| t.id == id)
    }

    /// Insert or replace by id
    pub fn upsert_task(&mut self, task: Task) {
        match self.state.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task,
            None => self.state.tasks.push(task),
        }
    }

    pub fn remove_task(&mut self, id: &str) -> Option<Task> {
        self.state.local_only.remove(id);
        let index = self.state.tasks.iter().position(|t| t.id == id)?;
        Some(self.state.tasks.remove(index))
    }

    /// Keep a task the server did not accept yet
    pub fn add_local_only(&mut self, task: Task) {
        self.state.local_only.insert(task.id.clone());
        self.upsert_task(task);
    }

    pub fn is_local_only(&self, id: &str) -> bool {
        self.state.local_only.contains(id)
    }

    pub fn local_only_tasks(&self) -> Vec<&Task> {
        self.state
            .tasks
            .iter()
            .filter(|t| self.state.local_only.contains(&t.id))
            .collect()
    }

    /// Take the server's list as the truth. Local-only tasks the server
    /// still doesn't have are kept after it.
    pub fn replace_tasks(&mut self, server: Vec<Task>) {
        let pending: Vec<Task> = self
            .state
            .tasks
            .drain(..)
            .filter(|t| self.state.local_only.contains(&t.id) && !server.iter().any(|s| s.id == t.id))
            .collect();

        self.state.local_only = pending.iter().map(|t| t.id.clone()).collect();
        self.state.tasks = server;
        self.state.tasks.extend(pending);
    }

    pub fn mark_synced(&mut self, at: i64) {
        self.state.last_synced_at = Some(at);
    }

    pub fn set_templates(&mut self, templates: Vec<Template>) {
        self.state.templates = templates;
    }

    pub fn set_settings(&mut self, settings: Preferences) {
        self.state.settings = settings;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::load(&dir.path().join("store.json")).unwrap();
        assert!(store.tasks().is_empty());
        assert_eq!(store.state(), &StoreState::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let mut store = Store::load(&path).unwrap();
        store.bind_user("alice");
        store.upsert_task(Task::draft("alice", "Synced"));
        store.add_local_only(Task::draft("alice", "Offline"));
        store.save().unwrap();

        let reloaded = Store::load(&path).unwrap();
        assert_eq!(reloaded.state(), store.state());
        assert_eq!(reloaded.local_only_tasks().len(), 1);
        assert_eq!(reloaded.local_only_tasks()[0].title, "Offline");
    }

    #[test]
    fn test_upsert_and_remove_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::load(&dir.path().join("store.json")).unwrap();

        let mut task = Task::draft("alice", "First");
        store.upsert_task(task.clone());
        task.title = "Renamed".into();
        store.upsert_task(task.clone());

        assert_eq!(store.tasks().len(), 1);
        assert_eq!(store.task(&task.id).unwrap().title, "Renamed");
        assert!(store.remove_task(&task.id).is_some());
        assert!(store.remove_task(&task.id).is_none());
    }

    #[test]
    fn test_replace_keeps_unpushed_local_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::load(&dir.path().join("store.json")).unwrap();

        let pushed = Task::draft("alice", "Pushed");
        let pending = Task::draft("alice", "Pending");
        store.upsert_task(Task::draft("alice", "Deleted on server"));
        store.add_local_only(pushed.clone());
        store.add_local_only(pending.clone());

        let server = vec![pushed.clone(), Task::draft("alice", "From server")];
        store.replace_tasks(server);

        let titles: Vec<&str> = store.tasks().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Pushed", "From server", "Pending"]);
        assert!(!store.is_local_only(&pushed.id));
        assert!(store.is_local_only(&pending.id));
    }

    #[test]
    fn test_switching_user_clears_cache() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::load(&dir.path().join("store.json")).unwrap();
        store.bind_user("alice");
        store.upsert_task(Task::draft("alice", "Mine"));

        store.bind_user("alice");
        assert_eq!(store.tasks().len(), 1);
        store.bind_user("bob");
        assert!(store.tasks().is_empty());
    }
}
