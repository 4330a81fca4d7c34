//! Sync Analyzer
//!
//! Compares the local store with the server's task list by id:
//! tasks only here, tasks only there, and tasks whose content differs.
//! `auto_fix` pushes local-only tasks and then takes the server's list.
//! `submit_task` is how a newly written task first reaches the server.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;

use crate::commands::{ApiClient, NewTask};
use crate::error::{ClientError, ClientResult};
use crate::models::Task;
use crate::store::Store;

/// Where the analyzer reads and writes server tasks
#[async_trait]
pub trait TaskRemote: Send + Sync {
    async fn fetch_tasks(&self, user_id: &str) -> ClientResult<Vec<Task>>;
    async fn fetch_task(&self, id: &str) -> ClientResult<Task>;
    async fn push_task(&self, task: &Task) -> ClientResult<Task>;
}

#[async_trait]
impl TaskRemote for ApiClient {
    async fn fetch_tasks(&self, user_id: &str) -> ClientResult<Vec<Task>> {
        self.list_tasks(user_id).await
    }

    async fn fetch_task(&self, id: &str) -> ClientResult<Task> {
        self.get_task(id).await
    }

    async fn push_task(&self, task: &Task) -> ClientResult<Task> {
        self.create_task(&NewTask::from(task)).await
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub local_only: Vec<String>,
    pub server_only: Vec<String>,
    pub diverged: Vec<String>,
    pub in_sync: usize,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.local_only.is_empty() && self.server_only.is_empty() && self.diverged.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixOutcome {
    pub pushed: Vec<String>,
    pub failed: Vec<String>,
    pub server_tasks: usize,
}

/// Content hash over the fields both sides own. Timestamps are left out;
/// the server stamps its own `updatedAt`.
pub fn fingerprint(task: &Task) -> String {
    let mut assigned = task.assigned_users.clone();
    assigned.sort();
    let subtasks: Vec<_> = task
        .subtasks
        .iter()
        .map(|s| json!({ "id": s.id, "title": s.title, "completed": s.completed }))
        .collect();

    let canonical = json!({
        "title": task.title,
        "description": task.description,
        "dueDate": task.due_date,
        "priority": task.priority,
        "completed": task.completed,
        "subtasks": subtasks,
        "assignedUsers": assigned,
        "schedule": task.schedule,
    });
    blake3::hash(canonical.to_string().as_bytes()).to_hex().to_string()
}

/// Set difference by id, then fingerprint comparison on the overlap
pub fn diff(local: &[Task], server: &[Task]) -> SyncReport {
    let server_by_id: HashMap<&str, &Task> = server.iter().map(|t| (t.id.as_str(), t)).collect();
    let local_ids: HashMap<&str, &Task> = local.iter().map(|t| (t.id.as_str(), t)).collect();

    let mut report = SyncReport::default();
    for task in local {
        match server_by_id.get(task.id.as_str()) {
            None => report.local_only.push(task.id.clone()),
            Some(remote) if fingerprint(remote) != fingerprint(task) => report.diverged.push(task.id.clone()),
            Some(_) => report.in_sync += 1,
        }
    }
    report.server_only = server
        .iter()
        .filter(|t| !local_ids.contains_key(t.id.as_str()))
        .map(|t| t.id.clone())
        .collect();
    report
}

/// Fetch the server's tasks and compare them with the store
pub async fn analyze<R: TaskRemote + ?Sized>(remote: &R, store: &Store, user_id: &str) -> ClientResult<SyncReport> {
    let server = remote.fetch_tasks(user_id).await?;
    let report = diff(store.tasks(), &server);

    if report.is_clean() {
        tracing::info!("Sync check for {}: {} task(s) in sync", user_id, report.in_sync);
    } else {
        tracing::warn!(
            "Sync check for {}: {} local-only, {} server-only, {} diverged, {} in sync",
            user_id,
            report.local_only.len(),
            report.server_only.len(),
            report.diverged.len(),
            report.in_sync
        );
        for id in &report.diverged {
            tracing::warn!("Task {} differs from the server copy", id);
        }
    }
    Ok(report)
}

/// Push local-only tasks (keeping their ids), then replace the store's
/// tasks with the server's list. The server's copy wins on divergence.
/// Tasks whose push failed are not on the server yet; they stay in the
/// store, still local-only, behind the server's tasks.
pub async fn auto_fix<R: TaskRemote + ?Sized>(remote: &R, store: &mut Store, user_id: &str) -> ClientResult<FixOutcome> {
    let report = analyze(remote, store, user_id).await?;
    let mut outcome = FixOutcome::default();

    for id in &report.local_only {
        let Some(task) = store.task(id).cloned() else {
            continue;
        };
        match remote.push_task(&task).await {
            Ok(_) => outcome.pushed.push(id.clone()),
            // Already there from an earlier partial sync
            Err(ClientError::Api { status: 409, .. }) => outcome.pushed.push(id.clone()),
            Err(e) => {
                tracing::error!("Could not push task {}: {}", id, e);
                outcome.failed.push(id.clone());
            }
        }
    }

    let server = remote.fetch_tasks(user_id).await?;
    outcome.server_tasks = server.len();
    store.replace_tasks(server);
    store.mark_synced(chrono::Utc::now().timestamp_millis());

    tracing::info!(
        "Sync fix for {}: pushed {}, failed {}, {} task(s) from server",
        user_id,
        outcome.pushed.len(),
        outcome.failed.len(),
        outcome.server_tasks
    );
    Ok(outcome)
}

/// Create `draft` on the server and cache the result. A 409 means an
/// earlier attempt already stored it, so the server's copy is fetched.
/// When the server can't be reached the draft is kept local-only.
/// Returns whether the server has the task.
pub async fn submit_task<R: TaskRemote + ?Sized>(remote: &R, store: &mut Store, draft: Task) -> ClientResult<bool> {
    let pushed = match remote.push_task(&draft).await {
        Err(ClientError::Api { status: 409, .. }) => {
            tracing::info!("Task {} already on the server; fetching it", draft.id);
            remote.fetch_task(&draft.id).await
        }
        other => other,
    };

    match pushed {
        Ok(task) => {
            store.upsert_task(task);
            Ok(true)
        }
        Err(e) if e.is_offline() => {
            tracing::warn!("Keeping task {} locally: {}", draft.id, e);
            store.add_local_only(draft);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Schedule;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// In-process stand-in for the server
    #[derive(Default)]
    struct FakeRemote {
        tasks: Mutex<Vec<Task>>,
        /// Titles whose push fails with 503
        reject: HashSet<String>,
        /// Ids left out of the next listing only
        hidden_once: Mutex<HashSet<String>>,
    }

    impl FakeRemote {
        fn with_tasks(tasks: Vec<Task>) -> Self {
            Self { tasks: Mutex::new(tasks), ..Default::default() }
        }
    }

    #[async_trait]
    impl TaskRemote for FakeRemote {
        async fn fetch_tasks(&self, user_id: &str) -> ClientResult<Vec<Task>> {
            let hidden = std::mem::take(&mut *self.hidden_once.lock().unwrap());
            let tasks = self.tasks.lock().unwrap();
            Ok(tasks
                .iter()
                .filter(|t| t.user_id == user_id && !hidden.contains(&t.id))
                .cloned()
                .collect())
        }

        async fn fetch_task(&self, id: &str) -> ClientResult<Task> {
            let tasks = self.tasks.lock().unwrap();
            tasks
                .iter()
                .find(|t| t.id == id)
                .cloned()
                .ok_or_else(|| ClientError::Api { status: 404, message: "missing".into() })
        }

        /// Stores exactly what the request body carries
        async fn push_task(&self, task: &Task) -> ClientResult<Task> {
            if self.reject.contains(&task.title) {
                return Err(ClientError::Api { status: 503, message: "unavailable".into() });
            }
            let mut tasks = self.tasks.lock().unwrap();
            if tasks.iter().any(|t| t.id == task.id) {
                return Err(ClientError::Api { status: 409, message: "exists".into() });
            }
            let body = serde_json::to_value(NewTask::from(task))?;
            let stored: Task = serde_json::from_value(body)?;
            tasks.push(stored.clone());
            Ok(stored)
        }
    }

    fn store_with(tasks: Vec<Task>, local_only: Vec<Task>) -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::load(&dir.path().join("store.json")).unwrap();
        store.bind_user("alice");
        for task in tasks {
            store.upsert_task(task);
        }
        for task in local_only {
            store.add_local_only(task);
        }
        (dir, store)
    }

    #[test]
    fn test_fingerprint_ignores_timestamps_and_assignee_order() {
        let mut a = Task::draft("alice", "Plan");
        a.assigned_users = vec!["bob".into(), "carol".into()];
        let mut b = a.clone();
        b.updated_at += 5_000;
        b.assigned_users.reverse();
        assert_eq!(fingerprint(&a), fingerprint(&b));

        b.completed = true;
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_diff_classifies_by_id() {
        let same = Task::draft("alice", "Same");
        let local_version = Task::draft("alice", "Edited here");
        let mut server_version = local_version.clone();
        server_version.title = "Edited there".into();
        let mine = Task::draft("alice", "Mine");
        let theirs = Task::draft("alice", "Theirs");

        let report = diff(
            &[same.clone(), local_version.clone(), mine.clone()],
            &[same, server_version, theirs.clone()],
        );

        assert_eq!(report.local_only, vec![mine.id]);
        assert_eq!(report.server_only, vec![theirs.id]);
        assert_eq!(report.diverged, vec![local_version.id]);
        assert_eq!(report.in_sync, 1);
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_analyze_clean_store() {
        let task = Task::draft("alice", "Shared");
        let remote = FakeRemote::with_tasks(vec![task.clone(), Task::draft("bob", "Not mine")]);
        let (_dir, store) = store_with(vec![task], vec![]);

        let report = analyze(&remote, &store, "alice").await.unwrap();
        assert!(report.is_clean());
        assert_eq!(report.in_sync, 1);
    }

    #[tokio::test]
    async fn test_auto_fix_pushes_then_takes_server_list() {
        let offline = Task::draft("alice", "Written offline");
        let mut diverged = Task::draft("alice", "Server copy");
        let server_only = Task::draft("alice", "Created elsewhere");
        let remote = FakeRemote::with_tasks(vec![diverged.clone(), server_only.clone()]);

        diverged.title = "Local copy".into();
        let (_dir, mut store) = store_with(vec![diverged.clone()], vec![offline.clone()]);

        let outcome = auto_fix(&remote, &mut store, "alice").await.unwrap();
        assert_eq!(outcome.pushed, vec![offline.id.clone()]);
        assert!(outcome.failed.is_empty());
        assert_eq!(outcome.server_tasks, 3);

        // Server wins on the diverged task; nothing is left local-only
        assert_eq!(store.task(&diverged.id).unwrap().title, "Server copy");
        assert!(store.task(&server_only.id).is_some());
        assert!(store.local_only_tasks().is_empty());
        assert!(store.state().last_synced_at.is_some());

        let report = analyze(&remote, &store, "alice").await.unwrap();
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_auto_fix_keeps_tasks_that_failed_to_push() {
        let stuck = Task::draft("alice", "Stuck");
        let already = Task::draft("alice", "Already pushed");
        let remote = FakeRemote {
            tasks: Mutex::new(vec![already.clone()]),
            reject: HashSet::from(["Stuck".to_string()]),
            ..Default::default()
        };
        let (_dir, mut store) = store_with(vec![], vec![stuck.clone(), already.clone()]);

        let outcome = auto_fix(&remote, &mut store, "alice").await.unwrap();
        assert_eq!(outcome.failed, vec![stuck.id.clone()]);
        assert!(outcome.pushed.is_empty());

        assert!(store.is_local_only(&stuck.id));
        assert!(!store.is_local_only(&already.id));
        assert_eq!(store.tasks().len(), 2);
    }

    #[tokio::test]
    async fn test_auto_fix_counts_conflict_as_pushed() {
        // Stored by an earlier run whose listing came back without it
        let landed = Task::draft("alice", "Landed earlier");
        let remote = FakeRemote::with_tasks(vec![landed.clone()]);
        remote.hidden_once.lock().unwrap().insert(landed.id.clone());
        let (_dir, mut store) = store_with(vec![], vec![landed.clone()]);

        let outcome = auto_fix(&remote, &mut store, "alice").await.unwrap();
        assert_eq!(outcome.pushed, vec![landed.id.clone()]);
        assert!(outcome.failed.is_empty());
        assert_eq!(outcome.server_tasks, 1);
        assert!(!store.is_local_only(&landed.id));
        assert_eq!(store.tasks().len(), 1);
    }

    #[tokio::test]
    async fn test_auto_fix_keeps_schedule_of_pushed_task() {
        let mut standup = Task::draft("alice", "Standup");
        standup.schedule = Some(Schedule { time: Some("09:30".into()), reminder: true });
        let remote = FakeRemote::default();
        let (_dir, mut store) = store_with(vec![], vec![standup.clone()]);

        let outcome = auto_fix(&remote, &mut store, "alice").await.unwrap();
        assert_eq!(outcome.pushed, vec![standup.id.clone()]);
        assert_eq!(store.task(&standup.id).unwrap().schedule, standup.schedule);
        assert!(analyze(&remote, &store, "alice").await.unwrap().is_clean());
    }

    #[tokio::test]
    async fn test_submit_task_stores_server_copy() {
        let remote = FakeRemote::default();
        let (_dir, mut store) = store_with(vec![], vec![]);
        let draft = Task::draft("alice", "Fresh");

        assert!(submit_task(&remote, &mut store, draft.clone()).await.unwrap());
        assert!(store.task(&draft.id).is_some());
        assert!(!store.is_local_only(&draft.id));
    }

    #[tokio::test]
    async fn test_submit_task_after_lost_response_fetches_existing() {
        // The first attempt was stored; only the reply went missing
        let draft = Task::draft("alice", "Created twice");
        let remote = FakeRemote::with_tasks(vec![draft.clone()]);
        let (_dir, mut store) = store_with(vec![], vec![]);

        assert!(submit_task(&remote, &mut store, draft.clone()).await.unwrap());
        assert_eq!(store.task(&draft.id).unwrap().title, "Created twice");
        assert!(!store.is_local_only(&draft.id));
    }

    #[tokio::test]
    async fn test_submit_task_offline_keeps_draft() {
        let remote = FakeRemote {
            reject: HashSet::from(["Offline".to_string()]),
            ..Default::default()
        };
        let (_dir, mut store) = store_with(vec![], vec![]);
        let draft = Task::draft("alice", "Offline");

        assert!(!submit_task(&remote, &mut store, draft.clone()).await.unwrap());
        assert!(store.is_local_only(&draft.id));
    }
}
