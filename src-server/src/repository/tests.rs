//! Repository Integration Tests
//!
//! Tests for the SQLite repositories with an in-memory database.

#[cfg(test)]
mod tests {
    use crate::domain::{
        DomainError, Group, GroupKind, HelpDeskTicket, MemberRole, PreferenceScope, Priority, Schedule, Subtask,
        Task, Template, TicketNote, TicketStatus,
    };
    use crate::repository::{
        init_db, GroupRepository, PreferenceRepository, Repository, SharedConnection, TaskRepository,
        TemplateRepository, TicketFilter, TicketRepository, UserScopedRepository,
    };
    use chrono::NaiveDate;
    use serde_json::json;
    use std::path::PathBuf;

    async fn setup_test_db() -> SharedConnection {
        // Use in-memory database for tests
        let db_path = PathBuf::from(":memory:");
        let db_state = init_db(&db_path).await.expect("Failed to init test DB");
        db_state.conn.clone()
    }

    fn sample_task(user: &str, title: &str) -> Task {
        let mut task = Task::new(user, title).unwrap();
        task.description = "details".into();
        task.due_date = NaiveDate::from_ymd_opt(2026, 11, 2);
        task.priority = Priority::High;
        task.schedule = Some(Schedule { time: Some("08:15".into()), reminder: true });
        task.subtasks.push(Subtask::new("first step").unwrap());
        task.assigned_users = vec!["bob".into()];
        task
    }

    #[tokio::test]
    async fn test_created_task_reads_back() {
        let repo = TaskRepository::new(setup_test_db().await);

        let task = sample_task("alice", "Ship release");
        repo.create(&task).await.expect("Failed to create");

        let found = repo.find_by_id(&task.id).await.expect("Find failed").expect("missing");
        assert_eq!(found, task);
    }

    #[tokio::test]
    async fn test_duplicate_task_id_conflicts() {
        let repo = TaskRepository::new(setup_test_db().await);

        let task = Task::new("alice", "Once").unwrap();
        repo.create(&task).await.unwrap();

        let err = repo.create(&task).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_deleted_task_leaves_listing() {
        let repo = TaskRepository::new(setup_test_db().await);

        let keep = Task::new("alice", "Keep").unwrap();
        let doomed = sample_task("alice", "Drop");
        repo.create(&keep).await.unwrap();
        repo.create(&doomed).await.unwrap();

        repo.delete(&doomed.id).await.expect("Delete failed");

        let ids: Vec<String> = repo.list().await.unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![keep.id]);
        assert!(matches!(repo.delete(&doomed.id).await, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_replaces_fields_and_children() {
        let repo = TaskRepository::new(setup_test_db().await);

        let mut task = sample_task("alice", "Original");
        repo.create(&task).await.unwrap();

        task.title = "Updated".into();
        task.completed = true;
        task.schedule = None;
        task.subtasks.clear();
        task.assigned_users = vec!["carol".into(), "dave".into()];
        repo.update(&task).await.expect("Update failed");

        let found = repo.find_by_id(&task.id).await.unwrap().unwrap();
        assert_eq!(found.title, "Updated");
        assert!(found.completed);
        assert!(found.schedule.is_none());
        assert!(found.subtasks.is_empty());
        assert_eq!(found.assigned_users, vec!["carol", "dave"]);
    }

    #[tokio::test]
    async fn test_list_by_user_includes_assigned() {
        let repo = TaskRepository::new(setup_test_db().await);

        repo.create(&Task::new("alice", "Own").unwrap()).await.unwrap();
        repo.create(&sample_task("carol", "Shared with bob")).await.unwrap();
        repo.create(&Task::new("carol", "Private").unwrap()).await.unwrap();

        let bobs = repo.list_by_user("bob").await.unwrap();
        assert_eq!(bobs.len(), 1);
        assert_eq!(bobs[0].title, "Shared with bob");
        assert_eq!(repo.list_by_user("alice").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_subtask_operations() {
        let repo = TaskRepository::new(setup_test_db().await);
        let task = Task::new("alice", "Checklist").unwrap();
        repo.create(&task).await.unwrap();

        let a = repo.add_subtask(&task.id, &Subtask::new("a").unwrap()).await.unwrap();
        let mut b = repo.add_subtask(&task.id, &Subtask::new("b").unwrap()).await.unwrap();
        b.completed = true;
        repo.update_subtask(&task.id, &b).await.unwrap();
        repo.delete_subtask(&task.id, &a.id).await.unwrap();

        let found = repo.find_by_id(&task.id).await.unwrap().unwrap();
        assert_eq!(found.subtasks.len(), 1);
        assert_eq!(found.subtasks[0].title, "b");
        assert!(found.subtasks[0].completed);

        let missing = repo.add_subtask("nope", &Subtask::new("x").unwrap()).await;
        assert!(matches!(missing, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_subtask_id_taken_by_another_task_conflicts() {
        let repo = TaskRepository::new(setup_test_db().await);
        let first = sample_task("alice", "First");
        repo.create(&first).await.unwrap();
        let taken = first.subtasks[0].clone();

        let mut second = Task::new("alice", "Second").unwrap();
        second.subtasks.push(taken.clone());
        let err = repo.create(&second).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert!(repo.find_by_id(&second.id).await.unwrap().is_none());

        let other = Task::new("alice", "Other").unwrap();
        repo.create(&other).await.unwrap();
        let err = repo.add_subtask(&other.id, &taken).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        // Rewriting a task's own subtasks is not a conflict
        repo.update(&first).await.unwrap();
    }

    #[tokio::test]
    async fn test_assign_users_is_idempotent() {
        let repo = TaskRepository::new(setup_test_db().await);
        let task = Task::new("alice", "Pair").unwrap();
        repo.create(&task).await.unwrap();

        repo.assign_users(&task.id, &["bob".into(), "carol".into()]).await.unwrap();
        let updated = repo.assign_users(&task.id, &["bob".into(), "dave".into()]).await.unwrap();

        assert_eq!(updated.assigned_users, vec!["bob", "carol", "dave"]);
    }

    #[tokio::test]
    async fn test_template_crud() {
        let repo = TemplateRepository::new(setup_test_db().await);

        let mut template = Template::new("alice", "Standup", "Daily standup").unwrap();
        repo.create(&template).await.unwrap();
        repo.create(&Template::new("bob", "Other", "Other").unwrap()).await.unwrap();

        template.priority = Priority::Low;
        repo.update(&template).await.unwrap();

        let mine = repo.list_by_user("alice").await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].priority, Priority::Low);

        repo.delete(&template.id).await.unwrap();
        assert!(repo.find_by_id(&template.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_group_membership_and_tasks() {
        let conn = setup_test_db().await;
        let tasks = TaskRepository::new(conn.clone());
        let groups = GroupRepository::new(conn);

        let task = Task::new("alice", "Deploy").unwrap();
        tasks.create(&task).await.unwrap();

        let team = Group::new(GroupKind::Team, "Platform").unwrap();
        groups.create(&team).await.unwrap();
        groups.set_leader(&team.id, "alice").await.unwrap();
        groups.add_member(&team.id, "bob").await.unwrap();
        groups.add_task(&team.id, &task.id).await.unwrap();

        let found = groups.find_by_id(&team.id).await.unwrap().unwrap();
        assert_eq!(found.leader_id.as_deref(), Some("alice"));
        assert_eq!(found.members["bob"], MemberRole::Member);
        assert_eq!(found.tasks, vec![task.id.clone()]);

        assert_eq!(groups.list_for_member(GroupKind::Team, "bob").await.unwrap().len(), 1);
        assert!(groups.list_for_member(GroupKind::Group, "bob").await.unwrap().is_empty());

        // Deleting the task drops the link
        tasks.delete(&task.id).await.unwrap();
        let found = groups.find_by_id(&team.id).await.unwrap().unwrap();
        assert!(found.tasks.is_empty());
    }

    #[tokio::test]
    async fn test_group_link_to_missing_task_fails() {
        let groups = GroupRepository::new(setup_test_db().await);
        let group = Group::new(GroupKind::Group, "Readers").unwrap();
        groups.create(&group).await.unwrap();

        let result = groups.add_task(&group.id, "ghost").await;
        assert!(matches!(result, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_ticket_numbers_are_sequential() {
        let repo = TicketRepository::new(setup_test_db().await);

        let first = repo.create(&HelpDeskTicket::new("alice", "VPN down").unwrap()).await.unwrap();
        let second = repo.create(&HelpDeskTicket::new("bob", "Need laptop").unwrap()).await.unwrap();

        assert_eq!(first.ticket_number, "TKT-00001");
        assert_eq!(second.ticket_number, "TKT-00002");
        assert_eq!(repo.next_ticket_number().await.unwrap(), "TKT-00003");
    }

    #[tokio::test]
    async fn test_ticket_status_and_notes() {
        let repo = TicketRepository::new(setup_test_db().await);
        let ticket = repo.create(&HelpDeskTicket::new("alice", "Screen flicker").unwrap()).await.unwrap();

        repo.set_status(&ticket.id, TicketStatus::InProgress).await.unwrap();
        repo.add_note(&ticket.id, &TicketNote::new("agent", "Replacing cable").unwrap()).await.unwrap();
        repo.set_status(&ticket.id, TicketStatus::Closed).await.unwrap();

        let err = repo.set_status(&ticket.id, TicketStatus::Open).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let found = repo.find_by_id(&ticket.id).await.unwrap().unwrap();
        assert_eq!(found.status, TicketStatus::Closed);
        assert_eq!(found.notes.len(), 1);
        assert_eq!(found.notes[0].content, "Replacing cable");
    }

    #[tokio::test]
    async fn test_ticket_filters() {
        let repo = TicketRepository::new(setup_test_db().await);

        let mut assigned = HelpDeskTicket::new("alice", "Assigned").unwrap();
        assigned.assigned_to = Some("agent".into());
        let assigned = repo.create(&assigned).await.unwrap();
        repo.create(&HelpDeskTicket::new("bob", "Unassigned").unwrap()).await.unwrap();
        repo.set_status(&assigned.id, TicketStatus::InProgress).await.unwrap();

        let filter = TicketFilter { status: Some(TicketStatus::InProgress), ..Default::default() };
        let in_progress = repo.list_filtered(&filter).await.unwrap();
        assert_eq!(in_progress.len(), 1);
        assert_eq!(in_progress[0].title, "Assigned");

        let filter = TicketFilter { user_id: Some("bob".into()), ..Default::default() };
        assert_eq!(repo.list_filtered(&filter).await.unwrap().len(), 1);
        assert_eq!(repo.list_filtered(&TicketFilter::default()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_preferences_merge_and_replace() {
        let repo = PreferenceRepository::new(setup_test_db().await);
        let patch = |v: serde_json::Value| v.as_object().cloned().unwrap();

        repo.merge(PreferenceScope::Settings, "alice", patch(json!({"theme": "dark", "weekStart": 1})))
            .await
            .unwrap();
        let merged = repo
            .merge(PreferenceScope::Settings, "alice", patch(json!({"weekStart": null, "lang": "fr"})))
            .await
            .unwrap();
        assert_eq!(serde_json::Value::Object(merged), json!({"theme": "dark", "lang": "fr"}));

        // Scopes are independent
        assert!(repo.get(PreferenceScope::Profile, "alice").await.unwrap().is_empty());

        repo.replace(PreferenceScope::Settings, "alice", patch(json!({"compact": true}))).await.unwrap();
        let stored = repo.get(PreferenceScope::Settings, "alice").await.unwrap();
        assert_eq!(serde_json::Value::Object(stored), json!({"compact": true}));
    }
}
