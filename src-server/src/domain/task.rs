//! Task Entity
//!
//! A user-created to-do item with priority, due date, optional schedule,
//! subtasks and assigned users.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};

use super::entity::{new_id, now_millis, require_text, DomainError, DomainResult, Entity};

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "low" => Priority::Low,
            "high" => Priority::High,
            _ => Priority::Medium,
        }
    }
}

/// Unknown strings read as `medium`
impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Priority::from_str(&raw.trim().to_ascii_lowercase()))
    }
}

/// Time-of-day schedule with an optional reminder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    /// 24h clock time, "HH:MM"
    pub time: Option<String>,
    #[serde(default)]
    pub reminder: bool,
}

impl Schedule {
    pub fn validate(&self) -> DomainResult<()> {
        if let Some(time) = &self.time {
            NaiveTime::parse_from_str(time, "%H:%M")
                .map_err(|_| DomainError::InvalidInput(format!("schedule time '{}' is not HH:MM", time)))?;
        }
        Ok(())
    }
}

/// A checklist entry inside a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: String,
    pub title: String,
    pub completed: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Subtask {
    pub fn new(title: &str) -> DomainResult<Self> {
        let now = now_millis();
        Ok(Self {
            id: new_id(),
            title: require_text("subtask title", title)?,
            completed: false,
            created_at: now,
            updated_at: now,
        })
    }
}

impl Entity for Subtask {
    type Id = String;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    /// Owner
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub assigned_users: Vec<String>,
    pub schedule: Option<Schedule>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    /// Create a new task owned by `user_id` with default values
    pub fn new(user_id: &str, title: &str) -> DomainResult<Self> {
        let now = now_millis();
        Ok(Self {
            id: new_id(),
            user_id: require_text("userId", user_id)?,
            title: require_text("title", title)?,
            description: String::new(),
            due_date: None,
            priority: Priority::default(),
            completed: false,
            subtasks: Vec::new(),
            assigned_users: Vec::new(),
            schedule: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Check field-level rules before persisting
    pub fn validate(&self) -> DomainResult<()> {
        require_text("title", &self.title)?;
        if let Some(schedule) = &self.schedule {
            schedule.validate()?;
        }
        Ok(())
    }

    /// Add users to the assignment list, skipping ones already present
    pub fn assign(&mut self, user_ids: &[String]) {
        for user_id in user_ids {
            if !self.assigned_users.contains(user_id) {
                self.assigned_users.push(user_id.clone());
            }
        }
    }

    pub fn subtask_mut(&mut self, subtask_id: &str) -> DomainResult<&mut Subtask> {
        self.subtasks
            .iter_mut()
            .find(|s| s.id == subtask_id)
            .ok_or_else(|| DomainError::NotFound(format!("Subtask {}", subtask_id)))
    }
}

impl Entity for Task {
    type Id = String;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_creation() {
        let task = Task::new("u1", " Write report ").unwrap();
        assert_eq!(task.title, "Write report");
        assert_eq!(task.priority, Priority::Medium);
        assert!(!task.completed);
        assert!(task.subtasks.is_empty());
    }

    #[test]
    fn test_priority_reads_unknown_as_medium() {
        let parsed: Vec<Priority> = serde_json::from_str(r#"["HIGH", "low", "urgent", ""]"#).unwrap();
        assert_eq!(parsed, vec![Priority::High, Priority::Low, Priority::Medium, Priority::Medium]);
        assert!(serde_json::from_str::<Priority>("3").is_err());
    }

    #[test]
    fn test_priority_parsing() {
        assert_eq!(Priority::from_str("high"), Priority::High);
        assert_eq!(Priority::from_str("urgent"), Priority::Medium);
        assert_eq!(Priority::Low.as_str(), "low");
    }

    #[test]
    fn test_schedule_time_must_be_clock_time() {
        let ok = Schedule { time: Some("09:30".into()), reminder: true };
        assert!(ok.validate().is_ok());

        let bad = Schedule { time: Some("25:00".into()), reminder: false };
        assert!(matches!(bad.validate(), Err(DomainError::InvalidInput(_))));
    }

    #[test]
    fn test_assign_skips_duplicates() {
        let mut task = Task::new("u1", "Plan").unwrap();
        task.assign(&["a".into(), "b".into()]);
        task.assign(&["b".into(), "c".into()]);
        assert_eq!(task.assigned_users, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_task_json_uses_camel_case() {
        let mut task = Task::new("u1", "Plan").unwrap();
        task.due_date = NaiveDate::from_ymd_opt(2026, 3, 1);
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["dueDate"], "2026-03-01");
        assert!(json.get("assignedUsers").is_some());
    }
}
