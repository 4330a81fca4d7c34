//! Template Entity
//!
//! A reusable blueprint for quickly creating a task with preset fields.

use serde::{Deserialize, Serialize};

use super::entity::{new_id, now_millis, require_text, DomainResult, Entity};
use super::task::{Priority, Task};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Title given to tasks created from this template
    pub task_title: String,
    #[serde(default)]
    pub priority: Priority,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Template {
    pub fn new(user_id: &str, name: &str, task_title: &str) -> DomainResult<Self> {
        let now = now_millis();
        Ok(Self {
            id: new_id(),
            user_id: require_text("userId", user_id)?,
            name: require_text("name", name)?,
            description: String::new(),
            task_title: require_text("taskTitle", task_title)?,
            priority: Priority::default(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Build a fresh task for `user_id` from this template
    pub fn instantiate(&self, user_id: &str) -> DomainResult<Task> {
        let mut task = Task::new(user_id, &self.task_title)?;
        task.description = self.description.clone();
        task.priority = self.priority;
        Ok(task)
    }
}

impl Entity for Template {
    type Id = String;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instantiate_copies_preset_fields() {
        let mut template = Template::new("u1", "Weekly review", "Review the week").unwrap();
        template.description = "Go through inbox".into();
        template.priority = Priority::High;

        let task = template.instantiate("u2").unwrap();
        assert_eq!(task.title, "Review the week");
        assert_eq!(task.description, "Go through inbox");
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.user_id, "u2");
        assert_ne!(task.id, template.id);
    }

    #[test]
    fn test_template_requires_task_title() {
        assert!(Template::new("u1", "Empty", " ").is_err());
    }
}
