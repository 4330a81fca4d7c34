//! Group / Team Entity
//!
//! A named collection of users sharing tasks. Teams are groups with
//! `kind = team`; both live in the same table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::entity::{new_id, now_millis, require_text, DomainError, DomainResult, Entity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    #[default]
    Group,
    Team,
}

impl GroupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupKind::Group => "group",
            GroupKind::Team => "team",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "team" => GroupKind::Team,
            _ => GroupKind::Group,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Leader,
    #[default]
    Member,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Leader => "leader",
            MemberRole::Member => "member",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "leader" => MemberRole::Leader,
            _ => MemberRole::Member,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    #[serde(default)]
    pub kind: GroupKind,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// userId -> role
    #[serde(default)]
    pub members: BTreeMap<String, MemberRole>,
    /// Linked task ids, in link order
    #[serde(default)]
    pub tasks: Vec<String>,
    pub leader_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Group {
    pub fn new(kind: GroupKind, name: &str) -> DomainResult<Self> {
        let now = now_millis();
        Ok(Self {
            id: new_id(),
            kind,
            name: require_text("name", name)?,
            description: String::new(),
            members: BTreeMap::new(),
            tasks: Vec::new(),
            leader_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.contains_key(user_id)
    }

    /// Add a member; an existing member keeps their role
    pub fn add_member(&mut self, user_id: &str) -> DomainResult<()> {
        let user_id = require_text("userId", user_id)?;
        self.members.entry(user_id).or_insert(MemberRole::Member);
        Ok(())
    }

    /// Remove a member, clearing the leader slot if they held it
    pub fn remove_member(&mut self, user_id: &str) -> DomainResult<()> {
        if self.members.remove(user_id).is_none() {
            return Err(DomainError::NotFound(format!("Member {} in {}", user_id, self.id)));
        }
        if self.leader_id.as_deref() == Some(user_id) {
            self.leader_id = None;
        }
        Ok(())
    }

    /// Make `user_id` the leader, adding them as a member if needed.
    /// The previous leader becomes a regular member.
    pub fn set_leader(&mut self, user_id: &str) -> DomainResult<()> {
        let user_id = require_text("leaderId", user_id)?;
        if let Some(previous) = self.leader_id.take() {
            if let Some(role) = self.members.get_mut(&previous) {
                *role = MemberRole::Member;
            }
        }
        self.members.insert(user_id.clone(), MemberRole::Leader);
        self.leader_id = Some(user_id);
        Ok(())
    }

    /// Link a task; returns false if it was already linked
    pub fn link_task(&mut self, task_id: &str) -> bool {
        if self.tasks.iter().any(|t| t == task_id) {
            return false;
        }
        self.tasks.push(task_id.to_string());
        true
    }

    pub fn unlink_task(&mut self, task_id: &str) {
        self.tasks.retain(|t| t != task_id);
    }
}

impl Entity for Group {
    type Id = String;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_leader_demotes_previous() {
        let mut team = Group::new(GroupKind::Team, "Ops").unwrap();
        team.set_leader("alice").unwrap();
        team.set_leader("bob").unwrap();

        assert_eq!(team.leader_id.as_deref(), Some("bob"));
        assert_eq!(team.members["alice"], MemberRole::Member);
        assert_eq!(team.members["bob"], MemberRole::Leader);
    }

    #[test]
    fn test_removing_leader_clears_slot() {
        let mut group = Group::new(GroupKind::Group, "Book club").unwrap();
        group.set_leader("alice").unwrap();
        group.remove_member("alice").unwrap();

        assert!(group.leader_id.is_none());
        assert!(!group.is_member("alice"));
    }

    #[test]
    fn test_remove_unknown_member_fails() {
        let mut group = Group::new(GroupKind::Group, "Book club").unwrap();
        assert!(matches!(group.remove_member("ghost"), Err(DomainError::NotFound(_))));
    }

    #[test]
    fn test_link_task_once() {
        let mut team = Group::new(GroupKind::Team, "Ops").unwrap();
        assert!(team.link_task("t1"));
        assert!(!team.link_task("t1"));
        assert_eq!(team.tasks, vec!["t1"]);
    }

    #[test]
    fn test_add_member_keeps_role() {
        let mut team = Group::new(GroupKind::Team, "Ops").unwrap();
        team.set_leader("alice").unwrap();
        team.add_member("alice").unwrap();
        assert_eq!(team.members["alice"], MemberRole::Leader);
    }
}
