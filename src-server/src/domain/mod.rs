//! Domain Layer
//!
//! Contains all domain entities and core abstractions.
//! This layer has no storage or transport dependencies.

mod entity;
mod group;
mod preferences;
mod task;
mod template;
mod ticket;

pub use entity::{new_id, now_millis, require_text, DomainError, DomainResult, Entity};
pub use group::{Group, GroupKind, MemberRole};
pub use preferences::{merge as merge_preferences, validate_key, PreferenceScope, Preferences};
pub use task::{Priority, Schedule, Subtask, Task};
pub use template::Template;
pub use ticket::{format_ticket_number, HelpDeskTicket, TicketNote, TicketStatus};
